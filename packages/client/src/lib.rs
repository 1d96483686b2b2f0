//! HTTP client side of `halnav`.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | [`ClientConfig`], read from `HALNAV_*` environment variables |
//! | [`transport`] | [`ReqwestTransport`], a blocking `reqwest` transport |
//! | [`viewer`] | [`DocsViewer`](halnav::DocsViewer) implementations |
//!
//! ```rust,ignore
//! let session = halnav_client::connect("https://api.example.com/")?;
//! let orders = session.root().get("orders")?.into_resource()?;
//! ```

pub mod config;
pub mod transport;
pub mod viewer;

pub use config::{ClientConfig, ConfigError};
pub use transport::ReqwestTransport;
pub use viewer::{CommandViewer, PrintViewer};

use halnav::{NavError, Session, SessionBuilder};
use thiserror::Error;

/// Errors from setting up a session.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Nav(#[from] NavError),
}

/// A session builder for `root` using a [`ReqwestTransport`] and the headers
/// and default curie from `config`.
pub fn builder(root: &str, config: &ClientConfig) -> Result<SessionBuilder, ClientError> {
    let transport = ReqwestTransport::new(config)?;
    let mut builder = Session::builder(root, transport)
        .header("Accept", config.accept.clone())
        .header("User-Agent", config.user_agent.clone());
    if let Some(prefix) = &config.default_curie {
        builder = builder.default_curie(prefix.clone());
    }
    Ok(builder)
}

/// Open a session on `root` configured from the environment.
pub fn connect(root: &str) -> Result<Session, ClientError> {
    let config = ClientConfig::from_env()?;
    Ok(builder(root, &config)?.build()?)
}
