//! Navigation engine for HAL+JSON hypermedia APIs.
//!
//! Clients traverse an API by following typed links instead of hardcoding
//! URLs. Every fetched or embedded resource is a [`Node`]; nodes are
//! canonical per absolute URI within a [`Session`], fetched lazily, and
//! shared between threads.
//!
//! Following a relation goes through curie resolution, the link relation
//! index, template expansion when the link is templated, and finally the
//! identity map. Embedded documents pre-populate their nodes so that reading
//! them never touches the network.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`curie`] | CURIE registry and relation lookup precedence |
//! | [`link`] | [`Link`], [`LinkList`], and the per-resource [`LinkIndex`] |
//! | [`template`] | RFC 6570 URI templates with partial binding |
//! | [`identity`] | Session-scoped [`IdentityMap`] |
//! | [`node`] | [`Node`]: fetching, relations, writes |
//! | [`relation`] | [`Relation`], [`TargetList`], [`Template`] |
//! | [`navigate`] | Chained [`Path`] traversal and [`Pages`] |
//! | [`embedded`] | `_embedded` resolution |
//! | [`document`] | HAL body parsing behind [`DocumentParser`] |
//! | [`transport`] | The [`Transport`] trait and request/response types |
//! | [`session`] | [`Session`] and its builder |
//! | [`uri`] | Root normalisation, href resolution, display names |
//!
//! # Quick start
//!
//! ```rust,ignore
//! use halnav::{Path, Session, Variables};
//!
//! let session = Session::builder("https://api.example.com/", transport)
//!     .default_curie("ex")
//!     .build()?;
//!
//! let widgets = session.root().get("widgets")?.into_list().unwrap();
//! let gadget = widgets.named("gadget1").unwrap();
//!
//! let found = session
//!     .root()
//!     .navigate(&Path::new().rel("search").var("q", "blue"))?
//!     .into_resource()?;
//! println!("{:?}", found.state()?);
//!
//! for page in session.root().get("orders")?.into_resource()?.pages() {
//!     println!("{}", page?);
//! }
//! ```
//!
//! No I/O happens in this crate; `halnav-client` provides a `reqwest`
//! transport.

pub mod curie;
pub mod document;
pub mod embedded;
pub mod error;
pub mod identity;
pub mod link;
pub mod navigate;
pub mod node;
pub mod relation;
pub mod session;
pub mod template;
pub mod transport;
pub mod uri;

#[cfg(test)]
mod testing;

pub use curie::{Curie, CurieRegistry};
pub use document::{Document, DocumentParser, HalDocument, HalParser, ParseError};
pub use embedded::Embedded;
pub use error::NavError;
pub use identity::IdentityMap;
pub use link::{Link, LinkIndex, LinkList};
pub use navigate::{Pages, Path, Step};
pub use node::{DocsViewer, Node, OnError, RequestBody, ResponseMeta, Status};
pub use relation::{Relation, Target, TargetEntry, TargetList, Template};
pub use session::{Session, SessionBuilder, DEFAULT_ACCEPT, DEFAULT_USER_AGENT};
pub use template::{TemplateBinding, TemplateError, TemplateValue, UriTemplate, Variables};
pub use transport::{Credentials, FailureKind, Method, Request, Response, Transport, TransportFailure};
pub use uri::UriError;
