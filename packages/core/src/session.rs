//! Navigation sessions.
//!
//! A [`Session`] owns everything nodes share: the transport, the document
//! parser, default headers, credentials, the default curie, and the
//! [`IdentityMap`]. Nodes hold the session alive; the session holds nodes
//! only weakly (through the map) plus its root.

use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::document::{DocumentParser, HalParser};
use crate::error::NavError;
use crate::identity::IdentityMap;
use crate::node::Node;
use crate::transport::{Credentials, Method, Request, Transport};
use crate::uri;

/// Default `Accept` header.
pub const DEFAULT_ACCEPT: &str = "application/hal+json,application/json";

/// Default `User-Agent` header.
pub const DEFAULT_USER_AGENT: &str = concat!("halnav/", env!("CARGO_PKG_VERSION"));

pub(crate) struct SessionInner {
    pub(crate) root_uri: String,
    pub(crate) api_name: String,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) parser: Arc<dyn DocumentParser>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) default_curie: Option<String>,
    credentials: RwLock<Option<Credentials>>,
    pub(crate) identity: IdentityMap,
}

impl SessionInner {
    /// Build a request carrying the session headers and current credentials.
    pub(crate) fn request(&self, method: Method, uri: &str, body: Option<(Vec<u8>, String)>) -> Request {
        let mut headers = self.headers.clone();
        let body = body.map(|(bytes, content_type)| {
            headers.retain(|(k, _)| !k.eq_ignore_ascii_case("content-type"));
            headers.push(("Content-Type".into(), content_type));
            bytes
        });
        Request {
            method,
            uri: uri.to_string(),
            headers,
            body,
            credentials: self.credentials(),
        }
    }

    pub(crate) fn credentials(&self) -> Option<Credentials> {
        self.credentials
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    fn set_credentials(&self, credentials: Option<Credentials>) {
        *self.credentials.write().unwrap_or_else(|p| p.into_inner()) = credentials;
    }
}

/// A navigation session rooted at one API entry point.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
    root: Node,
}

impl Session {
    /// Start configuring a session for the API at `root`.
    pub fn builder(root: impl Into<String>, transport: impl Transport + 'static) -> SessionBuilder {
        SessionBuilder::new(root, transport)
    }

    /// The root node. Unfetched until first dereferenced.
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// The normalised root URI.
    pub fn root_uri(&self) -> &str {
        &self.inner.root_uri
    }

    pub fn api_name(&self) -> &str {
        &self.inner.api_name
    }

    pub fn default_curie(&self) -> Option<&str> {
        self.inner.default_curie.as_deref()
    }

    /// Attach credentials to every later request. Sends nothing by itself.
    pub fn authenticate(&self, credentials: Credentials) {
        self.inner.set_credentials(Some(credentials));
        debug!("session: credentials set for {}", self.inner.api_name);
    }

    pub fn clear_credentials(&self) {
        self.inner.set_credentials(None);
    }

    /// The canonical node for `uri`, resolved against the root. Does not
    /// fetch.
    pub fn node(&self, uri: &str) -> Result<Node, NavError> {
        let absolute = uri::resolve(Some(&self.inner.root_uri), uri)?;
        Ok(Node::canonical(&self.inner, &absolute))
    }

    pub fn identity_map(&self) -> &IdentityMap {
        &self.inner.identity
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("root", &self.inner.root_uri)
            .field("api_name", &self.inner.api_name)
            .field("default_curie", &self.inner.default_curie)
            .field("identity", &self.inner.identity)
            .finish()
    }
}

/// Builder for [`Session`].
pub struct SessionBuilder {
    root: String,
    transport: Arc<dyn Transport>,
    parser: Arc<dyn DocumentParser>,
    api_name: Option<String>,
    headers: Vec<(String, String)>,
    default_curie: Option<String>,
    credentials: Option<Credentials>,
}

impl SessionBuilder {
    pub fn new(root: impl Into<String>, transport: impl Transport + 'static) -> Self {
        Self {
            root: root.into(),
            transport: Arc::new(transport),
            parser: Arc::new(HalParser),
            api_name: None,
            headers: vec![
                ("Accept".into(), DEFAULT_ACCEPT.into()),
                ("User-Agent".into(), DEFAULT_USER_AGENT.into()),
            ],
            default_curie: None,
            credentials: None,
        }
    }

    /// Override the name derived from the root URI.
    pub fn api_name(mut self, name: impl Into<String>) -> Self {
        self.api_name = Some(name.into());
        self
    }

    pub fn parser(mut self, parser: impl DocumentParser + 'static) -> Self {
        self.parser = Arc::new(parser);
        self
    }

    /// Send `name: value` on every request, replacing any default header of
    /// the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Prefix tried for short relation names (`widgets` → `acme:widgets`).
    pub fn default_curie(mut self, prefix: impl Into<String>) -> Self {
        self.default_curie = Some(prefix.into());
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Normalise the root URI and create the root node. Sends nothing.
    pub fn build(self) -> Result<Session, NavError> {
        let root_uri = uri::fix_scheme(&self.root)?;
        let api_name = self.api_name.unwrap_or_else(|| uri::namify(&root_uri));
        info!("session: {api_name} rooted at {root_uri}");
        let inner = Arc::new(SessionInner {
            root_uri: root_uri.clone(),
            api_name,
            transport: self.transport,
            parser: self.parser,
            headers: self.headers,
            default_curie: self.default_curie,
            credentials: RwLock::new(self.credentials),
            identity: IdentityMap::new(),
        });
        let root = Node::canonical(&inner, &root_uri);
        Ok(Session { inner, root })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use crate::uri::UriError;
    use serde_json::json;

    #[test]
    fn root_is_normalised_and_named() {
        let session = Session::builder("www.example.com", MockTransport::new())
            .build()
            .unwrap();
        assert_eq!(session.root_uri(), "http://www.example.com/");
        assert_eq!(session.api_name(), "Example");
        assert_eq!(session.root().to_string(), "Navigator(Example)");
    }

    #[test]
    fn bad_scheme_is_rejected() {
        let err = Session::builder("ftp://example.com", MockTransport::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, NavError::Uri(UriError::BadScheme { .. })));
    }

    #[test]
    fn building_sends_nothing() {
        let mock = Arc::new(MockTransport::new());
        let _session = Session::builder("http://api.example/", Arc::clone(&mock))
            .build()
            .unwrap();
        assert_eq!(mock.total_calls(), 0);
    }

    #[test]
    fn default_and_custom_headers_are_sent() {
        let mock = Arc::new(MockTransport::new().hal("http://api.example/", json!({})));
        let session = Session::builder("http://api.example/", Arc::clone(&mock))
            .header("X-Custom", "yes")
            .header("accept", "application/hal+json")
            .build()
            .unwrap();
        session.root().fetch().unwrap();
        let req = mock.last_request().unwrap();
        assert_eq!(req.header("X-Custom"), Some("yes"));
        assert_eq!(req.header("Accept"), Some("application/hal+json"));
        assert_eq!(req.header("User-Agent"), Some(DEFAULT_USER_AGENT));
    }

    #[test]
    fn credentials_are_forwarded_after_authenticate() {
        let mock = Arc::new(MockTransport::new().hal("http://api.example/", json!({})));
        let session = Session::builder("http://api.example/", Arc::clone(&mock))
            .build()
            .unwrap();
        let token = Credentials::Bearer("s3cret".into());
        session.authenticate(token.clone());
        assert_eq!(mock.total_calls(), 0);
        session.root().fetch().unwrap();
        assert_eq!(mock.last_request().unwrap().credentials, Some(token));

        session.clear_credentials();
        session.root().fetch().unwrap();
        assert_eq!(mock.last_request().unwrap().credentials, None);
    }

    #[test]
    fn node_lookup_resolves_against_root() {
        let session = Session::builder("http://api.example/v1/", MockTransport::new())
            .build()
            .unwrap();
        let a = session.node("widgets/1").unwrap();
        let b = session.node("http://api.example/v1/widgets/1").unwrap();
        assert!(a.ptr_eq(&b));
        assert!(session.identity_map().contains("http://api.example/v1/widgets/1"));
    }
}
