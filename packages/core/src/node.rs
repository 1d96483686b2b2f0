//! Resource nodes.
//!
//! A [`Node`] is a cheap, clonable handle to one resource. Every handle for
//! the same absolute URI in a session points at the same shared state, so a
//! fetch through one handle is visible through all of them.
//!
//! # State machine
//!
//! ```text
//! Unfetched ──fetch──▶ Fetched | Error
//! Fetched | Error ──fetch──▶ Fetched | Error
//! (embedded) ──────────────▶ Fetched
//! ```
//!
//! A node never returns to `Unfetched`.
//!
//! # Concurrency
//!
//! The node's data lives in an immutable snapshot behind an `RwLock`
//! and is swapped wholesale after each fetch, so readers see the old or the
//! new snapshot and never a mix. A per-node fetch mutex allows at most one
//! request in flight; implicit dereferences re-check `Unfetched` after
//! taking it, so concurrent first reads share one request.

use std::fmt;
use std::sync::{Arc, Mutex, RwLock, Weak};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::curie::{self, CurieRegistry};
use crate::document::{Document, HalDocument, ParseError};
use crate::embedded::{self, Embedded};
use crate::error::NavError;
use crate::link::{Link, LinkIndex};
use crate::relation::{Relation, TargetList};
use crate::session::SessionInner;
use crate::transport::{FailureKind, Method, Response, TransportFailure};
use crate::uri;

/// Where a node is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Unfetched,
    Fetched,
    Error,
}

/// What to do when the server answers 4xx/5xx.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnError {
    /// Return [`NavError::Http`].
    #[default]
    Raise,
    /// Return normally; the node records the failure in its status.
    Return,
}

/// What the last request for a node produced.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ResponseMeta {
    /// `None` when no HTTP response arrived.
    pub status_code: Option<u16>,
    pub reason: Option<String>,
    pub headers: Vec<(String, String)>,
    /// An HTTP error was returned to the caller as a value instead of an
    /// `Err` (`OnError::Return`).
    pub suppressed: bool,
    /// Set when the transport failed.
    pub failure: Option<FailureKind>,
}

impl ResponseMeta {
    fn from_response(response: &Response, on_error: OnError) -> Self {
        Self {
            status_code: Some(response.status),
            reason: response.reason.clone(),
            headers: response.headers.clone(),
            suppressed: response.is_error() && on_error == OnError::Return,
            failure: None,
        }
    }

    fn from_failure(failure: &TransportFailure) -> Self {
        Self {
            failure: Some(failure.kind),
            reason: Some(failure.message.clone()),
            ..Self::default()
        }
    }

    /// A response arrived with a 1xx–3xx status.
    pub fn is_ok(&self) -> bool {
        self.failure.is_none() && self.status_code.is_some_and(|c| c < 400)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Everything a node knows, replaced as a unit.
#[derive(Debug, Default)]
pub(crate) struct Snapshot {
    pub(crate) status: Status,
    /// `None` iff `Unfetched`.
    pub(crate) state: Option<Document>,
    pub(crate) title: Option<String>,
    pub(crate) links: LinkIndex,
    pub(crate) curies: CurieRegistry,
    pub(crate) embedded: Embedded,
    pub(crate) response: Option<ResponseMeta>,
}

impl Snapshot {
    /// Index a parsed document for `node`, resolving its embedded resources.
    pub(crate) fn build(node: &Node, hal: HalDocument, status: Status, response: Option<ResponseMeta>) -> Self {
        let links = LinkIndex::from_links(&hal.links);
        let curies = CurieRegistry::from_index(&links);
        let title = links.self_link().and_then(Link::title).map(str::to_string);
        let embedded = embedded::resolve(&hal.embedded, node);
        Self {
            status,
            state: Some(hal.state),
            title,
            links,
            curies,
            embedded,
            response,
        }
    }

    /// Parse a response body for `node`. An error body that is not JSON
    /// becomes an empty document; a success body that is not JSON is an
    /// error.
    fn from_response(node: &Node, response: &Response, on_error: OnError) -> Result<Self, ParseError> {
        let parsed = node
            .session()
            .parser
            .parse(&response.body, response.content_type());
        let hal = match parsed {
            Ok(doc) => doc.unwrap_or_default(),
            Err(_) if response.is_error() => HalDocument::default(),
            Err(e) => return Err(e),
        };
        let status = if response.is_error() {
            Status::Error
        } else {
            Status::Fetched
        };
        let meta = ResponseMeta::from_response(response, on_error);
        Ok(Self::build(node, hal, status, Some(meta)))
    }

    fn failed(meta: ResponseMeta) -> Self {
        Self {
            status: Status::Error,
            state: Some(Document::new()),
            response: Some(meta),
            ..Self::default()
        }
    }
}

/// Opens relation documentation somewhere a human can read it.
pub trait DocsViewer {
    fn open(&self, uri: &str);
}

/// Body of a write request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Serialised as `application/json`.
    Json(Value),
    Raw { bytes: Vec<u8>, content_type: String },
}

impl RequestBody {
    fn into_parts(self) -> (Vec<u8>, String) {
        match self {
            RequestBody::Json(value) => (value.to_string().into_bytes(), "application/json".into()),
            RequestBody::Raw { bytes, content_type } => (bytes, content_type),
        }
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        RequestBody::Json(value)
    }
}

impl From<Document> for RequestBody {
    fn from(doc: Document) -> Self {
        RequestBody::Json(Value::Object(doc))
    }
}

/// Write responses that point at the affected resource through `Location`.
const LOCATION_STATUSES: [u16; 6] = [200, 201, 202, 204, 302, 303];

pub(crate) struct NodeInner {
    uri: Option<String>,
    session: Arc<SessionInner>,
    parent: Option<Weak<NodeInner>>,
    fetch_lock: Mutex<()>,
    snapshot: RwLock<Arc<Snapshot>>,
}

/// A handle to one resource in a session.
#[derive(Clone)]
pub struct Node(Arc<NodeInner>);

// ---------------------------------------------------------------------------
// Construction and plumbing
// ---------------------------------------------------------------------------

impl Node {
    fn new(session: &Arc<SessionInner>, uri: Option<String>, parent: Option<Weak<NodeInner>>) -> Self {
        Node(Arc::new(NodeInner {
            uri,
            session: Arc::clone(session),
            parent,
            fetch_lock: Mutex::new(()),
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
        }))
    }

    /// The identity-mapped node for an absolute URI.
    pub(crate) fn canonical(session: &Arc<SessionInner>, uri: &str) -> Node {
        session
            .identity
            .get_or_insert_with(uri, || Node::new(session, Some(uri.to_string()), None))
    }

    /// A node with no URI, owned by `parent`. The caller installs its
    /// snapshot before handing it out.
    pub(crate) fn orphan(session: &Arc<SessionInner>, parent: &Node) -> Node {
        Node::new(session, None, Some(Arc::downgrade(&parent.0)))
    }

    pub(crate) fn from_weak(weak: &Weak<NodeInner>) -> Option<Node> {
        weak.upgrade().map(Node)
    }

    pub(crate) fn downgrade(&self) -> Weak<NodeInner> {
        Arc::downgrade(&self.0)
    }

    pub(crate) fn session(&self) -> &Arc<SessionInner> {
        &self.0.session
    }

    pub(crate) fn install(&self, snapshot: Snapshot) {
        *self.0.snapshot.write().unwrap_or_else(|p| p.into_inner()) = Arc::new(snapshot);
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.0.snapshot.read().unwrap_or_else(|p| p.into_inner()))
    }

    /// URI that relative hrefs in this resource resolve against: its own, or
    /// the nearest ancestor's for orphans.
    pub(crate) fn base(&self) -> Option<String> {
        match &self.0.uri {
            Some(uri) => Some(uri.clone()),
            None => self.parent().and_then(|p| p.base()),
        }
    }

    /// The URI when there is one, the display form otherwise.
    pub(crate) fn describe(&self) -> String {
        self.0.uri.clone().unwrap_or_else(|| self.to_string())
    }

    /// Cached state, without fetching.
    pub(crate) fn cached_state(&self) -> Option<Document> {
        self.snapshot().state.clone()
    }

    fn require_uri(&self) -> Result<&str, NavError> {
        self.0.uri.as_deref().ok_or(NavError::Orphan)
    }
}

// ---------------------------------------------------------------------------
// Identity and cached metadata
// ---------------------------------------------------------------------------

impl Node {
    /// Absolute URI; `None` for orphans.
    pub fn uri(&self) -> Option<&str> {
        self.0.uri.as_deref()
    }

    pub fn is_orphan(&self) -> bool {
        self.0.uri.is_none()
    }

    /// The containing node, for orphans whose container is still alive.
    pub fn parent(&self) -> Option<Node> {
        self.0.parent.as_ref().and_then(Node::from_weak)
    }

    /// `true` when both handles refer to the same node.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn status(&self) -> Status {
        self.snapshot().status
    }

    /// Metadata of the last response, if a request was made.
    pub fn response(&self) -> Option<ResponseMeta> {
        self.snapshot().response.clone()
    }

    pub fn status_code(&self) -> Option<u16> {
        self.snapshot().response.as_ref().and_then(|r| r.status_code)
    }

    /// Title of the resource's own `self` link.
    pub fn title(&self) -> Option<String> {
        self.snapshot().title.clone()
    }

    pub fn api_name(&self) -> &str {
        &self.0.session.api_name
    }

    /// The URI relative to the API root (`/widgets/1`); `None` for orphans.
    pub fn relative_uri(&self) -> Option<String> {
        self.uri()
            .map(|u| uri::relative_to(&self.0.session.root_uri, u))
    }

    fn label(&self) -> String {
        let session = &self.0.session;
        match self.uri() {
            Some(u) if u.starts_with(&session.root_uri) => format!(
                "{}{}",
                session.api_name,
                uri::display_path(&uri::relative_to(&session.root_uri, u))
            ),
            Some(u) => u.to_string(),
            None => match self.parent() {
                Some(parent) => format!("{}~orphan", parent.label()),
                None => format!("{}~orphan", session.api_name),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

impl Node {
    /// GET the resource now, whatever its status, and return its state.
    pub fn fetch(&self) -> Result<Document, NavError> {
        self.fetch_with(OnError::Raise)
    }

    pub fn fetch_with(&self, on_error: OnError) -> Result<Document, NavError> {
        let uri = self.require_uri()?;
        let _guard = self.0.fetch_lock.lock().unwrap_or_else(|p| p.into_inner());
        self.fetch_locked(uri, on_error)
    }

    /// The resource state, fetching first only if the node is unfetched.
    pub fn state(&self) -> Result<Document, NavError> {
        self.state_with(OnError::Raise)
    }

    pub fn state_with(&self, on_error: OnError) -> Result<Document, NavError> {
        Ok(self
            .ensure_fetched(on_error)?
            .state
            .clone()
            .unwrap_or_default())
    }

    /// Outbound links, fetching first if unfetched.
    pub fn links(&self) -> Result<LinkIndex, NavError> {
        Ok(self.ensure_fetched(OnError::Raise)?.links.clone())
    }

    /// Embedded resources, fetching first if unfetched.
    pub fn embedded(&self) -> Result<Embedded, NavError> {
        Ok(self.ensure_fetched(OnError::Raise)?.embedded.clone())
    }

    /// Curies this resource declares, fetching first if unfetched.
    pub fn curies(&self) -> Result<CurieRegistry, NavError> {
        Ok(self.ensure_fetched(OnError::Raise)?.curies.clone())
    }

    /// `true` when the last response was 1xx–3xx. Fetches leniently if
    /// unfetched; a transport failure counts as not ok.
    pub fn is_ok(&self) -> bool {
        match self.ensure_fetched(OnError::Return) {
            Ok(snap) => match &snap.response {
                Some(meta) => meta.is_ok(),
                None => snap.status == Status::Fetched,
            },
            Err(_) => false,
        }
    }

    pub(crate) fn ensure_fetched(&self, on_error: OnError) -> Result<Arc<Snapshot>, NavError> {
        let snap = self.snapshot();
        if snap.status != Status::Unfetched {
            return Ok(snap);
        }
        let uri = self.require_uri()?;
        let _guard = self.0.fetch_lock.lock().unwrap_or_else(|p| p.into_inner());
        let snap = self.snapshot();
        if snap.status != Status::Unfetched {
            return Ok(snap);
        }
        self.fetch_locked(uri, on_error)?;
        Ok(self.snapshot())
    }

    /// Caller holds the fetch lock.
    fn fetch_locked(&self, uri: &str, on_error: OnError) -> Result<Document, NavError> {
        let session = &self.0.session;
        debug!("fetch: GET {uri}");
        let request = session.request(Method::Get, uri, None);
        let response = match session.transport.request(&request) {
            Ok(response) => response,
            Err(failure) => {
                warn!("fetch: GET {uri} failed: {failure}");
                self.install(Snapshot::failed(ResponseMeta::from_failure(&failure)));
                return Err(NavError::Transport {
                    uri: uri.to_string(),
                    source: failure,
                });
            }
        };

        let snapshot = match Snapshot::from_response(self, &response, on_error) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("fetch: GET {uri} returned a body that is not JSON: {e}");
                self.install(Snapshot::failed(ResponseMeta::from_response(&response, on_error)));
                return Err(NavError::NotJson {
                    uri: uri.to_string(),
                    detail: e.to_string(),
                });
            }
        };
        let state = snapshot.state.clone().unwrap_or_default();
        self.install(snapshot);

        let status = response.status;
        if response.is_error() {
            warn!("fetch: GET {uri} returned HTTP {status}");
            if on_error == OnError::Raise {
                return Err(NavError::Http {
                    status,
                    uri: uri.to_string(),
                    node: self.clone(),
                });
            }
        } else {
            debug!("fetch: GET {uri} -> {status}");
        }
        Ok(state)
    }
}

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

impl Node {
    /// Every target of `rel`, as a list even when there is only one.
    ///
    /// Candidate keys come from [`curie::lookup_keys`]; for each key the link
    /// index is consulted before the embedded section. A relation that is
    /// present but empty gives an empty list unless a later key has targets.
    pub fn targets(&self, rel: &str) -> Result<TargetList, NavError> {
        let snap = self.ensure_fetched(OnError::Raise)?;
        if snap.status == Status::Error {
            return Err(NavError::ErrorResource {
                uri: self.describe(),
                status: snap.response.as_ref().and_then(|r| r.status_code),
            });
        }
        let session = &self.0.session;
        let base = self.base();
        let mut empty = None;
        for key in curie::lookup_keys(rel, &snap.curies, session.default_curie.as_deref()) {
            let links = snap.links.get(&key);
            if !links.is_empty() {
                return TargetList::from_links(&key, links, session, base.as_deref());
            }
            match snap.embedded.get(&key) {
                Some(nodes) if !nodes.is_empty() => return Ok(TargetList::from_embedded(&key, nodes)),
                Some(_) => empty = empty.or(Some(key)),
                None if snap.links.contains(&key) => empty = empty.or(Some(key)),
                None => {}
            }
        }
        match empty {
            Some(key) => Ok(TargetList::from_embedded(&key, &[])),
            None => Err(NavError::RelationNotFound {
                rel: rel.to_string(),
                uri: self.describe(),
            }),
        }
    }

    /// Follow one relation. A single link gives a resource or a template;
    /// several give a list.
    pub fn get(&self, rel: &str) -> Result<Relation, NavError> {
        self.targets(rel).map(TargetList::collapse)
    }

    /// Whether `rel` is present in links or embedded resources.
    pub fn contains(&self, rel: &str) -> Result<bool, NavError> {
        match self.targets(rel) {
            Ok(_) => Ok(true),
            Err(NavError::RelationNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Documentation URI for `rel`, expanded through the curies when a
    /// prefix applies, else `rel` itself.
    pub fn docs_uri(&self, rel: &str) -> Result<String, NavError> {
        let snap = self.ensure_fetched(OnError::Raise)?;
        let default = self.0.session.default_curie.as_deref();
        Ok(curie::lookup_keys(rel, &snap.curies, default)
            .iter()
            .find_map(|key| snap.curies.expand(key))
            .unwrap_or_else(|| rel.to_string()))
    }

    /// Hand the documentation URI for `rel` to `viewer`.
    pub fn open_docs(&self, rel: &str, viewer: &dyn DocsViewer) -> Result<String, NavError> {
        let docs = self.docs_uri(rel)?;
        info!("docs: opening {docs} for {rel}");
        viewer.open(&docs);
        Ok(docs)
    }
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

impl Node {
    /// POST `body` to this resource.
    pub fn create(&self, body: impl Into<RequestBody>) -> Result<Node, NavError> {
        self.write(Method::Post, Some(body.into()), OnError::Raise)
    }

    pub fn create_with(&self, body: impl Into<RequestBody>, on_error: OnError) -> Result<Node, NavError> {
        self.write(Method::Post, Some(body.into()), on_error)
    }

    /// PUT `body` to this resource.
    pub fn upsert(&self, body: impl Into<RequestBody>) -> Result<Node, NavError> {
        self.write(Method::Put, Some(body.into()), OnError::Raise)
    }

    pub fn upsert_with(&self, body: impl Into<RequestBody>, on_error: OnError) -> Result<Node, NavError> {
        self.write(Method::Put, Some(body.into()), on_error)
    }

    pub fn patch(&self, body: impl Into<RequestBody>) -> Result<Node, NavError> {
        self.write(Method::Patch, Some(body.into()), OnError::Raise)
    }

    pub fn patch_with(&self, body: impl Into<RequestBody>, on_error: OnError) -> Result<Node, NavError> {
        self.write(Method::Patch, Some(body.into()), on_error)
    }

    pub fn delete(&self) -> Result<Node, NavError> {
        self.write(Method::Delete, None, OnError::Raise)
    }

    pub fn delete_with(&self, on_error: OnError) -> Result<Node, NavError> {
        self.write(Method::Delete, None, on_error)
    }

    /// Send a write request.
    ///
    /// A success with a `Location` header yields the (unfetched) node for
    /// that location. Anything else yields an orphan holding the response
    /// body, whose parent is this node. The node itself is not refetched.
    fn write(&self, method: Method, body: Option<RequestBody>, on_error: OnError) -> Result<Node, NavError> {
        let uri = self.require_uri()?;
        let session = &self.0.session;
        debug!("write: {method} {uri}");
        let request = session.request(method, uri, body.map(RequestBody::into_parts));
        let response = session.transport.request(&request).map_err(|source| {
            warn!("write: {method} {uri} failed: {source}");
            NavError::Transport {
                uri: uri.to_string(),
                source,
            }
        })?;

        if !response.is_error() && LOCATION_STATUSES.contains(&response.status) {
            if let Some(location) = response.header("location") {
                let target = uri::resolve(Some(uri), location)?;
                debug!("write: {method} {uri} -> {} at {target}", response.status);
                return Ok(Node::canonical(session, &target));
            }
        }

        let orphan = Node::orphan(session, self);
        let snapshot = Snapshot::from_response(&orphan, &response, on_error).map_err(|e| NavError::NotJson {
            uri: uri.to_string(),
            detail: e.to_string(),
        })?;
        orphan.install(snapshot);

        let status = response.status;
        if response.is_error() {
            warn!("write: {method} {uri} returned HTTP {status}");
            if on_error == OnError::Raise {
                return Err(NavError::Http {
                    status,
                    uri: uri.to_string(),
                    node: orphan,
                });
            }
        }
        Ok(orphan)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Node {}

/// `Navigator(Example.widgets[3])`.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Navigator({})", self.label())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("uri", &self.0.uri)
            .field("status", &self.status())
            .finish()
    }
}
