//! Errors returned by navigation.

use thiserror::Error;

use crate::node::Node;
use crate::template::TemplateError;
use crate::transport::TransportFailure;
use crate::uri::UriError;

/// Everything that can go wrong while navigating.
///
/// Fetch failures (`Transport`, `Http`, `NotJson`) are local to one node: the
/// node records the outcome in its status and nothing else in the session
/// changes. The remaining variants are raised by the call that caused them.
#[derive(Debug, Error)]
pub enum NavError {
    /// No HTTP response was received.
    #[error("request to {uri} failed: {source}")]
    Transport {
        uri: String,
        #[source]
        source: TransportFailure,
    },

    /// The server answered 4xx/5xx. `node` is left in `Error` status and holds
    /// the parsed error body as its state.
    #[error("{uri} returned HTTP {status}")]
    Http { status: u16, uri: String, node: Node },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("relation {rel:?} not found on {uri}")]
    RelationNotFound { rel: String, uri: String },

    /// Several links share the relation but exactly one was needed.
    #[error("relation {rel:?} has {count} links; select one with named/by/index")]
    AmbiguousRelation { rel: String, count: usize },

    /// A `named`, `by`, or `index` selection matched nothing.
    #[error("no {rel:?} link matches {detail}")]
    NoMatch { rel: String, detail: String },

    /// The end of a `next`-linked sequence. Not a fault.
    #[error("{uri} has no next page")]
    IterationExhausted { uri: String },

    /// Relations cannot be followed from a resource whose last fetch failed.
    #[error("{uri} is in error state (HTTP {status:?}); relations cannot be followed")]
    ErrorResource { uri: String, status: Option<u16> },

    /// Template variables were supplied to something that is not a template.
    #[error("{uri} is not templated and cannot be expanded")]
    NotTemplated { uri: String },

    /// The node has no URI (an embedded document without a self link, or the
    /// body of a write response), so it cannot be fetched or written to.
    #[error("orphan resource has no URI; it cannot be fetched or modified")]
    Orphan,

    #[error("{uri} did not return a JSON document: {detail}")]
    NotJson { uri: String, detail: String },

    #[error(transparent)]
    Uri(#[from] UriError),
}

impl NavError {
    /// `true` for the pagination terminator.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, NavError::IterationExhausted { .. })
    }

    /// The HTTP status code, for `Http` and `ErrorResource`.
    pub fn status(&self) -> Option<u16> {
        match self {
            NavError::Http { status, .. } => Some(*status),
            NavError::ErrorResource { status, .. } => *status,
            _ => None,
        }
    }

    /// The node an `Http` error was recorded on.
    pub fn node(&self) -> Option<&Node> {
        match self {
            NavError::Http { node, .. } => Some(node),
            _ => None,
        }
    }
}
