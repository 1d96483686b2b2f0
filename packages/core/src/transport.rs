//! The HTTP boundary.
//!
//! The navigation engine never opens a socket itself. Every fetch and every
//! write goes through a [`Transport`], which receives a fully-built
//! [`Request`] (method, absolute URI, headers, body, credentials) and returns
//! either a [`Response`] or a [`TransportFailure`].
//!
//! Connection handling, TLS, redirects, and timeouts are the transport's
//! business. The `halnav-client` crate ships a `reqwest`-backed
//! implementation; tests use an in-memory one.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// The HTTP methods the navigator issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials attached to a session.
///
/// The core never interprets these; they are forwarded verbatim on every
/// request and the transport decides how to apply them.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// HTTP Basic authentication.
    Basic {
        username: String,
        password: Option<String>,
    },
    /// `Authorization: Bearer <token>`.
    Bearer(String),
    /// An arbitrary header carrying a secret (e.g. `X-Api-Key`).
    Header { name: String, value: String },
}

/// Secrets are never printed.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::Bearer(_) => f.debug_tuple("Bearer").field(&"<redacted>").finish(),
            Credentials::Header { name, .. } => f
                .debug_struct("Header")
                .field("name", name)
                .field("value", &"<redacted>")
                .finish(),
        }
    }
}

/// A request handed to the transport.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Absolute URI.
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub credentials: Option<Credentials>,
}

impl Request {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// What came back over the wire.
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub status: u16,
    /// Reason phrase, e.g. `"Not Found"`.
    pub reason: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            reason: canonical_reason(status).map(str::to_string),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Builder-style header setter.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// `true` for 4xx and 5xx.
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// Coarse classification of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The request did not complete within the transport's deadline.
    Timeout,
    /// DNS resolution or connection establishment failed.
    Connect,
    Other,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Connect => write!(f, "connect"),
            FailureKind::Other => write!(f, "transport"),
        }
    }
}

/// A network-level failure: no HTTP response was received.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} failure: {message}")]
pub struct TransportFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TransportFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Connect, message)
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == FailureKind::Timeout
    }
}

/// Sends requests on behalf of a session.
///
/// Implementations must be shareable across threads: a session and all of its
/// nodes hold one `Arc<dyn Transport>`. Implementations must not retry
/// implicitly.
pub trait Transport: Send + Sync {
    fn request(&self, request: &Request) -> Result<Response, TransportFailure>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn request(&self, request: &Request) -> Result<Response, TransportFailure> {
        (**self).request(request)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Reason phrases for the status codes a HAL API commonly returns.
pub fn canonical_reason(status: u16) -> Option<&'static str> {
    Some(match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        410 => "Gone",
        415 => "Unsupported Media Type",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let r = Response::new(200, "{}").with_header("Content-Type", "application/hal+json");
        assert_eq!(r.content_type(), Some("application/hal+json"));
        assert_eq!(r.header("CONTENT-TYPE"), Some("application/hal+json"));
        assert_eq!(r.header("location"), None);
    }

    #[test]
    fn response_new_fills_reason() {
        assert_eq!(Response::new(404, "").reason.as_deref(), Some("Not Found"));
        assert_eq!(Response::new(299, "").reason, None);
    }

    #[test]
    fn credentials_debug_redacts_secrets() {
        let c = Credentials::Basic {
            username: "alice".into(),
            password: Some("hunter2".into()),
        };
        let printed = format!("{c:?}");
        assert!(printed.contains("alice"));
        assert!(!printed.contains("hunter2"));
        assert!(!format!("{:?}", Credentials::Bearer("tok".into())).contains("tok"));
    }

    #[test]
    fn failure_display() {
        let f = TransportFailure::timeout("deadline elapsed");
        assert!(f.is_timeout());
        assert_eq!(f.to_string(), "timeout failure: deadline elapsed");
    }
}
