//! HAL document parsing.
//!
//! A response body is split into three parts: the `_links` section, the
//! `_embedded` section, and everything else (the resource *state*). The state
//! is an ordered JSON object; key order follows the source document.

use serde_json::{Map, Value};
use thiserror::Error;

/// An ordered JSON object. Used for resource state and raw HAL sections.
pub type Document = Map<String, Value>;

/// Reserved key holding the link section.
pub const LINKS_KEY: &str = "_links";
/// Reserved key holding the embedded-resource section.
pub const EMBEDDED_KEY: &str = "_embedded";

/// Errors produced while parsing a response body.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The body was declared (or required) to be JSON but is not.
    #[error("body is not valid JSON: {0}")]
    NotJson(#[from] serde_json::Error),
}

/// A parsed HAL resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HalDocument {
    /// Every top-level key other than `_links` and `_embedded`.
    pub state: Document,
    /// The raw `_links` object (empty when absent).
    pub links: Document,
    /// The raw `_embedded` object (empty when absent).
    pub embedded: Document,
}

impl HalDocument {
    /// Split a JSON value into state, links, and embedded sections.
    ///
    /// A non-object value is wrapped as `{"value": <value>}` so that state is
    /// always a document.
    pub fn from_value(value: Value) -> Self {
        let mut state = match value {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".into(), other);
                map
            }
        };
        let links = take_object(&mut state, LINKS_KEY);
        let embedded = take_object(&mut state, EMBEDDED_KEY);
        Self {
            state,
            links,
            embedded,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty() && self.links.is_empty() && self.embedded.is_empty()
    }
}

fn take_object(map: &mut Document, key: &str) -> Document {
    match map.remove(key) {
        Some(Value::Object(section)) => section,
        _ => Map::new(),
    }
}

/// Turns raw response bodies into [`HalDocument`]s.
pub trait DocumentParser: Send + Sync {
    /// Parse `body` according to `content_type`.
    ///
    /// Returns `Ok(None)` when the body is not a JSON document at all (for
    /// instance `text/html`), `Ok(Some(_))` for JSON bodies and for empty
    /// bodies, and `Err` when the content type claims JSON but the body does
    /// not parse.
    fn parse(&self, body: &[u8], content_type: Option<&str>) -> Result<Option<HalDocument>, ParseError>;
}

/// The default parser. Any body that parses as JSON is accepted whatever its
/// content type; unparseable bodies are an error only under a JSON media type
/// (`application/json`, `application/hal+json`, `+json`) or none at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct HalParser;

impl DocumentParser for HalParser {
    fn parse(&self, body: &[u8], content_type: Option<&str>) -> Result<Option<HalDocument>, ParseError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Some(HalDocument::default()));
        }
        match serde_json::from_slice::<Value>(body) {
            Ok(value) => Ok(Some(HalDocument::from_value(value))),
            Err(e) => match content_type {
                Some(ct) if !is_json_media_type(ct) => Ok(None),
                _ => Err(ParseError::NotJson(e)),
            },
        }
    }
}

/// `true` for `application/json`, `application/hal+json`, and other `+json`
/// types. Parameters such as `charset` are ignored.
pub fn is_json_media_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}
