//! Link descriptors and the per-resource link relation index.
//!
//! A HAL `_links` section maps relation names to either one link object or
//! an array of them. [`LinkIndex`] flattens both shapes into ordered
//! [`LinkList`]s, keeping the source order of relations and of links within
//! a relation so iteration is deterministic.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::document::Document;

/// A single link object from a `_links` section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    /// The relation the link was listed under, exactly as written (possibly
    /// curie-prefixed).
    pub rel: String,
    /// Target URI, or a URI template when `templated` is set. Not resolved
    /// against the containing resource.
    pub href: String,
    pub templated: bool,
    /// The full raw link object, including `href` and every other attribute
    /// (`name`, `title`, `profile`, `type`, …).
    pub attributes: Document,
}

impl Link {
    /// A plain, non-templated link.
    pub fn new(rel: impl Into<String>, href: impl Into<String>) -> Self {
        let href = href.into();
        let mut attributes = Document::new();
        attributes.insert("href".into(), Value::String(href.clone()));
        Self {
            rel: rel.into(),
            href,
            templated: false,
            attributes,
        }
    }

    /// Read a link object. Returns `None` when `value` is not an object or has
    /// no string `href`.
    pub fn from_value(rel: &str, value: &Value) -> Option<Self> {
        let attributes = value.as_object()?.clone();
        let href = attributes.get("href")?.as_str()?.to_string();
        let templated = attributes
            .get("templated")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Some(Self {
            rel: rel.to_string(),
            href,
            templated,
            attributes,
        })
    }

    /// Any attribute of the raw link object.
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    fn attr_str(&self, name: &str) -> Option<&str> {
        self.attr(name).and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.attr_str("name")
    }

    pub fn title(&self) -> Option<&str> {
        self.attr_str("title")
    }

    pub fn profile(&self) -> Option<&str> {
        self.attr_str("profile")
    }

    /// The `type` hint (media type of the target).
    pub fn media_type(&self) -> Option<&str> {
        self.attr_str("type")
    }

    /// Whether attribute `attr` equals `value`.
    ///
    /// Values compare as JSON. A string `value` also matches a non-string
    /// attribute whose JSON rendering is that string, so `("id", "3")`
    /// matches `"id": 3`.
    pub fn matches(&self, attr: &str, value: &Value) -> bool {
        self.attr(attr).is_some_and(|found| value_matches(found, value))
    }
}

/// JSON equality, plus a string `wanted` matching the JSON rendering of a
/// non-string `found`.
pub(crate) fn value_matches(found: &Value, wanted: &Value) -> bool {
    match (found, wanted) {
        (found, wanted) if found == wanted => true,
        (Value::String(_), _) => false,
        (other, Value::String(s)) => other.to_string() == *s,
        _ => false,
    }
}

/// All links sharing one relation, in source order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct LinkList {
    rel: String,
    links: Vec<Link>,
}

impl LinkList {
    pub fn new(rel: impl Into<String>, links: Vec<Link>) -> Self {
        Self {
            rel: rel.into(),
            links,
        }
    }

    pub fn rel(&self) -> &str {
        &self.rel
    }

    pub fn as_slice(&self) -> &[Link] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Link> {
        self.links.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Link> {
        self.links.iter()
    }

    /// The first link whose attribute `attr` matches `value`.
    pub fn get_by(&self, attr: &str, value: impl Into<Value>) -> Option<&Link> {
        let value = value.into();
        self.links.iter().find(|l| l.matches(attr, &value))
    }

    /// Every link whose attribute `attr` matches `value`, in source order.
    pub fn get_all_by(&self, attr: &str, value: impl Into<Value>) -> Vec<&Link> {
        let value = value.into();
        self.links.iter().filter(|l| l.matches(attr, &value)).collect()
    }

    /// Shorthand for `get_by("name", name)`.
    pub fn named(&self, name: &str) -> Option<&Link> {
        self.get_by("name", name)
    }
}

impl<'a> IntoIterator for &'a LinkList {
    type Item = &'a Link;
    type IntoIter = std::slice::Iter<'a, Link>;

    fn into_iter(self) -> Self::IntoIter {
        self.links.iter()
    }
}

/// A resource's outbound links grouped by relation.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct LinkIndex {
    lists: Vec<LinkList>,
}

impl LinkIndex {
    /// Build the index from a raw `_links` object.
    ///
    /// Link objects without a string `href` are skipped.
    pub fn from_links(links: &Document) -> Self {
        let mut lists = Vec::with_capacity(links.len());
        for (rel, value) in links {
            let raw: Vec<&Value> = match value {
                Value::Array(items) => items.iter().collect(),
                other => vec![other],
            };
            let parsed: Vec<Link> = raw
                .into_iter()
                .filter_map(|v| {
                    let link = Link::from_value(rel, v);
                    if link.is_none() {
                        debug!("links: skipping malformed {rel:?} link: {v}");
                    }
                    link
                })
                .collect();
            lists.push(LinkList::new(rel.clone(), parsed));
        }
        Self { lists }
    }

    /// Links for `rel`, matched verbatim. Empty when absent.
    pub fn get(&self, rel: &str) -> &[Link] {
        self.list(rel).map(LinkList::as_slice).unwrap_or_default()
    }

    pub fn list(&self, rel: &str) -> Option<&LinkList> {
        self.lists.iter().find(|l| l.rel == rel)
    }

    /// `true` when `rel` is present, even with no links.
    pub fn contains(&self, rel: &str) -> bool {
        self.list(rel).is_some()
    }

    /// Relation names in source order.
    pub fn rels(&self) -> impl Iterator<Item = &str> {
        self.lists.iter().map(|l| l.rel.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LinkList> {
        self.lists.iter()
    }

    /// Number of relations.
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// The first `self` link, if any.
    pub fn self_link(&self) -> Option<&Link> {
        self.get("self").first()
    }
}

impl<'a> IntoIterator for &'a LinkIndex {
    type Item = &'a LinkList;
    type IntoIter = std::slice::Iter<'a, LinkList>;

    fn into_iter(self) -> Self::IntoIter {
        self.lists.iter()
    }
}
