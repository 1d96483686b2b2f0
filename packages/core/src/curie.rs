//! CURIE resolution for link relations.
//!
//! A CURIE (`prefix:suffix`) abbreviates a relation URI. The templates that
//! expand each prefix arrive as `curies` links on the resource itself:
//!
//! ```json
//! "curies": [{ "name": "acme", "href": "https://docs.acme.example/rels/{rel}", "templated": true }]
//! ```
//!
//! # Lookup precedence
//!
//! A session may name a *default curie*, so callers can write `widgets`
//! instead of `acme:widgets`. [`lookup_keys`] turns the relation a caller
//! asked for into the ordered list of keys to try against a resource's links
//! and embedded sections. The first key that is present wins.
//!
//! | Asked for | Keys, in order |
//! |-----------|----------------|
//! | absolute relation URI a curie compacts | compact form, then verbatim |
//! | `prefix:suffix` | verbatim; then `suffix` if `prefix` is the default and `suffix` is not IANA-registered |
//! | short IANA name (`next`) | verbatim, then `default:next` |
//! | other short name (`widgets`) | `default:widgets`, then verbatim |
//!
//! An IANA-registered relation therefore always beats the default-curie
//! reading of the same word when the resource offers both.

use std::fmt;

use crate::link::LinkIndex;
use crate::template::{UriTemplate, Variables};

/// The relation names of the IANA Link Relations registry.
pub const IANA_RELATIONS: &[&str] = &[
    "about", "acl", "alternate", "amphtml", "api-catalog", "appendix",
    "apple-touch-icon", "apple-touch-startup-image", "archives", "author",
    "blocked-by", "bookmark", "c2pa-manifest", "canonical", "chapter", "cite-as",
    "collection", "compression-dictionary", "contents", "convertedfrom",
    "copyright", "create-form", "current", "deprecation", "describedby",
    "describes", "disclosure", "dns-prefetch", "duplicate", "edit", "edit-form",
    "edit-media", "enclosure", "external", "first", "geofeed", "glossary", "help",
    "hosts", "hub", "ice-server", "icon", "index", "intervalafter",
    "intervalbefore", "intervalcontains", "intervaldisjoint", "intervalduring",
    "intervalequals", "intervalfinishedby", "intervalfinishes", "intervalin",
    "intervalmeets", "intervalmetby", "intervaloverlappedby", "intervaloverlaps",
    "intervalstartedby", "intervalstarts", "item", "last", "latest-version",
    "license", "linkset", "lrdd", "manifest", "mask-icon", "me", "media-feed",
    "memento", "micropub", "modulepreload", "monitor", "monitor-group", "next",
    "next-archive", "nofollow", "noopener", "noreferrer", "opener", "openid2.local_id",
    "openid2.provider", "original", "p3pv1", "payment", "pingback", "preconnect",
    "predecessor-version", "prefetch", "preload", "prerender", "prev",
    "prev-archive", "preview", "previous", "privacy-policy", "profile",
    "publication", "related", "replies", "restconf", "ruleinput", "search",
    "section", "self", "service", "service-desc", "service-doc", "service-meta",
    "sip-trunking-capability", "sponsored", "start", "status", "stylesheet",
    "subsection", "successor-version", "sunset", "tag", "terms-of-service",
    "timegate", "timemap", "type", "ugc", "up", "version-history", "via",
    "webmention", "working-copy", "working-copy-of",
];

/// Whether `rel` is a registered IANA relation name (case-insensitive).
pub fn is_iana_relation(rel: &str) -> bool {
    IANA_RELATIONS.iter().any(|r| r.eq_ignore_ascii_case(rel))
}

/// Split `prefix:suffix`. Absolute URIs (`scheme://…`) are not curies.
pub fn split_curie(rel: &str) -> Option<(&str, &str)> {
    if rel.contains("://") {
        return None;
    }
    rel.split_once(':')
        .filter(|(prefix, suffix)| !prefix.is_empty() && !suffix.is_empty())
}

/// One registered prefix and the template it expands with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Curie {
    pub prefix: String,
    /// Template containing a `{rel}` placeholder.
    pub template: String,
}

impl Curie {
    pub fn new(prefix: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            template: template.into(),
        }
    }

    /// Expand `suffix` into the full relation URI.
    pub fn expand(&self, suffix: &str) -> String {
        let vars = Variables::new().with("rel", suffix);
        UriTemplate::parse(&self.template)
            .and_then(|t| t.expand(&vars))
            .unwrap_or_else(|_| self.template.replace("{rel}", suffix))
    }

    /// Reverse of [`Curie::expand`]: `prefix:suffix` when `uri` fits the
    /// template. The suffix is percent-decoded, undoing the encoding
    /// `expand` applies.
    pub fn compact(&self, uri: &str) -> Option<String> {
        let (head, tail) = self.template.split_once("{rel}")?;
        let raw = uri.strip_prefix(head)?.strip_suffix(tail)?;
        if raw.is_empty() {
            return None;
        }
        let suffix = urlencoding::decode(raw).map_or_else(|_| raw.to_string(), |s| s.into_owned());
        Some(format!("{}:{}", self.prefix, suffix))
    }
}

impl fmt::Display for Curie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.prefix, self.template)
    }
}

/// The curies declared by one resource.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CurieRegistry {
    curies: Vec<Curie>,
}

impl CurieRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the `curies` links of a resource. Links without a `name` are
    /// ignored.
    pub fn from_index(links: &LinkIndex) -> Self {
        let curies = links
            .get("curies")
            .iter()
            .filter_map(|l| Some(Curie::new(l.name()?, l.href.clone())))
            .collect();
        Self { curies }
    }

    /// Register (or replace) a prefix.
    pub fn insert(&mut self, curie: Curie) {
        self.curies.retain(|c| c.prefix != curie.prefix);
        self.curies.push(curie);
    }

    pub fn get(&self, prefix: &str) -> Option<&Curie> {
        self.curies.iter().find(|c| c.prefix == prefix)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Curie> {
        self.curies.iter()
    }

    pub fn len(&self) -> usize {
        self.curies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curies.is_empty()
    }

    /// The full relation URI for `rel` when its prefix is registered.
    pub fn expand(&self, rel: &str) -> Option<String> {
        let (prefix, suffix) = split_curie(rel)?;
        self.get(prefix).map(|c| c.expand(suffix))
    }

    /// The curie form of a relation URI, using the first registered prefix
    /// whose template fits.
    pub fn compact(&self, uri: &str) -> Option<String> {
        self.curies.iter().find_map(|c| c.compact(uri))
    }
}

/// Ordered candidate keys for looking `rel` up in a resource. See the module
/// documentation for the precedence table.
pub fn lookup_keys(rel: &str, registry: &CurieRegistry, default_curie: Option<&str>) -> Vec<String> {
    let mut keys: Vec<String> = Vec::with_capacity(2);
    let mut push = |k: String| {
        if !keys.contains(&k) {
            keys.push(k);
        }
    };

    if rel.contains("://") {
        if let Some(compact) = registry.compact(rel) {
            push(compact);
        }
        push(rel.to_string());
        return keys;
    }

    match (split_curie(rel), default_curie) {
        (Some((prefix, suffix)), Some(default)) if prefix == default => {
            push(rel.to_string());
            if !is_iana_relation(suffix) {
                push(suffix.to_string());
            }
        }
        (Some(_), _) | (None, None) => push(rel.to_string()),
        (None, Some(default)) if is_iana_relation(rel) => {
            push(rel.to_string());
            push(format!("{default}:{rel}"));
        }
        (None, Some(default)) => {
            push(format!("{default}:{rel}"));
            push(rel.to_string());
        }
    }
    keys
}
