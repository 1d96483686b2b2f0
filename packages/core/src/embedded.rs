//! `_embedded` resolution.
//!
//! An embedded document is treated exactly as if its resource had been
//! linked and fetched:
//!
//! - with a resolvable `self` link, the canonical node for that URI is
//!   looked up (or created) in the identity map and its state is replaced
//!   by the embedded body, status `Fetched`;
//! - without one, an *orphan* is built: a `Fetched` node with no URI, never
//!   registered in the identity map, whose parent is the containing node.
//!
//! Nested `_embedded` sections are resolved recursively while each node's
//! snapshot is built, so the whole tree is in place before any accessor
//! returns.

use serde_json::Value;
use tracing::debug;

use crate::document::{Document, HalDocument};
use crate::link::LinkIndex;
use crate::node::{Node, Snapshot, Status};
use crate::uri;

/// Embedded resources of one node, grouped by relation in source order.
#[derive(Debug, Clone, Default)]
pub struct Embedded {
    entries: Vec<(String, Vec<Node>)>,
}

impl Embedded {
    /// Nodes embedded under `rel`, matched verbatim. `Some(&[])` when the
    /// relation is present with no documents.
    pub fn get(&self, rel: &str) -> Option<&[Node]> {
        self.entries
            .iter()
            .find(|(r, _)| r == rel)
            .map(|(_, nodes)| nodes.as_slice())
    }

    pub fn contains(&self, rel: &str) -> bool {
        self.get(rel).is_some()
    }

    pub fn rels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(r, _)| r.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Node])> {
        self.entries.iter().map(|(r, n)| (r.as_str(), n.as_slice()))
    }

    /// Number of relations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolve a raw `_embedded` object on behalf of `container`.
pub(crate) fn resolve(raw: &Document, container: &Node) -> Embedded {
    let entries = raw
        .iter()
        .map(|(rel, value)| {
            let docs: Vec<&Value> = match value {
                Value::Array(items) => items.iter().collect(),
                other => vec![other],
            };
            let nodes = docs
                .into_iter()
                .filter_map(|doc| match doc {
                    Value::Object(map) => Some(node_from_embedded(map.clone(), container)),
                    other => {
                        debug!("embedded: skipping non-object {rel:?} entry: {other}");
                        None
                    }
                })
                .collect();
            (rel.clone(), nodes)
        })
        .collect();
    Embedded { entries }
}

/// The node an embedded document stands for.
pub(crate) fn node_from_embedded(doc: Document, container: &Node) -> Node {
    let hal = HalDocument::from_value(Value::Object(doc));
    let links = LinkIndex::from_links(&hal.links);
    let self_uri = links
        .self_link()
        .filter(|l| !l.templated)
        .and_then(|l| uri::resolve(container.base().as_deref(), &l.href).ok())
        .filter(|u| Some(u.as_str()) != container.uri());

    match self_uri {
        Some(uri) => {
            let node = Node::canonical(container.session(), &uri);
            let snapshot = Snapshot::build(&node, hal, Status::Fetched, None);
            node.install(snapshot);
            debug!("embedded: populated {uri} from {container}");
            node
        }
        None => {
            let node = Node::orphan(container.session(), container);
            let snapshot = Snapshot::build(&node, hal, Status::Fetched, None);
            node.install(snapshot);
            debug!("embedded: orphan under {container}");
            node
        }
    }
}
