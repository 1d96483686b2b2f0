//! Session-scoped identity map: one canonical [`Node`] per absolute URI.
//!
//! Entries are weak. The map never keeps a node alive; a node that no caller
//! (and no containing resource) holds any more is reclaimed, and the next
//! lookup of its URI builds a fresh, unfetched one.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, Weak};

use tracing::debug;

use crate::node::{Node, NodeInner};

#[derive(Default)]
pub struct IdentityMap {
    nodes: Mutex<HashMap<String, Weak<NodeInner>>>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Weak<NodeInner>>> {
        self.nodes.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// The live node for `uri`, or the one `make` builds, which is recorded
    /// before the lock is released so concurrent callers agree on it.
    pub(crate) fn get_or_insert_with(&self, uri: &str, make: impl FnOnce() -> Node) -> Node {
        let mut nodes = self.lock();
        if let Some(node) = nodes.get(uri).and_then(Node::from_weak) {
            return node;
        }
        nodes.retain(|_, weak| weak.strong_count() > 0);
        let node = make();
        nodes.insert(uri.to_string(), node.downgrade());
        debug!("identity: registered {uri} ({} live)", nodes.len());
        node
    }

    /// The live node for `uri`, if any.
    pub fn get(&self, uri: &str) -> Option<Node> {
        self.lock().get(uri).and_then(Node::from_weak)
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.get(uri).is_some()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.lock().values().filter(|w| w.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// URIs of the live nodes, sorted.
    pub fn uris(&self) -> Vec<String> {
        let mut uris: Vec<String> = self
            .lock()
            .iter()
            .filter(|(_, w)| w.strong_count() > 0)
            .map(|(uri, _)| uri.clone())
            .collect();
        uris.sort();
        uris
    }
}

impl std::fmt::Debug for IdentityMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityMap").field("live", &self.len()).finish()
    }
}
