use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::key::{is_below, key_matches, parent_key, root_prefix};
use crate::provider::ContentId;

/// One indexed route. Children are the routes whose key extends this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub key: String,
    pub content_id: ContentId,
    #[serde(default)]
    pub children: Vec<RouteEntry>,
}

impl RouteEntry {
    pub fn new(key: impl Into<String>, content_id: ContentId) -> Self {
        Self { key: key.into(), content_id, children: Vec::new() }
    }

    fn subtree_len(&self) -> usize { 1 + self.children.iter().map(RouteEntry::subtree_len).sum::<usize>() }
}

/// In-memory route tree. `routes` are the children of the synthetic root.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteIndex {
    pub routes: Vec<RouteEntry>,
}

/// Outcome of removing entries by content id.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    /// Entries dropped, nested ones included.
    pub removed: usize,
    /// A direct child of the synthetic root was among them.
    pub root_level: bool,
}

impl RouteIndex {
    pub fn new() -> Self { Self::default() }

    pub fn is_empty(&self) -> bool { self.routes.is_empty() }

    pub fn len(&self) -> usize { self.routes.iter().map(RouteEntry::subtree_len).sum() }

    pub fn clear(&mut self) { self.routes.clear(); }

    /// Pre-order walk, i.e. document order of the persisted form.
    pub fn iter(&self) -> Iter<'_> { Iter { stack: self.routes.iter().rev().collect() } }

    pub fn root_keys(&self) -> Vec<&str> { self.routes.iter().map(|e| e.key.as_str()).collect() }

    /// First entry matching `key`. Exact lookups only descend into entries whose key
    /// is a path prefix of `key`; compatibility lookups scan the whole tree.
    pub fn find(&self, key: &str, compat: bool) -> Option<&RouteEntry> {
        if compat {
            return self.iter().find(|e| key_matches(&e.key, key, true));
        }
        find_exact(&self.routes, key)
    }

    pub fn lookup(&self, key: &str, compat: bool) -> Option<ContentId> { self.find(key, compat).map(|e| e.content_id) }

    pub fn contains_content(&self, id: ContentId) -> bool { self.iter().any(|e| e.content_id == id) }

    /// Every key currently pointing at `id`.
    pub fn keys_for(&self, id: ContentId) -> Vec<String> {
        self.iter().filter(|e| e.content_id == id).map(|e| e.key.clone()).collect()
    }

    /// Insert `key` unless a matching entry already exists. The entry nests under its
    /// parent key, else under its root-id entry, else at the top level. `compat` only
    /// widens the existence check; placement always follows the key itself.
    pub fn insert(&mut self, key: &str, content_id: ContentId, compat: bool) -> bool {
        if self.find(key, compat).is_some() {
            return false;
        }
        let entry = RouteEntry::new(key, content_id);
        let Some(parent) = parent_key(key) else {
            self.routes.push(entry);
            return true;
        };
        let target = if find_exact(&self.routes, parent).is_some() { parent } else { root_prefix(key) };
        match find_mut(&mut self.routes, target) {
            Some(node) => node.children.push(entry),
            None => self.routes.push(entry),
        }
        true
    }

    /// Whether an entry stored under exactly `key` points at `id`, wherever it sits.
    pub fn holds(&self, key: &str, id: ContentId) -> bool { self.iter().any(|e| e.key == key && e.content_id == id) }

    /// Drop the entry stored under exactly `key`; its children take its place.
    pub fn remove_key(&mut self, key: &str) -> Removal {
        let root_level = self.routes.iter().any(|e| e.key == key);
        let removed = usize::from(take_key(&mut self.routes, key));
        Removal { removed, root_level: root_level && removed > 0 }
    }

    /// Drop every entry owned by one of `ids`, together with the routes nested below it.
    pub fn remove_content(&mut self, ids: &HashSet<ContentId>) -> Removal {
        let root_level = self.routes.iter().any(|e| ids.contains(&e.content_id));
        let removed = prune(&mut self.routes, ids);
        Removal { removed, root_level }
    }

    /// Keys stored more than once with their counts, in order of first appearance.
    pub fn duplicates(&self) -> Vec<(String, usize)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut order = Vec::new();
        for entry in self.iter() {
            let count = counts.entry(entry.key.as_str()).or_insert(0);
            if *count == 0 {
                order.push(entry.key.as_str());
            }
            *count += 1;
        }
        order
            .into_iter()
            .filter_map(|k| counts.get(k).filter(|c| **c > 1).map(|c| (k.to_string(), *c)))
            .collect()
    }

    /// Keep the first entry of each key in document order and remove the others.
    pub fn dedup(&mut self) -> Vec<(String, usize)> {
        let duplicates = self.duplicates();
        if !duplicates.is_empty() {
            let mut seen = HashSet::new();
            drop_repeats(&mut self.routes, &mut seen);
        }
        duplicates
    }
}

fn find_exact<'a>(nodes: &'a [RouteEntry], key: &str) -> Option<&'a RouteEntry> {
    for node in nodes {
        if node.key == key {
            return Some(node);
        }
        if is_below(&node.key, key) {
            if let Some(found) = find_exact(&node.children, key) {
                return Some(found);
            }
        }
    }
    None
}

fn find_mut<'a>(nodes: &'a mut [RouteEntry], key: &str) -> Option<&'a mut RouteEntry> {
    for node in nodes.iter_mut() {
        if node.key == key {
            return Some(node);
        }
        if is_below(&node.key, key) {
            if let Some(found) = find_mut(&mut node.children, key) {
                return Some(found);
            }
        }
    }
    None
}

fn take_key(nodes: &mut Vec<RouteEntry>, key: &str) -> bool {
    if let Some(pos) = nodes.iter().position(|n| n.key == key) {
        let removed = nodes.remove(pos);
        nodes.splice(pos..pos, removed.children);
        return true;
    }
    nodes.iter_mut().any(|n| take_key(&mut n.children, key))
}

fn prune(nodes: &mut Vec<RouteEntry>, ids: &HashSet<ContentId>) -> usize {
    let mut removed = 0;
    nodes.retain(|n| {
        if ids.contains(&n.content_id) {
            removed += n.subtree_len();
            false
        } else {
            true
        }
    });
    for node in nodes.iter_mut() {
        removed += prune(&mut node.children, ids);
    }
    removed
}

fn drop_repeats(nodes: &mut Vec<RouteEntry>, seen: &mut HashSet<String>) {
    let mut i = 0;
    while i < nodes.len() {
        if seen.insert(nodes[i].key.clone()) {
            drop_repeats(&mut nodes[i].children, seen);
            i += 1;
        } else {
            let removed = nodes.remove(i);
            nodes.splice(i..i, removed.children);
        }
    }
}

pub struct Iter<'a> {
    stack: Vec<&'a RouteEntry>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a RouteEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
