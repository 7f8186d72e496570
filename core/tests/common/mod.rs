#![allow(dead_code)]

use parking_lot::RwLock;
use routecache::{Collaborators, Content, ContentId, ContentTree, Domain, DomainRegistry, PathGenerator, RouteCache, RouteCacheConfig, NOT_RESOLVABLE};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Node {
    id: ContentId,
    parent: Option<ContentId>,
    path: String,
    alternates: Vec<String>,
}

/// Content tree whose paths are set by hand; counts tree walks.
#[derive(Default)]
pub struct MemorySite {
    nodes: RwLock<Vec<Node>>,
    domains: RwLock<Vec<Domain>>,
    children_calls: AtomicUsize,
}

impl MemorySite {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    pub fn add(&self, id: ContentId, parent: Option<ContentId>, path: &str) { self.add_with_alternates(id, parent, path, &[]); }

    pub fn add_with_alternates(&self, id: ContentId, parent: Option<ContentId>, path: &str, alternates: &[&str]) {
        self.nodes.write().push(Node {
            id,
            parent,
            path: path.to_string(),
            alternates: alternates.iter().map(|s| s.to_string()).collect(),
        });
    }

    pub fn add_domain(&self, host: &str, root: ContentId) {
        self.domains.write().push(Domain { host_pattern: host.to_string(), root_content_id: root });
    }

    pub fn set_path(&self, id: ContentId, path: &str) {
        if let Some(node) = self.nodes.write().iter_mut().find(|n| n.id == id) {
            node.path = path.to_string();
        }
    }

    /// Remove a node and everything below it.
    pub fn delete(&self, id: ContentId) {
        let mut doomed = vec![id];
        let mut nodes = self.nodes.write();
        let mut i = 0;
        while i < doomed.len() {
            let current = doomed[i];
            doomed.extend(nodes.iter().filter(|n| n.parent == Some(current)).map(|n| n.id));
            i += 1;
        }
        nodes.retain(|n| !doomed.contains(&n.id));
    }

    pub fn children_calls(&self) -> usize { self.children_calls.load(Ordering::SeqCst) }
}

impl ContentTree for MemorySite {
    fn get_by_id(&self, id: ContentId) -> Option<Content> {
        self.nodes.read().iter().find(|n| n.id == id).map(|n| Content { id: n.id, parent_id: n.parent })
    }

    fn children(&self, id: ContentId) -> Vec<Content> {
        self.children_calls.fetch_add(1, Ordering::SeqCst);
        self.nodes
            .read()
            .iter()
            .filter(|n| n.parent == Some(id))
            .map(|n| Content { id: n.id, parent_id: n.parent })
            .collect()
    }

    fn root_nodes(&self) -> Vec<Content> {
        self.nodes.read().iter().filter(|n| n.parent.is_none()).map(|n| Content { id: n.id, parent_id: None }).collect()
    }
}

impl PathGenerator for MemorySite {
    fn canonical_path(&self, id: ContentId) -> String {
        self.nodes.read().iter().find(|n| n.id == id).map(|n| n.path.clone()).unwrap_or_else(|| NOT_RESOLVABLE.to_string())
    }

    fn alternate_paths(&self, id: ContentId) -> Vec<String> {
        self.nodes.read().iter().find(|n| n.id == id).map(|n| n.alternates.clone()).unwrap_or_default()
    }
}

impl DomainRegistry for MemorySite {
    fn all_domains(&self) -> Vec<Domain> { self.domains.read().clone() }
}

pub fn config_in(dir: &Path) -> RouteCacheConfig {
    RouteCacheConfig { cache_file: dir.join("routecache.json"), ..Default::default() }
}

pub fn open(site: &Arc<MemorySite>, config: RouteCacheConfig) -> RouteCache {
    RouteCache::open(config, Collaborators::from_shared(site.clone()))
}

/// Root 100 (`/`) with `a` (`/a/`) and its child `b` (`/a/b/`).
pub fn small_site() -> Arc<MemorySite> {
    let site = MemorySite::new();
    site.add(100, None, "/");
    site.add(1, Some(100), "/a/");
    site.add(2, Some(1), "/a/b/");
    site
}
