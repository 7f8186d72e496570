//! Interfaces of the collaborators the route cache reads from.
//!
//! The cache never computes URLs or walks content on its own; everything it knows
//! about the live site comes through these traits.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type ContentId = u32;

/// Path value a generator returns for content that has no URL (e.g. unpublished).
pub const NOT_RESOLVABLE: &str = "#";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Content {
    pub id: ContentId,
    pub parent_id: Option<ContentId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub host_pattern: String,
    pub root_content_id: ContentId,
}

pub trait ContentTree: Send + Sync {
    fn get_by_id(&self, id: ContentId) -> Option<Content>;
    fn children(&self, id: ContentId) -> Vec<Content>;
    /// Top-level content nodes, in tree order.
    fn root_nodes(&self) -> Vec<Content>;
}

pub trait PathGenerator: Send + Sync {
    /// Canonical path (or absolute URL) of the content, or [`NOT_RESOLVABLE`].
    fn canonical_path(&self, id: ContentId) -> String;
    fn alternate_paths(&self, id: ContentId) -> Vec<String>;
}

pub trait DomainRegistry: Send + Sync {
    fn all_domains(&self) -> Vec<Domain>;
}

/// Bundle of the three collaborators a [`crate::RouteCache`] is built over.
#[derive(Clone)]
pub struct Collaborators {
    pub tree: Arc<dyn ContentTree>,
    pub paths: Arc<dyn PathGenerator>,
    pub domains: Arc<dyn DomainRegistry>,
}

impl Collaborators {
    pub fn new(tree: Arc<dyn ContentTree>, paths: Arc<dyn PathGenerator>, domains: Arc<dyn DomainRegistry>) -> Self {
        Self { tree, paths, domains }
    }

    /// Use one object that implements every collaborator trait.
    pub fn from_shared<S>(source: Arc<S>) -> Self
    where
        S: ContentTree + PathGenerator + DomainRegistry + 'static,
    {
        Self { tree: source.clone(), paths: source.clone(), domains: source }
    }
}

/// Pick the root content id serving `host`: first domain whose pattern contains the
/// host, else the first domain, else the first top-level node.
pub fn root_for_host(domains: &dyn DomainRegistry, tree: &dyn ContentTree, host: Option<&str>) -> Option<ContentId> {
    let all = domains.all_domains();
    let matched = host
        .filter(|h| !h.is_empty())
        .and_then(|h| all.iter().find(|d| d.host_pattern.to_lowercase().contains(&h.to_lowercase())));
    if let Some(domain) = matched.or_else(|| all.first()) {
        return Some(domain.root_content_id);
    }
    tree.root_nodes().first().map(|c| c.id)
}
