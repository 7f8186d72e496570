//! JSON-backed content source: the content tree, the URL generator and the domain
//! list a route cache is served over.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use routecache::{Content, ContentId, ContentTree, Domain, DomainRegistry, PathGenerator, RouteCacheConfig, NOT_RESOLVABLE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

fn default_published() -> bool { true }

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteDefinition {
    /// First entry is the default culture.
    #[serde(default)]
    pub cultures: Vec<String>,
    #[serde(default)]
    pub domains: Vec<SiteDomain>,
    #[serde(default)]
    pub nodes: Vec<SiteNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteDomain {
    pub host: String,
    pub root: ContentId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteNode {
    pub id: ContentId,
    #[serde(default)]
    pub parent: Option<ContentId>,
    pub segment: String,
    /// Per-culture URL segments; missing cultures fall back to `segment`.
    #[serde(default)]
    pub segments: BTreeMap<String, String>,
    /// Extra paths or absolute URLs the node also answers to.
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default = "default_published")]
    pub published: bool,
}

pub struct StaticSite {
    definition: RwLock<SiteDefinition>,
    culture_in_path: bool,
    trim_trailing_slash: bool,
}

impl StaticSite {
    pub fn new(definition: SiteDefinition, config: &RouteCacheConfig) -> Self {
        Self {
            definition: RwLock::new(definition),
            culture_in_path: config.culture_in_path,
            trim_trailing_slash: config.trim_trailing_slash,
        }
    }

    pub fn load<P: AsRef<Path>>(path: P, config: &RouteCacheConfig) -> Result<Self> {
        Ok(Self::new(read_definition(path)?, config))
    }

    pub fn replace(&self, definition: SiteDefinition) { *self.definition.write() = definition; }

    pub fn cultures(&self) -> Vec<String> { self.definition.read().cultures.clone() }

    /// Canonical path for a given culture (`None` = default segments).
    fn path_for(&self, def: &SiteDefinition, chain: &[&SiteNode], culture: Option<&str>) -> String {
        let start = chain.iter().rposition(|n| is_root(def, n.id)).map_or(0, |i| i + 1);
        let segments: Vec<&str> = chain[start..]
            .iter()
            .map(|n| culture.and_then(|c| n.segments.get(c)).unwrap_or(&n.segment).as_str())
            .collect();

        let mut path = String::from("/");
        if self.culture_in_path {
            if let Some(c) = culture.or_else(|| def.cultures.first().map(String::as_str)) {
                path.push_str(c);
                path.push('/');
            }
        }
        path.push_str(&segments.join("/"));
        if !segments.is_empty() {
            path.push('/');
        }
        if self.trim_trailing_slash && path.len() > 1 {
            path.pop();
        }
        path.to_lowercase()
    }
}

pub fn read_definition<P: AsRef<Path>>(path: P) -> Result<SiteDefinition> {
    let path = path.as_ref();
    let buf = std::fs::read_to_string(path).with_context(|| format!("reading site file {}", path.display()))?;
    let def = serde_json::from_str(&buf).with_context(|| format!("parsing site file {}", path.display()))?;
    Ok(def)
}

/// Domain roots, or the first top-level node when there are no domains.
fn is_root(def: &SiteDefinition, id: ContentId) -> bool {
    if def.domains.is_empty() {
        return def.nodes.iter().find(|n| n.parent.is_none()).is_some_and(|n| n.id == id);
    }
    def.domains.iter().any(|d| d.root == id)
}

/// Top-down ancestor chain ending with `id`; `None` if any link is missing,
/// unpublished or cyclic.
fn published_chain(def: &SiteDefinition, id: ContentId) -> Option<Vec<&SiteNode>> {
    let mut chain = Vec::new();
    let mut current = Some(id);
    while let Some(cid) = current {
        let node = def.nodes.iter().find(|n| n.id == cid)?;
        if !node.published || chain.len() > def.nodes.len() {
            return None;
        }
        chain.push(node);
        current = node.parent;
    }
    chain.reverse();
    Some(chain)
}

impl ContentTree for StaticSite {
    fn get_by_id(&self, id: ContentId) -> Option<Content> {
        let def = self.definition.read();
        def.nodes.iter().find(|n| n.id == id).map(|n| Content { id: n.id, parent_id: n.parent })
    }

    fn children(&self, id: ContentId) -> Vec<Content> {
        let def = self.definition.read();
        def.nodes.iter().filter(|n| n.parent == Some(id)).map(|n| Content { id: n.id, parent_id: n.parent }).collect()
    }

    fn root_nodes(&self) -> Vec<Content> {
        let def = self.definition.read();
        def.nodes.iter().filter(|n| n.parent.is_none()).map(|n| Content { id: n.id, parent_id: None }).collect()
    }
}

impl PathGenerator for StaticSite {
    fn canonical_path(&self, id: ContentId) -> String {
        let def = self.definition.read();
        match published_chain(&def, id) {
            Some(chain) => self.path_for(&def, &chain, None),
            None => NOT_RESOLVABLE.to_string(),
        }
    }

    fn alternate_paths(&self, id: ContentId) -> Vec<String> {
        let def = self.definition.read();
        let Some(chain) = published_chain(&def, id) else {
            return Vec::new();
        };
        let canonical = self.path_for(&def, &chain, None);
        let mut paths: Vec<String> = def.cultures.iter().map(|c| self.path_for(&def, &chain, Some(c))).collect();
        if let Some(node) = chain.last() {
            paths.extend(node.aliases.iter().map(|a| a.to_lowercase()));
        }
        paths.retain(|p| *p != canonical);
        paths.sort();
        paths.dedup();
        paths
    }
}

impl DomainRegistry for StaticSite {
    fn all_domains(&self) -> Vec<Domain> {
        let def = self.definition.read();
        def.domains.iter().map(|d| Domain { host_pattern: d.host.clone(), root_content_id: d.root }).collect()
    }
}
