//! Seeding the route tree with one entry per content root.

use crate::key::KeyOptions;
use crate::provider::{Collaborators, ContentId};
use crate::repair::content_keys;

/// Root ids declared by the domain registry, de-duplicated in registry order.
pub fn domain_roots(sources: &Collaborators) -> Vec<ContentId> {
    let mut roots = Vec::new();
    for domain in sources.domains.all_domains() {
        if !roots.contains(&domain.root_content_id) {
            roots.push(domain.root_content_id);
        }
    }
    roots
}

/// Entries (key, content id) to insert into an empty or root-less index, roots first.
///
/// Each domain root gets its bare id as key. Without domains the first top-level node
/// is the implicit root. Top-level nodes that no domain points at are indexed under
/// the first root id so their subtrees stay reachable.
pub fn root_entries(sources: &Collaborators, opts: &KeyOptions) -> Vec<(String, ContentId)> {
    let top = sources.tree.root_nodes();
    let Some(first) = top.first() else {
        return Vec::new();
    };
    let mut roots = domain_roots(sources);
    if roots.is_empty() {
        roots.push(first.id);
    }

    let mut entries = Vec::new();
    for &root in &roots {
        entries.push((root.to_string(), root));
        entries.extend(content_keys(sources, opts, root, root).into_iter().map(|k| (k, root)));
    }

    let fallback = roots[0];
    for node in top.iter().filter(|c| !roots.contains(&c.id)) {
        entries.extend(content_keys(sources, opts, fallback, node.id).into_iter().map(|k| (k, node.id)));
    }
    entries
}
