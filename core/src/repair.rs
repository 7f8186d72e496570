//! On-demand repair: walk the live content tree below the nearest indexed ancestor
//! until some content owns the requested key.

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::cache::RouteCache;
use crate::key::{route_key, KeyOptions};
use crate::provider::{Collaborators, ContentId};

/// Canonical key first, then every distinct alternate. Empty when the canonical
/// path is not resolvable.
pub(crate) fn content_keys(sources: &Collaborators, opts: &KeyOptions, root: ContentId, id: ContentId) -> Vec<String> {
    let Some(canonical) = route_key(root, &sources.paths.canonical_path(id), opts) else {
        return Vec::new();
    };
    let mut keys = vec![canonical];
    for path in sources.paths.alternate_paths(id) {
        if let Some(key) = route_key(root, &path, opts) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    keys
}

pub(crate) fn search(cache: &RouteCache, key: &str) -> Option<ContentId> {
    let segments: Vec<&str> = key.split('/').collect();
    let Ok(root) = segments[0].parse::<ContentId>() else {
        warn!(key, "route key does not start with a root content id");
        return None;
    };
    let Some(start) = nearest_ancestor(cache, &segments) else {
        warn!(key, "no starting point found for route key; the route cache is missing its root entry");
        return None;
    };
    debug!(key, start, "searching content tree for route");

    let sources = cache.sources();
    let opts = cache.config().key_options();
    let mut visited = HashSet::from([start]);
    let mut level = sources.tree.children(start);
    let mut depth = 1;

    while !level.is_empty() {
        let mut batch = Vec::new();
        let mut matched = None;
        for child in &level {
            if cache.is_indexed(child.id) {
                // Another repair may have indexed the target while this one was walking.
                if cache.lookup_exact(key) == Some(child.id) {
                    matched = Some(child.id);
                    break;
                }
                continue;
            }
            let keys = content_keys(sources, &opts, root, child.id);
            if keys.is_empty() {
                debug!(content_id = child.id, "content has no resolvable path");
                continue;
            }
            let hit = keys.iter().any(|k| k == key);
            batch.push((child.id, keys));
            if hit {
                matched = Some(child.id);
                break;
            }
        }
        cache.insert_routes(&batch);

        if let Some(id) = matched {
            debug!(key, content_id = id, depth, "route repaired");
            return Some(id);
        }

        let mut next = Vec::new();
        for child in level {
            if visited.insert(child.id) {
                next.extend(sources.tree.children(child.id));
            }
        }
        level = next;
        depth += 1;
    }

    debug!(key, start, "content tree exhausted without a match");
    None
}

/// Deepest live entry among the proper prefixes of the key.
fn nearest_ancestor(cache: &RouteCache, segments: &[&str]) -> Option<ContentId> {
    for len in (1..segments.len()).rev() {
        let prefix = segments[..len].join("/");
        if let Some(id) = cache.lookup_exact(&prefix) {
            if cache.sources().tree.get_by_id(id).is_some() {
                return Some(id);
            }
            debug!(key = %prefix, content_id = id, "skipping stale ancestor route");
        }
    }
    None
}
