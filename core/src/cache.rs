use parking_lot::{RwLock, RwLockWriteGuard};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

use crate::bootstrap::root_entries;
use crate::config::RouteCacheConfig;
use crate::index::RouteIndex;
use crate::key::route_key;
use crate::persist::CacheStore;
use crate::provider::{Collaborators, ContentId};
use crate::repair;

#[derive(Default)]
struct CacheState {
    index: RouteIndex,
    /// Mutated since the last successful flush.
    dirty: bool,
    /// A root entry was removed; re-run the bootstrapper before serving.
    roots_missing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub roots: usize,
    pub dirty: bool,
}

/// Process-wide route cache shared by every request handler.
///
/// Reads take the shared side of the lock. Every mutation waits at most
/// `lock_timeout` for the exclusive side and is dropped (with a warning) when it
/// cannot get it; dropped inserts are re-derived by the next miss. Flushes happen
/// under the guard of the mutation they persist.
pub struct RouteCache {
    config: RouteCacheConfig,
    store: CacheStore,
    sources: Collaborators,
    state: RwLock<CacheState>,
    refresh_pending: AtomicBool,
}

impl RouteCache {
    /// Load the cache file, or bootstrap a fresh tree when it is missing or unreadable.
    pub fn open(config: RouteCacheConfig, sources: Collaborators) -> Self {
        let store = CacheStore::from_config(&config);
        let loaded = match store.load() {
            Ok(Some(index)) if !index.is_empty() => {
                info!(path = %store.path().display(), entries = index.len(), "loaded route cache");
                Some(index)
            }
            Ok(_) => None,
            Err(e) => {
                error!(path = %store.path().display(), error = %format!("{e:#}"), "route cache file is corrupt; rebuilding");
                None
            }
        };

        let fresh = loaded.is_none();
        let cache = Self {
            config,
            store,
            sources,
            state: RwLock::new(CacheState { index: loaded.unwrap_or_default(), ..Default::default() }),
            refresh_pending: AtomicBool::new(false),
        };
        if fresh {
            cache.full_refresh();
        }
        cache
    }

    pub fn config(&self) -> &RouteCacheConfig { &self.config }
    pub fn store(&self) -> &CacheStore { &self.store }
    pub(crate) fn sources(&self) -> &Collaborators { &self.sources }

    /// Resolve a request URL (absolute or path-only) served under `root`.
    pub fn resolve(&self, url: &str, root: ContentId) -> Option<ContentId> {
        let key = route_key(root, url, &self.config.key_options())?;
        self.resolve_key(&key)
    }

    /// Direct hit if indexed and the content still exists, otherwise repair.
    pub fn resolve_key(&self, key: &str) -> Option<ContentId> {
        self.ensure_ready();
        let hit = self
            .state
            .read()
            .index
            .find(key, self.config.compatibility_match)
            .map(|e| (e.key.clone(), e.content_id));
        if let Some((stored, id)) = hit {
            if self.sources.tree.get_by_id(id).is_some() {
                return Some(id);
            }
            debug!(key, content_id = id, "route points at missing content");
            self.drop_stale(&stored, id);
        }
        repair::search(self, key)
    }

    /// Index lookup only; never touches the content tree.
    pub fn lookup_key(&self, key: &str) -> Option<ContentId> {
        self.state.read().index.lookup(key, self.config.compatibility_match)
    }

    /// Exact-key lookup regardless of the matching mode; repair walks by structure.
    pub(crate) fn lookup_exact(&self, key: &str) -> Option<ContentId> { self.state.read().index.lookup(key, false) }

    /// Every key currently indexed for `id`.
    pub fn routes_for(&self, id: ContentId) -> Vec<String> {
        self.ensure_ready();
        self.state.read().index.keys_for(id)
    }

    pub(crate) fn is_indexed(&self, id: ContentId) -> bool { self.state.read().index.contains_content(id) }

    /// Insert each content's keys, in order, under one exclusive lock and flush.
    pub(crate) fn insert_routes(&self, batch: &[(ContentId, Vec<String>)]) {
        if batch.is_empty() {
            return;
        }
        let Some(mut state) = self.write_state("insert routes") else {
            return;
        };
        let compat = self.config.compatibility_match;
        let mut inserted = 0;
        for (id, keys) in batch {
            for key in keys {
                if state.index.insert(key, *id, compat) {
                    inserted += 1;
                }
            }
        }
        if inserted > 0 {
            debug!(inserted, "indexed routes");
            state.dirty = true;
        }
        self.flush_locked(&mut state);
    }

    fn drop_stale(&self, stored: &str, id: ContentId) {
        let Some(mut state) = self.write_state("drop stale route") else {
            return;
        };
        if !state.index.holds(stored, id) {
            return;
        }
        let removal = state.index.remove_key(stored);
        state.roots_missing |= removal.root_level;
        state.dirty = true;
        self.flush_locked(&mut state);
    }

    /// Remove every entry owned by `ids` (and the routes nested below them).
    pub fn remove<I: IntoIterator<Item = ContentId>>(&self, ids: I) {
        let ids: HashSet<ContentId> = ids.into_iter().collect();
        if ids.is_empty() {
            return;
        }
        let Some(mut state) = self.write_state("remove routes") else {
            return;
        };
        let removal = state.index.remove_content(&ids);
        if removal.removed > 0 {
            info!(contents = ids.len(), removed = removal.removed, root_level = removal.root_level, "invalidated routes");
            state.dirty = true;
        }
        state.roots_missing |= removal.root_level;
        self.flush_locked(&mut state);
    }

    /// Discard the whole tree and bootstrap the roots again.
    pub fn full_refresh(&self) {
        let entries = root_entries(&self.sources, &self.config.key_options());
        let Some(mut state) = self.write_state("full refresh") else {
            self.refresh_pending.store(true, Ordering::Release);
            return;
        };
        let compat = self.config.compatibility_match;
        let mut index = RouteIndex::new();
        for (key, id) in &entries {
            index.insert(key, *id, compat);
        }
        info!(roots = index.routes.len(), entries = index.len(), "route cache rebuilt");
        state.index = index;
        state.roots_missing = false;
        state.dirty = true;
        self.refresh_pending.store(false, Ordering::Release);
        self.flush_locked(&mut state);
    }

    /// Group entries by key and drop all but the first of each duplicate. Findings
    /// are reported even when the cleanup itself has to be skipped.
    pub fn validate_and_clean(&self) -> Vec<String> {
        let duplicates = self.state.read().index.duplicates();
        if duplicates.is_empty() {
            return Vec::new();
        }
        let findings: Vec<String> = duplicates
            .iter()
            .map(|(key, count)| format!("{count} entries were found in the route cache for '{key}'"))
            .collect();
        for msg in &findings {
            warn!("{msg}");
        }
        if let Some(mut state) = self.write_state("remove duplicate routes") {
            if !state.index.dedup().is_empty() {
                state.dirty = true;
            }
            self.flush_locked(&mut state);
        }
        findings
    }

    pub fn flush(&self) {
        if let Some(mut state) = self.write_state("flush") {
            self.flush_locked(&mut state);
        }
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.read();
        CacheStats { entries: state.index.len(), roots: state.index.routes.len(), dirty: state.dirty }
    }

    /// Copy of the current tree.
    pub fn snapshot(&self) -> RouteIndex { self.state.read().index.clone() }

    fn ensure_ready(&self) {
        if self.refresh_pending.load(Ordering::Acquire) {
            self.full_refresh();
        } else if self.state.read().roots_missing {
            self.repopulate_roots();
        }
    }

    fn repopulate_roots(&self) {
        let entries = root_entries(&self.sources, &self.config.key_options());
        let Some(mut state) = self.write_state("repopulate roots") else {
            return;
        };
        if !state.roots_missing {
            return;
        }
        let compat = self.config.compatibility_match;
        for (key, id) in &entries {
            if state.index.insert(key, *id, compat) {
                state.dirty = true;
            }
        }
        state.roots_missing = false;
        debug!(roots = state.index.routes.len(), "root routes repopulated");
        self.flush_locked(&mut state);
    }

    fn write_state(&self, op: &'static str) -> Option<RwLockWriteGuard<'_, CacheState>> {
        let guard = self.state.try_write_for(self.config.lock_timeout());
        if guard.is_none() {
            warn!(op, timeout_ms = self.config.lock_timeout_ms, "route cache lock not acquired; skipping");
        }
        guard
    }

    fn flush_locked(&self, state: &mut CacheState) {
        if !state.dirty {
            return;
        }
        match self.store.save(&state.index) {
            Ok(()) => {
                state.dirty = false;
                debug!(path = %self.store.path().display(), entries = state.index.len(), "route cache flushed");
            }
            Err(e) => error!(path = %self.store.path().display(), error = %format!("{e:#}"), "failed to write route cache"),
        }
    }
}
