//! Content lifecycle notifications and the listener that applies them.

use anyhow::Result;
use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::debug;

use crate::cache::RouteCache;
use crate::provider::ContentId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "ids", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Published(Vec<ContentId>),
    Moved(Vec<ContentId>),
    Trashed(Vec<ContentId>),
    /// The surrounding content cache was rebuilt; every id may have changed.
    FullRefresh,
}

impl LifecycleEvent {
    pub fn content_ids(&self) -> &[ContentId] {
        match self {
            Self::Published(ids) | Self::Moved(ids) | Self::Trashed(ids) => ids,
            Self::FullRefresh => &[],
        }
    }
}

impl RouteCache {
    pub fn apply(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::FullRefresh => self.full_refresh(),
            other => self.remove(other.content_ids().iter().copied()),
        }
    }
}

/// Collapse a burst of events: removals queued before a full refresh are moot,
/// the ones after it still apply.
fn coalesce(events: Vec<LifecycleEvent>) -> (bool, Vec<ContentId>) {
    let mut refresh = false;
    let mut ids = Vec::new();
    for event in events {
        match event {
            LifecycleEvent::FullRefresh => {
                refresh = true;
                ids.clear();
            }
            other => ids.extend_from_slice(other.content_ids()),
        }
    }
    (refresh, ids)
}

/// Apply events from `events` on a dedicated thread until every sender is dropped.
pub fn spawn_listener(cache: Arc<RouteCache>, events: Receiver<LifecycleEvent>) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new().name("routecache-events".into()).spawn(move || {
        while let Ok(first) = events.recv() {
            let mut burst = vec![first];
            burst.extend(events.try_iter());
            debug!(events = burst.len(), "applying lifecycle events");
            let (refresh, ids) = coalesce(burst);
            if refresh {
                cache.full_refresh();
            }
            cache.remove(ids);
        }
        debug!("lifecycle event channel closed");
    })?;
    Ok(handle)
}
