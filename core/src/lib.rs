//! Persistent, lazily repaired index from request paths to content ids.

pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod events;
pub mod index;
pub mod key;
pub mod persist;
pub mod provider;
mod repair;

pub use cache::{CacheStats, RouteCache};
pub use config::RouteCacheConfig;
pub use events::{spawn_listener, LifecycleEvent};
pub use index::{Removal, RouteEntry, RouteIndex};
pub use persist::{CacheFormat, CacheStore};
pub use provider::*;
