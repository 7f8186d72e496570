mod common;

use common::{config_in, open, small_site, MemorySite};
use routecache::{spawn_listener, LifecycleEvent};
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn removing_content_drops_every_alias() {
    let dir = tempdir().unwrap();
    let site = MemorySite::new();
    site.add(100, None, "/");
    site.add_with_alternates(42, Some(100), "/new-name/", &["/old-name/"]);
    let cache = open(&site, config_in(dir.path()));

    assert_eq!(cache.resolve_key("100/old-name"), Some(42));
    assert_eq!(cache.lookup_key("100/new-name"), Some(42));

    cache.apply(&LifecycleEvent::Published(vec![42]));
    assert_eq!(cache.lookup_key("100/old-name"), None);
    assert_eq!(cache.lookup_key("100/new-name"), None);
    assert!(cache.routes_for(42).is_empty());
}

#[test]
fn moved_content_takes_its_descendants_along() {
    let dir = tempdir().unwrap();
    let site = small_site();
    let cache = open(&site, config_in(dir.path()));
    assert_eq!(cache.resolve_key("100/a/b"), Some(2));

    site.set_path(1, "/z/");
    site.set_path(2, "/z/b/");
    cache.apply(&LifecycleEvent::Moved(vec![1]));

    assert_eq!(cache.lookup_key("100/a/b"), None);
    assert_eq!(cache.resolve_key("100/z/b"), Some(2));
    assert_eq!(cache.resolve_key("100/a/b"), None);
}

#[test]
fn removed_root_is_repopulated_on_next_access() {
    let dir = tempdir().unwrap();
    let site = small_site();
    let cache = open(&site, config_in(dir.path()));
    cache.resolve_key("100/a/b");

    cache.apply(&LifecycleEvent::Trashed(vec![100]));
    assert_eq!(cache.stats().entries, 0);

    assert_eq!(cache.resolve_key("100/a"), Some(1));
    assert_eq!(cache.snapshot().root_keys(), vec!["100"]);
}

#[test]
fn full_refresh_starts_over() {
    let dir = tempdir().unwrap();
    let site = small_site();
    let cache = open(&site, config_in(dir.path()));
    cache.resolve_key("100/a/b");
    assert_eq!(cache.stats().entries, 3);

    cache.apply(&LifecycleEvent::FullRefresh);
    assert_eq!(cache.stats().entries, 1);
    assert_eq!(cache.lookup_key("100/a"), None);
}

#[test]
fn listener_thread_applies_queued_events() {
    let dir = tempdir().unwrap();
    let site = small_site();
    let cache = Arc::new(open(&site, config_in(dir.path())));
    cache.resolve_key("100/a/b");

    let (tx, rx) = crossbeam_channel::unbounded();
    let handle = spawn_listener(cache.clone(), rx).unwrap();
    tx.send(LifecycleEvent::Trashed(vec![2])).unwrap();
    drop(tx);
    handle.join().unwrap();

    assert_eq!(cache.lookup_key("100/a/b"), None);
    assert_eq!(cache.lookup_key("100/a"), Some(1));
}
