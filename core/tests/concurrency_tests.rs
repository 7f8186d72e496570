mod common;

use common::{config_in, open, MemorySite};
use routecache::{ContentTree, LifecycleEvent};
use std::thread;
use tempfile::tempdir;

fn wide_site() -> std::sync::Arc<MemorySite> {
    let site = MemorySite::new();
    site.add(100, None, "/");
    for section in 1..=5u32 {
        site.add(section, Some(100), &format!("/s{section}/"));
        for page in 0..10u32 {
            let id = section * 100 + page;
            site.add_with_alternates(id, Some(section), &format!("/s{section}/p{page}/"), &[format!("/alias/{id}/").as_str()]);
        }
    }
    site
}

#[test]
fn racing_repairs_leave_one_entry_per_key() {
    let dir = tempdir().unwrap();
    let site = wide_site();
    let cache = open(&site, config_in(dir.path()));

    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                assert_eq!(cache.resolve_key("100/s5/p9"), Some(509));
                assert_eq!(cache.resolve_key("100/alias/305"), Some(305));
            });
        }
    });

    assert!(cache.snapshot().duplicates().is_empty());
    assert!(cache.validate_and_clean().is_empty());
    assert_eq!(cache.lookup_key("100/s5/p9"), Some(509));
}

#[test]
fn removals_racing_with_repairs_keep_keys_unique() {
    let dir = tempdir().unwrap();
    let site = wide_site();
    let cache = open(&site, config_in(dir.path()));

    thread::scope(|s| {
        for worker in 0..4u32 {
            let cache = &cache;
            s.spawn(move || {
                for page in 0..10u32 {
                    let id = (worker % 5 + 1) * 100 + page;
                    cache.resolve_key(&format!("100/s{}/p{page}", worker % 5 + 1));
                    if page % 3 == 0 {
                        cache.apply(&LifecycleEvent::Published(vec![id]));
                    }
                }
            });
        }
    });

    let index = cache.snapshot();
    assert!(index.duplicates().is_empty());
    for entry in index.iter() {
        assert!(site.get_by_id(entry.content_id).is_some());
    }
}
