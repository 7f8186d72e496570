//! Route keys: root-prefixed, normalized request paths.

use lazy_static::lazy_static;
use percent_encoding::percent_decode_str;
use regex::Regex;
use url::Url;

use crate::provider::{ContentId, NOT_RESOLVABLE};

lazy_static! {
    static ref CULTURE_SEGMENT: Regex = Regex::new(r"^[a-z]{2}-[a-z]{2}$").expect("valid regex");
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyOptions {
    pub culture_in_path: bool,
}

/// Returns true for a lower-cased `xx-xx` culture segment such as `fr-fr`.
pub fn is_culture_segment(segment: &str) -> bool { CULTURE_SEGMENT.is_match(segment) }

/// Local path of a request URL or generated path: scheme, host, query and fragment removed.
pub fn local_path(url: &str) -> String {
    let url = url.trim();
    let path = match Url::parse(url) {
        Ok(parsed) if parsed.has_host() => parsed.path().to_string(),
        _ => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    percent_decode_str(&path).decode_utf8_lossy().into_owned()
}

/// Build the key for `url` under `root`. `None` means the path is not resolvable.
pub fn route_key(root: ContentId, url: &str, opts: &KeyOptions) -> Option<String> {
    if url.trim() == NOT_RESOLVABLE {
        return None;
    }
    let path = local_path(url).to_lowercase();
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if opts.culture_in_path && segments.first().is_some_and(|s| is_culture_segment(s)) {
        segments.remove(0);
    }
    let mut key = root.to_string();
    for segment in segments {
        key.push('/');
        key.push_str(segment);
    }
    Some(key)
}

/// Root-id prefix of a key (`"100"` for `"100/a/b"`).
pub fn root_prefix(key: &str) -> &str { key.split('/').next().unwrap_or(key) }

/// Key of the structural parent, `None` for a root key.
pub fn parent_key(key: &str) -> Option<&str> { key.rsplit_once('/').map(|(parent, _)| parent) }

/// True when `key` lies strictly below `prefix` in the path hierarchy.
pub fn is_below(prefix: &str, key: &str) -> bool {
    key.len() > prefix.len() && key.starts_with(prefix) && key.as_bytes()[prefix.len()] == b'/'
}

/// Compare a stored key against a requested one. In compatibility mode the stored
/// key only has to start with the requested root prefix and contain the rest of
/// the requested key; every exact match is also a compatibility match.
pub fn key_matches(stored: &str, requested: &str, compat: bool) -> bool {
    if !compat {
        return stored == requested;
    }
    let (root, segment) = match requested.find('/') {
        Some(pos) => requested.split_at(pos),
        None => (requested, ""),
    };
    stored.starts_with(root) && stored.contains(segment)
}
