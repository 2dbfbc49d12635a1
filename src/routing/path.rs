//! Effective-url rewriting for nested mount points.
//!
//! # Responsibilities
//! - Detect the `scheme://host` prefix of absolute-form targets
//! - Extract the pathname (query and fragment ignored)
//! - Trim a matched mount prefix and undo that trim later
//!
//! # Design Decisions
//! - Operates on plain strings: the url a handler sees is exactly what it was given
//! - `descend` and `ascend` are inverses for every url `descend` produced,
//!   which is what lets each frame restore its parent's view on re-entry
//! - The trimmed text is taken from the url itself, not from the mount path,
//!   so a case-insensitive match restores the caller's original casing

/// Record of one trim, kept by the frame that performed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trim {
    /// Text removed from the front of the pathname.
    pub prefix: String,
    /// Whether a leading `/` was synthesized after trimming.
    pub slash_added: bool,
}

/// `scheme://host` prefix of an absolute-form target, if any.
///
/// The authority ends at the first `/`, `?` or `#`. Origin-form targets
/// (leading `/`) and targets with a `?` before the `://` marker have none.
pub fn proto_host(url: &str) -> Option<&str> {
    if url.is_empty() || url.starts_with('/') {
        return None;
    }
    let fqdn = url.find("://")?;
    if url[..fqdn].contains('?') {
        return None;
    }
    let authority_start = fqdn + 3;
    match url[authority_start..].find(['/', '?', '#']) {
        Some(offset) => Some(&url[..authority_start + offset]),
        None => Some(url),
    }
}

/// Pathname of a target: proto/host, query and fragment removed.
/// An empty pathname reads as `/`.
pub fn pathname(url: &str) -> &str {
    let rest = match proto_host(url) {
        Some(ph) => &url[ph.len()..],
        None => url,
    };
    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    let path = &rest[..end];
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

/// Remove `prefix_len` bytes of pathname from `url`.
///
/// Returns the rewritten url and the trim needed to undo it. A root mount
/// (empty prefix) leaves the url untouched and returns no trim.
pub fn descend(url: &str, prefix_len: usize, proto_host: Option<&str>) -> (String, Option<Trim>) {
    if prefix_len == 0 {
        return (url.to_string(), None);
    }
    let ph = proto_host.unwrap_or("");
    let rest = url.strip_prefix(ph).unwrap_or(url);
    let Some(prefix) = rest.get(..prefix_len) else {
        return (url.to_string(), None);
    };

    let mut rewritten = String::with_capacity(url.len());
    rewritten.push_str(ph);
    rewritten.push_str(&rest[prefix_len..]);

    let mut slash_added = false;
    if proto_host.is_none() && !rewritten.starts_with('/') {
        rewritten.insert(0, '/');
        slash_added = true;
    }

    let trim = Trim {
        prefix: prefix.to_string(),
        slash_added,
    };
    (rewritten, Some(trim))
}

/// Undo a `descend`, restoring the prefix in front of whatever path the
/// downstream handlers left behind.
pub fn ascend(url: &str, trim: &Trim, proto_host: Option<&str>) -> String {
    let mut current = url;
    if trim.slash_added {
        current = current.strip_prefix('/').unwrap_or(current);
    }
    let ph = proto_host.unwrap_or("");
    let rest = current.strip_prefix(ph).unwrap_or(current);

    let mut restored = String::with_capacity(ph.len() + trim.prefix.len() + rest.len());
    restored.push_str(ph);
    restored.push_str(&trim.prefix);
    restored.push_str(rest);
    restored
}
