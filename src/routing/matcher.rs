//! Mount path matching.
//!
//! # Responsibilities
//! - Normalize mount paths at registration time
//! - Match a pathname prefix (case-insensitive)
//! - Reject false-positive prefixes at a segment boundary
//!
//! # Design Decisions
//! - The root mount `/` matches with an empty prefix, so it sees every path
//! - Boundary characters are `/` and `.`; `/adm` never matches `/administration`
//! - No regex, matching is a single prefix comparison

/// A normalized mount path and its match rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountMatcher {
    /// Normalized mount path, `/` for root.
    path: String,
    /// Lowercased prefix compared against pathnames; empty for root.
    folded: String,
}

impl MountMatcher {
    /// Create a matcher from a raw mount path.
    pub fn new(mount: &str) -> Self {
        let path = normalize(mount);
        let folded = if path == "/" {
            String::new()
        } else {
            path.to_lowercase()
        };
        Self { path, folded }
    }

    /// The root matcher.
    pub fn root() -> Self {
        Self::new("/")
    }

    /// Normalized mount path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether this is the root mount.
    pub fn is_root(&self) -> bool {
        self.folded.is_empty()
    }

    /// Bytes of pathname consumed by a successful match.
    pub fn prefix_len(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.path.len()
        }
    }

    /// Returns true if `pathname` is at or below this mount point.
    pub fn matches(&self, pathname: &str) -> bool {
        let len = self.prefix_len();
        let Some(head) = pathname.get(..len) else {
            return false;
        };
        if head.to_lowercase() != self.folded {
            return false;
        }
        matches!(pathname[len..].chars().next(), None | Some('/') | Some('.'))
    }
}

/// Strip every trailing slash; an empty result becomes `/`.
pub fn normalize(mount: &str) -> String {
    let trimmed = mount.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Compose a child's absolute mount path from its parent's.
pub fn join(parent: &str, child: &str) -> String {
    match (parent, child) {
        ("/", child) => child.to_string(),
        (parent, "/") => parent.to_string(),
        (parent, child) => format!("{parent}{child}"),
    }
}
