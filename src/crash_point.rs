//! Crash point injection for durability testing
//!
//! Setting the `REVTREE_CRASH_POINT` environment variable to one of the names
//! in [`points`] makes the process terminate via `std::process::abort()` the
//! moment execution reaches that point: no cleanup, no unwinding.
//!
//! # Usage
//!
//! ```ignore
//! use revtree::crash_point::{maybe_crash, points};
//!
//! maybe_crash(points::COMMIT_BEFORE_ROOT_SWAP);
//! ```
//!
//! ```bash
//! REVTREE_CRASH_POINT=commit_before_root_swap revtree create-resource ...
//! ```

use std::sync::OnceLock;

/// Environment variable naming the active crash point
pub const CRASH_POINT_ENV: &str = "REVTREE_CRASH_POINT";

static CRASH_POINT: OnceLock<Option<String>> = OnceLock::new();

#[inline]
fn get_crash_point() -> Option<&'static str> {
    CRASH_POINT
        .get_or_init(|| std::env::var(CRASH_POINT_ENV).ok())
        .as_deref()
}

/// Returns true if `REVTREE_CRASH_POINT` equals `name`.
#[inline]
pub fn crash_point_enabled(name: &str) -> bool {
    get_crash_point().map(|p| p == name).unwrap_or(false)
}

/// Aborts the process if the named crash point is enabled.
#[inline]
pub fn maybe_crash(name: &str) {
    if crash_point_enabled(name) {
        eprintln!("[CRASH] Triggering crash at point: {}", name);
        std::process::abort();
    }
}

/// All defined crash point names
pub mod points {
    // Commit path
    pub const COMMIT_AFTER_FLUSH: &str = "commit_after_flush";
    pub const COMMIT_BEFORE_ROOT_SWAP: &str = "commit_before_root_swap";
    pub const COMMIT_AFTER_ROOT_SWAP: &str = "commit_after_root_swap";

    // Root pointer file
    pub const POINTER_BEFORE_RENAME: &str = "pointer_before_rename";
    pub const POINTER_AFTER_RENAME: &str = "pointer_after_rename";

    // Resource bootstrap
    pub const BOOTSTRAP_BEFORE_COMMIT: &str = "bootstrap_before_commit";

    pub fn all() -> &'static [&'static str] {
        &[
            COMMIT_AFTER_FLUSH,
            COMMIT_BEFORE_ROOT_SWAP,
            COMMIT_AFTER_ROOT_SWAP,
            POINTER_BEFORE_RENAME,
            POINTER_AFTER_RENAME,
            BOOTSTRAP_BEFORE_COMMIT,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crash_point_disabled_by_default() {
        assert!(!crash_point_enabled("test_point"));
    }

    #[test]
    fn test_all_crash_points_defined() {
        let all = points::all();
        assert_eq!(all.len(), 6);
        assert!(all.contains(&"commit_before_root_swap"));
        assert!(all.contains(&"pointer_before_rename"));
    }

    #[test]
    fn test_crash_point_names_are_lowercase_with_underscores() {
        for point in points::all() {
            assert!(
                point.chars().all(|c| c.is_lowercase() || c == '_'),
                "Crash point '{}' should be lowercase with underscores",
                point
            );
        }
    }
}
