//! Crash point injection for testing durability
//!
//! Crash points are enabled through the `FILESTORE_CRASH_POINT`
//! environment variable. When the named point is reached the process
//! terminates via `std::process::abort()`: no cleanup, no unwinding.
//!
//! # Usage
//!
//! ```ignore
//! use filestore::crash_point::{maybe_crash, points};
//!
//! maybe_crash(points::OVERWRITE_BEFORE_RENAME);
//! ```
//!
//! # Testing
//!
//! ```bash
//! FILESTORE_CRASH_POINT=overwrite_before_rename cargo test --test crash_durability
//! ```

use std::sync::OnceLock;

/// Environment variable naming the active crash point
pub const CRASH_POINT_ENV: &str = "FILESTORE_CRASH_POINT";

/// Cache the crash point name to avoid repeated env var lookups
static CRASH_POINT: OnceLock<Option<String>> = OnceLock::new();

#[inline]
fn get_crash_point() -> Option<&'static str> {
    CRASH_POINT
        .get_or_init(|| std::env::var(CRASH_POINT_ENV).ok())
        .as_deref()
}

/// Returns true if `FILESTORE_CRASH_POINT` equals the given name.
#[inline]
pub fn crash_point_enabled(name: &str) -> bool {
    get_crash_point().map(|p| p == name).unwrap_or(false)
}

/// Abort the process if the named crash point is enabled.
///
/// No-op when `FILESTORE_CRASH_POINT` is unset or names another point.
#[inline]
pub fn maybe_crash(name: &str) {
    if crash_point_enabled(name) {
        eprintln!("[CRASH] Triggering crash at point: {}", name);
        std::process::abort();
    }
}

/// All defined crash point names
pub mod points {
    // Atomic whole-file overwrite
    pub const OVERWRITE_BEFORE_RENAME: &str = "overwrite_before_rename";
    pub const OVERWRITE_AFTER_RENAME: &str = "overwrite_after_rename";

    // Directory store batches
    pub const DIR_BATCH_AFTER_FIRST_WRITE: &str = "dir_batch_after_first_write";

    /// Get all crash point names
    pub fn all() -> &'static [&'static str] {
        &[
            OVERWRITE_BEFORE_RENAME,
            OVERWRITE_AFTER_RENAME,
            DIR_BATCH_AFTER_FIRST_WRITE,
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
        assert_eq!(all.len(), 3);
        assert!(all.contains(&"overwrite_before_rename"));
        assert!(all.contains(&"dir_batch_after_first_write"));
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
