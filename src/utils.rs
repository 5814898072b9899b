//! Filesystem and formatting helpers
//!
//! # Example
//!
//! ```
//! use pfw::utils::{ensure_parent_dir, truncate_string};
//!
//! let dir = tempfile::tempdir().unwrap();
//! ensure_parent_dir(&dir.path().join("state/rules.txt")).unwrap();
//! assert!(dir.path().join("state").is_dir());
//!
//! assert_eq!(truncate_string("allow ssh from office", 10), "allow s...");
//! ```

use std::path::Path;

/// Creates `dir` (and its parents) with owner-only permissions.
///
/// Existing directories are left as they are.
pub fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::fs::DirBuilder;
        use std::os::unix::fs::DirBuilderExt;

        DirBuilder::new()
            .mode(0o700) // User read/write/execute only
            .recursive(true)
            .create(dir)
    }

    #[cfg(not(unix))]
    {
        std::fs::create_dir_all(dir)
    }
}

/// Creates the directory that will hold `file`, if it has one.
pub fn ensure_parent_dir(file: &Path) -> std::io::Result<()> {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

/// Truncates a string to a maximum length and adds an ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        // Nearest character boundary so multi-byte characters are not split
        let end = s
            .char_indices()
            .map(|(idx, _)| idx)
            .take_while(|&idx| idx <= max_len.saturating_sub(3))
            .last()
            .unwrap_or(0);
        format!("{}...", &s[..end])
    }
}
