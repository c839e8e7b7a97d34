//! Utility functions shared across the crate.

use std::path::{Component, Path, PathBuf};

/// Get the user's config directory following XDG conventions.
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise `$HOME/.config`.
pub fn config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
}

/// True if `path` is relative and never climbs above its starting point.
pub fn is_contained_relative_path(path: &Path) -> bool {
    let mut depth: usize = 0;
    for component in path.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    depth > 0
}

/// Compare a PDF header version such as `"1.3"` against `major.minor`.
///
/// Unparseable versions count as older.
pub fn version_at_least(version: &str, major: u32, minor: u32) -> bool {
    let mut parts = version.trim().splitn(2, '.');
    let parsed_major = parts.next().and_then(|p| p.parse::<u32>().ok());
    let parsed_minor = parts.next().and_then(|p| p.parse::<u32>().ok()).unwrap_or(0);
    parsed_major.is_some_and(|m| (m, parsed_minor) >= (major, minor))
}
