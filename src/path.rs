//! Wire path utilities
//!
//! Paths crossing the command channel are always slash-separated and relative
//! to the replication root of each side; the empty string names the root
//! itself. Absolute paths never cross the channel.

use crate::error::ProtocolError;
use std::path::{Component, Path, PathBuf};

/// Convert an absolute source-side path into its wire-relative form.
///
/// Returns `None` when `abs` does not live under `root`. The root itself maps
/// to the empty string.
pub fn to_wire(root: &Path, abs: &Path) -> Option<String> {
    let rel = abs.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(name) => parts.push(name.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

/// Resolve a wire-relative path against a target-side root.
///
/// The empty string resolves to the root. Every other path must consist of
/// plain name segments: absolute paths, `.`/`..` segments, and empty segments
/// are rejected so a peer can never address anything outside the root.
pub fn resolve_under(root: &Path, rel: &str) -> Result<PathBuf, ProtocolError> {
    if rel.is_empty() {
        return Ok(root.to_path_buf());
    }

    let mut resolved = root.to_path_buf();
    for segment in rel.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(ProtocolError::InvalidPath(rel.to_string()));
        }
        resolved.push(segment);
    }
    Ok(resolved)
}
