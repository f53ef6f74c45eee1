//! Directory snapshots
//!
//! A [`Snapshot`] is the nested name-to-node mapping a target reports for
//! its replica root: files carry their full content, directories nest
//! another mapping. `BTreeMap` keeps every level sorted so snapshots of
//! identical trees serialize identically.

use crate::error::FsError;
use crate::fs::FileSystem;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One level of a snapshot, keyed by entry name.
pub type Snapshot = BTreeMap<String, SnapshotNode>;

/// A single entry in a snapshot level.
///
/// Serialized untagged: a file is its content string, a directory is a
/// nested JSON object, so the wire form mirrors the tree shape directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnapshotNode {
    File(String),
    Directory(Snapshot),
}

impl SnapshotNode {
    pub fn is_dir(&self) -> bool {
        matches!(self, SnapshotNode::Directory(_))
    }

    pub fn as_dir(&self) -> Option<&Snapshot> {
        match self {
            SnapshotNode::Directory(children) => Some(children),
            SnapshotNode::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&str> {
        match self {
            SnapshotNode::File(content) => Some(content),
            SnapshotNode::Directory(_) => None,
        }
    }
}

/// Capture the tree rooted at `path` as a snapshot.
///
/// Recurses depth-first; each level inherits the sorted order of
/// [`FileSystem::list_dir`].
pub fn capture(fs: &dyn FileSystem, path: &Path) -> Result<Snapshot, FsError> {
    let mut snapshot = Snapshot::new();
    for name in fs.list_dir(path)? {
        let child = path.join(&name);
        let node = if fs.is_dir(&child) {
            SnapshotNode::Directory(capture(fs, &child)?)
        } else {
            SnapshotNode::File(fs.read_file(&child)?)
        };
        snapshot.insert(name, node);
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;
    use serde_json::json;
    use std::path::Path;

    fn populated_fs() -> MemoryFs {
        let fs = MemoryFs::new();
        fs.make_dirs(Path::new("/src/sub")).unwrap();
        fs.write_file(Path::new("/src/a.txt"), "alpha").unwrap();
        fs.write_file(Path::new("/src/sub/b.txt"), "beta").unwrap();
        fs.make_dirs(Path::new("/src/empty")).unwrap();
        fs
    }

    #[test]
    fn test_capture_nested_tree() {
        let fs = populated_fs();
        let snapshot = capture(&fs, Path::new("/src")).unwrap();

        assert_eq!(
            snapshot.get("a.txt"),
            Some(&SnapshotNode::File("alpha".to_string()))
        );
        let sub = snapshot.get("sub").and_then(|n| n.as_dir()).unwrap();
        assert_eq!(
            sub.get("b.txt"),
            Some(&SnapshotNode::File("beta".to_string()))
        );
        assert_eq!(
            snapshot.get("empty"),
            Some(&SnapshotNode::Directory(Snapshot::new()))
        );
    }

    #[test]
    fn test_serializes_as_nested_mapping() {
        let fs = populated_fs();
        let snapshot = capture(&fs, Path::new("/src")).unwrap();
        let value = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(
            value,
            json!({
                "a.txt": "alpha",
                "empty": {},
                "sub": { "b.txt": "beta" },
            })
        );
    }

    #[test]
    fn test_deserializes_files_and_directories() {
        let value = json!({
            "readme.md": "docs",
            "nested": { "deep": { "leaf.txt": "x" } },
        });
        let snapshot: Snapshot = serde_json::from_value(value).unwrap();

        assert!(!snapshot.get("readme.md").unwrap().is_dir());
        let nested = snapshot.get("nested").and_then(|n| n.as_dir()).unwrap();
        assert!(nested.get("deep").unwrap().is_dir());
    }

    #[test]
    fn test_empty_object_is_directory() {
        let snapshot: Snapshot = serde_json::from_value(json!({ "d": {} })).unwrap();
        assert_eq!(snapshot.get("d"), Some(&SnapshotNode::Directory(Snapshot::new())));
    }

    #[test]
    fn test_capture_missing_root_fails() {
        let fs = MemoryFs::new();
        assert!(capture(&fs, Path::new("/absent")).is_err());
    }
}
