//! End-to-end mirroring over real directories and a real TCP channel

use std::collections::BTreeMap;
use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tether::channel::{serve_connection, LoopbackChannel, TcpChannel};
use tether::fs::{FileSystem, LocalFs};
use tether::source::Reconciler;
use tether::target::CommandInterpreter;
use walkdir::WalkDir;

/// Collect a tree as relative-path -> content (None for directories),
/// independently of the FileSystem trait under test.
fn tree_entries(root: &Path) -> BTreeMap<String, Option<String>> {
    let mut entries = BTreeMap::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.unwrap();
        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap()
            .to_string_lossy()
            .replace('\\', "/");
        let content = if entry.file_type().is_dir() {
            None
        } else {
            Some(std::fs::read_to_string(entry.path()).unwrap())
        };
        entries.insert(rel, content);
    }
    entries
}

fn seed_source(root: &Path) {
    std::fs::create_dir_all(root.join("sub/deep")).unwrap();
    std::fs::write(root.join("f1.txt"), "hello").unwrap();
    std::fs::write(root.join("sub/f2.txt"), "world").unwrap();
    std::fs::write(root.join("sub/deep/f3.txt"), "abyss").unwrap();
}

#[test]
fn test_local_directories_reconcile_over_loopback() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    seed_source(source.path());
    std::fs::write(target.path().join("f1.txt"), "old").unwrap();
    std::fs::write(target.path().join("extra.txt"), "gone").unwrap();

    let fs = Arc::new(LocalFs::new());
    let channel = LoopbackChannel::new(CommandInterpreter::new(
        Arc::clone(&fs) as Arc<dyn FileSystem>,
        target.path(),
    ));
    let reconciler = Reconciler::new(fs.as_ref(), source.path(), &channel);

    let stats = reconciler.run().unwrap();
    assert_eq!(tree_entries(source.path()), tree_entries(target.path()));
    assert_eq!(stats.removed, 1);

    // Converged: a second run issues nothing.
    let stats = reconciler.run().unwrap();
    assert_eq!(stats.commands_issued, 0);
}

#[test]
fn test_local_directories_reconcile_over_tcp() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    seed_source(source.path());

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let target_root = target.path().to_path_buf();
    let server = std::thread::spawn(move || {
        let interpreter =
            CommandInterpreter::new(Arc::new(LocalFs::new()) as Arc<dyn FileSystem>, target_root);
        let (stream, _) = listener.accept().unwrap();
        serve_connection(stream, &interpreter).unwrap();
    });

    let fs = LocalFs::new();
    let channel = TcpChannel::connect(addr).unwrap();
    let stats = Reconciler::new(&fs, source.path(), &channel)
        .run()
        .unwrap();
    drop(channel);
    server.join().unwrap();

    assert_eq!(stats.files_written, 3);
    assert_eq!(stats.dirs_created, 2);
    assert_eq!(tree_entries(source.path()), tree_entries(target.path()));
}
