//! Live change propagation through the bounded event queue

use crate::integration::test_utils::{assert_mirrored, mirror_pair, RecordingChannel};
use std::path::Path;
use std::sync::Arc;
use tether::channel::CommandChannel;
use tether::command::Command;
use tether::config::ReplicationConfig;
use tether::fs::{FileSystem, MemoryFs};
use tether::source::SourceReplicator;

fn started_replicator(fs: &Arc<MemoryFs>, channel: &Arc<RecordingChannel>) -> SourceReplicator {
    let replicator = SourceReplicator::new(
        Arc::clone(fs) as Arc<dyn FileSystem>,
        "/src",
        Arc::clone(channel) as Arc<dyn CommandChannel>,
        &ReplicationConfig::default(),
    );
    replicator.start().unwrap();
    channel.take_mutations();
    replicator
}

#[test]
fn test_live_mutations_keep_target_mirrored() {
    let (fs, channel) = mirror_pair();
    fs.make_dirs(Path::new("/src/docs")).unwrap();
    fs.write_file(Path::new("/src/docs/a.txt"), "a").unwrap();
    let replicator = started_replicator(&fs, &channel);

    fs.write_file(Path::new("/src/docs/a.txt"), "rewritten")
        .unwrap();
    fs.write_file(Path::new("/src/top.txt"), "new").unwrap();
    fs.make_dirs(Path::new("/src/born")).unwrap();
    replicator.drain_pending().unwrap();
    fs.write_file(Path::new("/src/born/child.txt"), "deep")
        .unwrap();
    fs.remove_file(Path::new("/src/docs/a.txt")).unwrap();
    replicator.drain_pending().unwrap();

    assert_mirrored(&fs);
    assert_eq!(
        fs.read_file(Path::new("/dst/born/child.txt")).unwrap(),
        "deep"
    );
    assert!(!fs.exists(Path::new("/dst/docs/a.txt")));
}

#[test]
fn test_subtree_removal_issues_exactly_one_remove() {
    let (fs, channel) = mirror_pair();
    fs.make_dirs(Path::new("/src/a/b/c")).unwrap();
    fs.write_file(Path::new("/src/a/b/f.txt"), "x").unwrap();
    let replicator = started_replicator(&fs, &channel);

    fs.remove_dir(Path::new("/src/a")).unwrap();
    replicator.drain_pending().unwrap();

    let issued = channel.mutations();
    assert_eq!(
        issued,
        vec![Command::Remove {
            path: "a".to_string()
        }]
    );
    assert!(!replicator.registry().is_watched(Path::new("/src/a")));
    assert!(!replicator.registry().is_watched(Path::new("/src/a/b")));
    assert!(!replicator.registry().is_watched(Path::new("/src/a/b/c")));
    assert_mirrored(&fs);
}

#[test]
fn test_removal_does_not_unwatch_textual_sibling() {
    let (fs, channel) = mirror_pair();
    fs.make_dirs(Path::new("/src/a")).unwrap();
    fs.make_dirs(Path::new("/src/ab")).unwrap();
    let replicator = started_replicator(&fs, &channel);

    fs.remove_dir(Path::new("/src/a")).unwrap();
    replicator.drain_pending().unwrap();

    assert!(replicator.registry().is_watched(Path::new("/src/ab")));

    // The surviving sibling still propagates.
    fs.write_file(Path::new("/src/ab/alive.txt"), "yes").unwrap();
    replicator.drain_pending().unwrap();
    assert_eq!(fs.read_file(Path::new("/dst/ab/alive.txt")).unwrap(), "yes");
    assert_mirrored(&fs);
}

#[test]
fn test_redundant_live_write_is_still_sent_but_target_skips_it() {
    let (fs, channel) = mirror_pair();
    fs.write_file(Path::new("/src/f.txt"), "same").unwrap();
    let replicator = started_replicator(&fs, &channel);
    let writes_before = fs.write_count();

    // Same content rewritten on the source: the propagator sends it anyway,
    // the target detects the no-op and skips the write.
    fs.write_file(Path::new("/src/f.txt"), "same").unwrap();
    replicator.drain_pending().unwrap();

    let issued = channel.mutations();
    assert_eq!(issued.len(), 1);
    assert!(matches!(&issued[0], Command::WriteFile { path, .. } if path == "f.txt"));
    // Only the source-side rewrite hit the filesystem.
    assert_eq!(fs.write_count(), writes_before + 1);
}

#[test]
fn test_type_change_file_replaces_directory() {
    let (fs, channel) = mirror_pair();
    fs.make_dirs(Path::new("/src/entry")).unwrap();
    fs.write_file(Path::new("/src/entry/orphan.txt"), "x").unwrap();
    let replicator = started_replicator(&fs, &channel);

    fs.remove_dir(Path::new("/src/entry")).unwrap();
    fs.write_file(Path::new("/src/entry"), "now a file").unwrap();
    replicator.drain_pending().unwrap();

    assert!(!fs.is_dir(Path::new("/dst/entry")));
    assert_eq!(
        fs.read_file(Path::new("/dst/entry")).unwrap(),
        "now a file"
    );
    assert!(!fs.exists(Path::new("/dst/entry/orphan.txt")));
    assert_mirrored(&fs);
}
