//! Startup reconciliation against stale, empty, and matching targets

use crate::integration::test_utils::{assert_mirrored, mirror_pair};
use std::path::Path;
use tether::command::Command;
use tether::fs::FileSystem;
use tether::source::Reconciler;

fn writefile(path: &str, content: &str) -> Command {
    Command::WriteFile {
        path: path.to_string(),
        content: content.to_string(),
    }
}

#[test]
fn test_stale_target_scenario() {
    let (fs, channel) = mirror_pair();
    fs.write_file(Path::new("/src/f1.txt"), "hello").unwrap();
    fs.make_dirs(Path::new("/src/sub")).unwrap();
    fs.write_file(Path::new("/src/sub/f2.txt"), "world").unwrap();
    fs.write_file(Path::new("/dst/f1.txt"), "old").unwrap();
    fs.write_file(Path::new("/dst/extra.txt"), "gone").unwrap();

    Reconciler::new(fs.as_ref(), Path::new("/src"), channel.as_ref())
        .run()
        .unwrap();

    let issued = channel.mutations();
    assert!(issued.contains(&writefile("f1.txt", "hello")));
    assert!(issued.contains(&writefile("sub/f2.txt", "world")));
    assert!(issued.contains(&Command::MakeDir {
        path: "sub".to_string()
    }));
    assert!(issued.contains(&Command::Remove {
        path: "extra.txt".to_string()
    }));

    // The directory is announced before anything is written into it.
    let makedir_at = issued
        .iter()
        .position(|c| matches!(c, Command::MakeDir { path } if path == "sub"))
        .unwrap();
    let write_at = issued
        .iter()
        .position(|c| matches!(c, Command::WriteFile { path, .. } if path == "sub/f2.txt"))
        .unwrap();
    assert!(makedir_at < write_at);

    assert_mirrored(&fs);
}

#[test]
fn test_unchanged_file_is_not_retransmitted() {
    let (fs, channel) = mirror_pair();
    fs.write_file(Path::new("/src/same.txt"), "same").unwrap();
    fs.write_file(Path::new("/dst/same.txt"), "same").unwrap();

    Reconciler::new(fs.as_ref(), Path::new("/src"), channel.as_ref())
        .run()
        .unwrap();

    assert!(channel.mutations().is_empty());
}

#[test]
fn test_idempotent_convergence() {
    let (fs, channel) = mirror_pair();
    fs.make_dirs(Path::new("/src/a/b")).unwrap();
    fs.write_file(Path::new("/src/a/one.txt"), "1").unwrap();
    fs.write_file(Path::new("/src/a/b/two.txt"), "2").unwrap();
    let reconciler = Reconciler::new(fs.as_ref(), Path::new("/src"), channel.as_ref());

    reconciler.run().unwrap();
    channel.take_mutations();

    let stats = reconciler.run().unwrap();
    assert_eq!(stats.commands_issued, 0);
    assert!(channel.mutations().is_empty());
    assert_mirrored(&fs);
}

#[test]
fn test_target_file_blocking_source_directory() {
    let (fs, channel) = mirror_pair();
    fs.make_dirs(Path::new("/src/clash")).unwrap();
    fs.write_file(Path::new("/src/clash/inner.txt"), "x").unwrap();
    fs.write_file(Path::new("/dst/clash"), "a file in the way")
        .unwrap();

    Reconciler::new(fs.as_ref(), Path::new("/src"), channel.as_ref())
        .run()
        .unwrap();

    // The defensive remove clears the file before the makedir.
    let issued = channel.mutations();
    let remove_at = issued
        .iter()
        .position(|c| matches!(c, Command::Remove { path } if path == "clash"))
        .unwrap();
    let makedir_at = issued
        .iter()
        .position(|c| matches!(c, Command::MakeDir { path } if path == "clash"))
        .unwrap();
    assert!(remove_at < makedir_at);
    assert_mirrored(&fs);
}

#[test]
fn test_deeply_stale_target_converges() {
    let (fs, channel) = mirror_pair();
    fs.make_dirs(Path::new("/src/keep/nested")).unwrap();
    fs.write_file(Path::new("/src/keep/nested/f.txt"), "fresh")
        .unwrap();
    fs.make_dirs(Path::new("/dst/keep/nested")).unwrap();
    fs.write_file(Path::new("/dst/keep/nested/f.txt"), "stale")
        .unwrap();
    fs.write_file(Path::new("/dst/keep/orphan.txt"), "orphan")
        .unwrap();
    fs.make_dirs(Path::new("/dst/dead/branch")).unwrap();

    let stats = Reconciler::new(fs.as_ref(), Path::new("/src"), channel.as_ref())
        .run()
        .unwrap();

    assert_eq!(stats.files_written, 1);
    assert_eq!(stats.removed, 2); // keep/orphan.txt and dead
    assert_mirrored(&fs);
}
