//! Tests for the reconciling manager
//!
//! Each test lays out a real directory tree first, then constructs the
//! manager over it, then mutates the tree out-of-band (or through the
//! manager) and checks that IDs stick to their files.

use crate::{
    actions::{ActionDispatcher, ContentsEvent},
    config::FileIdConfig,
    error::FileIdError,
    manager::{FileIdManager, LocalFileIdManager},
};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Scratch {
    tmp: TempDir,
    root: PathBuf,
}

/// A served root inside a temp dir, with the store file kept outside the
/// root so the walk never sees it.
fn scratch() -> Scratch {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("root");
    fs::create_dir(&root).unwrap();
    let root = root.canonicalize().unwrap();
    Scratch { tmp, root }
}

async fn manager(scratch: &Scratch) -> LocalFileIdManager {
    let db_path = scratch.tmp.path().join("file_id_manager.db");
    let config = FileIdConfig::new(&scratch.root, db_path).unwrap();
    LocalFileIdManager::new(config).await.unwrap()
}

/// Let file timestamps move past filesystem clock granularity.
async fn tick() {
    tokio::time::sleep(Duration::from_millis(25)).await;
}

#[tokio::test]
async fn index_then_get_path_round_trips() {
    let scratch = scratch();
    fs::write(scratch.root.join("a.txt"), b"one").unwrap();
    let fim = manager(&scratch).await;

    let id = fim.index("a.txt").await.unwrap().unwrap();
    assert_eq!(fim.get_path(&id).await.unwrap().as_deref(), Some("a.txt"));
    assert_eq!(fim.get_id("a.txt").await.unwrap(), Some(id));
}

#[tokio::test]
async fn index_of_missing_path_is_none() {
    let scratch = scratch();
    let fim = manager(&scratch).await;

    assert_eq!(fim.index("nope.txt").await.unwrap(), None);
    assert_eq!(fim.get_id("nope.txt").await.unwrap(), None);
}

#[tokio::test]
async fn out_of_band_rename_is_detected() {
    let scratch = scratch();
    fs::create_dir(scratch.root.join("sub")).unwrap();
    fs::write(scratch.root.join("a.txt"), b"one").unwrap();
    let fim = manager(&scratch).await;

    let id = fim.index("a.txt").await.unwrap().unwrap();

    fs::rename(scratch.root.join("a.txt"), scratch.root.join("sub/a.txt")).unwrap();

    assert_eq!(fim.get_path(&id).await.unwrap().as_deref(), Some("sub/a.txt"));
    assert_eq!(fim.get_id("sub/a.txt").await.unwrap(), Some(id));
}

#[tokio::test]
async fn out_of_band_directory_rename_keeps_descendant_ids() {
    let scratch = scratch();
    fs::create_dir(scratch.root.join("d")).unwrap();
    fs::write(scratch.root.join("d/x"), b"x").unwrap();
    fs::write(scratch.root.join("d/y"), b"y").unwrap();
    let fim = manager(&scratch).await;

    let id_x = fim.index("d/x").await.unwrap().unwrap();
    let id_y = fim.index("d/y").await.unwrap().unwrap();

    fs::rename(scratch.root.join("d"), scratch.root.join("e")).unwrap();

    assert_eq!(fim.get_path(&id_x).await.unwrap().as_deref(), Some("e/x"));
    assert_eq!(fim.get_path(&id_y).await.unwrap().as_deref(), Some("e/y"));
    assert_eq!(fim.get_id("e/x").await.unwrap(), Some(id_x));
}

#[tokio::test]
async fn rename_through_the_api_keeps_the_id() {
    let scratch = scratch();
    fs::write(scratch.root.join("a.txt"), b"one").unwrap();
    let fim = manager(&scratch).await;

    let id = fim.index("a.txt").await.unwrap().unwrap();

    fs::rename(scratch.root.join("a.txt"), scratch.root.join("b.txt")).unwrap();
    let moved = fim.rename("a.txt", "b.txt").await.unwrap();

    assert_eq!(moved.as_deref(), Some(id.as_str()));
    assert_eq!(fim.get_path(&id).await.unwrap().as_deref(), Some("b.txt"));
}

#[tokio::test]
async fn rename_to_a_missing_destination_is_none() {
    let scratch = scratch();
    fs::write(scratch.root.join("a.txt"), b"one").unwrap();
    let fim = manager(&scratch).await;

    fim.index("a.txt").await.unwrap().unwrap();
    assert_eq!(fim.rename("a.txt", "gone.txt").await.unwrap(), None);
}

#[tokio::test]
async fn directory_rename_through_the_api_reparents_descendants() {
    let scratch = scratch();
    fs::create_dir(scratch.root.join("d")).unwrap();
    fs::write(scratch.root.join("d/x"), b"x").unwrap();
    let fim = manager(&scratch).await;

    let id_dir = fim.index("d").await.unwrap().unwrap();
    let id_x = fim.index("d/x").await.unwrap().unwrap();

    fs::rename(scratch.root.join("d"), scratch.root.join("e")).unwrap();
    let moved = fim.rename("d", "e").await.unwrap();

    assert_eq!(moved.as_deref(), Some(id_dir.as_str()));
    assert_eq!(fim.get_id("e/x").await.unwrap(), Some(id_x.clone()));
    assert_eq!(fim.get_path(&id_x).await.unwrap().as_deref(), Some("e/x"));
}

#[tokio::test]
async fn delete_and_replace_at_the_same_path_changes_the_id() {
    let scratch = scratch();
    fs::write(scratch.root.join("a.txt"), b"first").unwrap();
    let fim = manager(&scratch).await;

    let id_first = fim.index("a.txt").await.unwrap().unwrap();

    tick().await;
    // build the replacement while the original still exists, so the two
    // are guaranteed distinct inodes
    fs::write(scratch.root.join("replacement.tmp"), b"second").unwrap();
    fs::remove_file(scratch.root.join("a.txt")).unwrap();
    fs::rename(
        scratch.root.join("replacement.tmp"),
        scratch.root.join("a.txt"),
    )
    .unwrap();

    // the old identity does not transfer to the new occupant
    assert_ne!(fim.get_id("a.txt").await.unwrap(), Some(id_first.clone()));

    let id_second = fim.index("a.txt").await.unwrap().unwrap();
    assert_ne!(id_second, id_first);
}

#[tokio::test]
async fn copy_assigns_a_fresh_id_to_the_destination() {
    let scratch = scratch();
    fs::create_dir(scratch.root.join("d")).unwrap();
    fs::write(scratch.root.join("d/x"), b"x").unwrap();
    let fim = manager(&scratch).await;

    let id_x = fim.index("d/x").await.unwrap().unwrap();

    fs::create_dir(scratch.root.join("e")).unwrap();
    fs::copy(scratch.root.join("d/x"), scratch.root.join("e/x")).unwrap();
    let id_copy = fim.copy("d", "e").await.unwrap().unwrap();

    let id_ex = fim.get_id("e/x").await.unwrap().unwrap();
    assert_ne!(id_ex, id_x);
    assert_ne!(id_copy, id_ex);

    // the source keeps its identity
    assert_eq!(fim.get_id("d/x").await.unwrap(), Some(id_x));
}

#[tokio::test]
async fn save_preserves_the_id_across_an_edit() {
    let scratch = scratch();
    fs::write(scratch.root.join("a.txt"), b"v1").unwrap();
    let fim = manager(&scratch).await;

    let id = fim.index("a.txt").await.unwrap().unwrap();

    tick().await;
    // rewrite in place: new mtime, same inode
    fs::write(scratch.root.join("a.txt"), b"v2 with more content").unwrap();

    assert_eq!(fim.save("a.txt").await.unwrap(), Some(id.clone()));
    assert_eq!(fim.get_id("a.txt").await.unwrap(), Some(id));
}

#[tokio::test]
async fn save_of_a_missing_path_is_a_no_op() {
    let scratch = scratch();
    let fim = manager(&scratch).await;

    assert_eq!(fim.save("gone.txt").await.unwrap(), None);
}

#[tokio::test]
async fn delete_removes_the_record_and_descendants() {
    let scratch = scratch();
    fs::create_dir(scratch.root.join("d")).unwrap();
    fs::write(scratch.root.join("d/x"), b"x").unwrap();
    fs::write(scratch.root.join("a.txt"), b"a").unwrap();
    let fim = manager(&scratch).await;

    let id_a = fim.index("a.txt").await.unwrap().unwrap();
    let id_x = fim.index("d/x").await.unwrap().unwrap();

    fs::remove_file(scratch.root.join("a.txt")).unwrap();
    fim.delete("a.txt").await.unwrap();
    assert_eq!(fim.get_id("a.txt").await.unwrap(), None);
    assert_eq!(fim.get_path(&id_a).await.unwrap(), None);

    fs::remove_dir_all(scratch.root.join("d")).unwrap();
    fim.delete("d").await.unwrap();
    assert_eq!(fim.get_path(&id_x).await.unwrap(), None);
}

#[cfg(unix)]
#[tokio::test]
async fn indexing_a_symlink_resolves_to_its_target() {
    let scratch = scratch();
    fs::write(scratch.root.join("b"), b"target").unwrap();
    std::os::unix::fs::symlink(scratch.root.join("b"), scratch.root.join("a")).unwrap();
    let fim = manager(&scratch).await;

    let id_target = fim.index("b").await.unwrap().unwrap();
    let id_link = fim.index("a").await.unwrap().unwrap();
    assert_eq!(id_link, id_target);

    // the link itself is never tracked
    assert_eq!(fim.get_id("a").await.unwrap(), None);
}

#[tokio::test]
async fn construction_rejects_a_relative_root() {
    let tmp = TempDir::new().unwrap();
    let config = FileIdConfig::new("relative/root", tmp.path().join("s.db")).unwrap();
    let result = LocalFileIdManager::new(config).await;
    assert!(matches!(result, Err(FileIdError::Config(_))));
}

#[tokio::test]
async fn dispatcher_applies_host_events() {
    let scratch = scratch();
    fs::write(scratch.root.join("a.txt"), b"one").unwrap();
    let fim = Arc::new(manager(&scratch).await);
    let dispatcher = ActionDispatcher::new(fim.clone());

    let id = fim.index("a.txt").await.unwrap().unwrap();

    fs::rename(scratch.root.join("a.txt"), scratch.root.join("b.txt")).unwrap();
    let event: ContentsEvent = serde_json::from_str(
        r#"{"action": "rename", "path": "b.txt", "source_path": "a.txt"}"#,
    )
    .unwrap();
    dispatcher.dispatch(&event).await.unwrap();
    assert_eq!(fim.get_path(&id).await.unwrap().as_deref(), Some("b.txt"));

    fs::remove_file(scratch.root.join("b.txt")).unwrap();
    let event: ContentsEvent =
        serde_json::from_str(r#"{"action": "delete", "path": "b.txt"}"#).unwrap();
    dispatcher.dispatch(&event).await.unwrap();
    assert_eq!(fim.get_path(&id).await.unwrap(), None);
}
