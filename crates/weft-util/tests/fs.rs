use std::fs;

use tempfile::TempDir;
use weft_util::fs::{copy_dir_all, find_ancestor_with, walk_files, write_atomic};

#[test]
fn test_write_atomic_creates_parents_and_replaces() {
    let tmp = TempDir::new().unwrap();
    let target = tmp.path().join("nested/dir/Weft.lock");

    write_atomic(&target, b"first").unwrap();
    assert_eq!(fs::read(&target).unwrap(), b"first");

    write_atomic(&target, b"second").unwrap();
    assert_eq!(fs::read(&target).unwrap(), b"second");

    let leftovers: Vec<_> = fs::read_dir(target.parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(leftovers.len(), 1, "temp files left behind: {leftovers:?}");
}

#[test]
fn test_find_ancestor_with() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("Weft.toml"), "").unwrap();
    let deep = tmp.path().join("a/b/c");
    fs::create_dir_all(&deep).unwrap();

    assert_eq!(
        find_ancestor_with(&deep, "Weft.toml").as_deref(),
        Some(tmp.path())
    );
    assert!(find_ancestor_with(&deep, "Nope.toml").is_none());
}

#[test]
fn test_copy_dir_all_skips_git_metadata() {
    let src = TempDir::new().unwrap();
    fs::create_dir_all(src.path().join(".git/objects")).unwrap();
    fs::write(src.path().join(".git/HEAD"), "ref").unwrap();
    fs::create_dir_all(src.path().join("weft/include")).unwrap();
    fs::write(src.path().join("weft/include/a.mqh"), "x").unwrap();

    let dst = TempDir::new().unwrap();
    copy_dir_all(src.path(), &dst.path().join("copy")).unwrap();

    assert!(dst.path().join("copy/weft/include/a.mqh").is_file());
    assert!(!dst.path().join("copy/.git").exists());
}

#[test]
fn test_walk_files_is_sorted() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("b")).unwrap();
    fs::write(tmp.path().join("b/z.mqh"), "").unwrap();
    fs::write(tmp.path().join("a.mqh"), "").unwrap();
    fs::write(tmp.path().join("b/c.mqh"), "").unwrap();

    let files = walk_files(tmp.path()).unwrap();
    let rel: Vec<_> = files
        .iter()
        .map(|p| p.strip_prefix(tmp.path()).unwrap().to_path_buf())
        .collect();
    assert_eq!(
        rel,
        vec![
            std::path::PathBuf::from("a.mqh"),
            std::path::PathBuf::from("b/c.mqh"),
            std::path::PathBuf::from("b/z.mqh"),
        ]
    );
}
