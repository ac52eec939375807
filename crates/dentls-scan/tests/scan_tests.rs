use dentls_scan::{DentError, MIN_BATCH_BUFFER, RunConfig, Snapshot, SnapshotReader, Visit};
use std::collections::BTreeSet;
use std::fs;
use std::os::unix::fs::symlink;
use std::path::Path;
use tempfile::TempDir;

fn config(root: &Path, buffer: Option<usize>) -> RunConfig {
    RunConfig::builder()
        .root(root)
        .buffer_size(buffer)
        .enter_directory(false)
        .build()
        .unwrap()
}

fn walked(snapshot: &Snapshot) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    snapshot
        .walk(&mut |name: &[u8], _: Visit| {
            out.push(name.to_vec());
            Ok::<(), ()>(())
        })
        .unwrap();
    out
}

fn regular_files(root: &Path) -> BTreeSet<Vec<u8>> {
    use std::os::unix::ffi::OsStrExt;

    fs::read_dir(root)
        .unwrap()
        .map(Result::unwrap)
        .filter(|e| e.file_type().unwrap().is_file())
        .map(|e| e.file_name().as_bytes().to_vec())
        .collect()
}

#[test]
fn test_walk_covers_every_regular_file_once() {
    let temp = TempDir::new().unwrap();
    for i in 0..2500 {
        fs::write(temp.path().join(format!("spool-{i:05}.msg")), "").unwrap();
    }
    fs::create_dir(temp.path().join("cur")).unwrap();
    symlink("/nonexistent", temp.path().join("dangling")).unwrap();

    let snapshot = SnapshotReader::new()
        .read(&config(temp.path(), None))
        .unwrap();
    let names = walked(&snapshot);

    let unique: BTreeSet<_> = names.iter().cloned().collect();
    assert_eq!(names.len(), 2500);
    assert_eq!(unique.len(), names.len());
    assert_eq!(unique, regular_files(temp.path()));
    assert_eq!(snapshot.stats().skipped, 2);
}

#[test]
fn test_minimum_buffer_needs_many_batches() {
    let temp = TempDir::new().unwrap();
    for i in 0..600 {
        fs::write(temp.path().join(format!("{i:0>40}")), "").unwrap();
    }

    let snapshot = SnapshotReader::new()
        .read(&config(temp.path(), Some(MIN_BATCH_BUFFER)))
        .unwrap();

    assert!(snapshot.stats().batches > 10);
    assert_eq!(snapshot.len(), 600);
    assert_eq!(
        walked(&snapshot).into_iter().collect::<BTreeSet<_>>(),
        regular_files(temp.path())
    );
}

#[test]
fn test_long_and_odd_names() {
    let temp = TempDir::new().unwrap();
    let long = "n".repeat(255);
    let odd = ["with space", "tab\there", "ünïcödé", "-dash", ".hidden", long.as_str()];
    for name in odd {
        fs::write(temp.path().join(name), "").unwrap();
    }

    let snapshot = SnapshotReader::new()
        .read(&config(temp.path(), Some(MIN_BATCH_BUFFER)))
        .unwrap();

    let got: BTreeSet<_> = walked(&snapshot).into_iter().collect();
    let want: BTreeSet<_> = odd.iter().map(|n| n.as_bytes().to_vec()).collect();
    assert_eq!(got, want);
}

#[test]
fn test_empty_directory() {
    let temp = TempDir::new().unwrap();

    let snapshot = SnapshotReader::new()
        .read(&config(temp.path(), None))
        .unwrap();

    assert!(snapshot.is_empty());
    assert!(walked(&snapshot).is_empty());
    assert_eq!(snapshot.stats().records, 2);
    snapshot.release();
}

#[test]
fn test_relative_root_rejected() {
    let err = SnapshotReader::new()
        .read(&config(Path::new("relative/dir"), None))
        .unwrap_err();
    assert!(err.is_usage());
}

#[test]
fn test_missing_root() {
    let temp = TempDir::new().unwrap();
    let err = SnapshotReader::new()
        .read(&config(&temp.path().join("absent"), None))
        .unwrap_err();
    assert!(matches!(err, DentError::Access { .. }));
}

#[test]
fn test_reading_does_not_modify_directory() {
    let temp = TempDir::new().unwrap();
    for i in 0..50 {
        fs::write(temp.path().join(format!("f{i}")), "").unwrap();
    }
    let before = regular_files(temp.path());

    let reader = SnapshotReader::new();
    let first = walked(&reader.read(&config(temp.path(), None)).unwrap());
    let second = walked(&reader.read(&config(temp.path(), None)).unwrap());

    assert_eq!(first, second);
    assert_eq!(regular_files(temp.path()), before);
}
