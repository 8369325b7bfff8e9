use super::*;

use std::fs::{create_dir, create_dir_all, write};

fn relative(root: &Path, mut paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths.sort();
    paths
        .into_iter()
        .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
        .collect()
}

#[test]
fn scan_dir_enqueues_subdirs_and_batches_files() {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let root = tmp.path();

    // root/
    //   a.txt
    //   sub/
    //     b.txt
    write(root.join("a.txt"), b"a").expect("write a.txt");
    create_dir(root.join("sub")).expect("create sub");
    write(root.join("sub").join("b.txt"), b"b").expect("write b.txt");

    let (work_tx, work_rx) = channel::unbounded::<PathBuf>();
    let mut batch = Vec::new();
    let pending = AtomicUsize::new(0);

    scan_dir(root, &work_tx, &mut batch, &pending);

    let queued = work_rx.try_recv().expect("a subdir should be queued");
    assert_eq!(queued, root.join("sub"));
    assert!(work_rx.try_recv().is_err(), "only one subdir expected");

    // Directories are queued, not batched.
    assert_eq!(batch, vec![root.join("a.txt")]);
    assert_eq!(pending.load(Ordering::Relaxed), 1);
}

#[test]
fn scan_dir_on_missing_directory_is_silent() {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let (work_tx, work_rx) = channel::unbounded::<PathBuf>();
    let mut batch = Vec::new();
    let pending = AtomicUsize::new(0);

    scan_dir(&tmp.path().join("nope"), &work_tx, &mut batch, &pending);

    assert!(batch.is_empty());
    assert!(work_rx.try_recv().is_err());
}

#[test]
fn walk_parallel_emits_files_from_every_level() {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let root = tmp.path().to_path_buf();

    write(root.join("a.txt"), b"a").expect("write a.txt");
    create_dir_all(root.join("sub").join("deep")).expect("create dirs");
    write(root.join("sub").join("b.txt"), b"b").expect("write b.txt");
    write(root.join("sub").join("deep").join("c.txt"), b"c").expect("write c.txt");
    create_dir(root.join("empty")).expect("create empty");

    let (file_tx, file_rx) = channel::unbounded::<Vec<PathBuf>>();
    walk_parallel(vec![root.clone()], file_tx.clone(), 4).expect("walk_parallel");
    drop(file_tx);

    let mut paths = Vec::new();
    while let Ok(batch) = file_rx.recv() {
        paths.extend(batch);
    }

    assert_eq!(
        relative(&root, paths),
        vec![
            PathBuf::from("a.txt"),
            PathBuf::from("sub/b.txt"),
            PathBuf::from("sub/deep/c.txt"),
        ]
    );
}

#[test]
fn walk_parallel_with_no_roots_emits_nothing() {
    let (file_tx, file_rx) = channel::unbounded::<Vec<PathBuf>>();

    walk_parallel(Vec::new(), file_tx.clone(), 4).expect("walk_parallel");

    drop(file_tx);
    assert!(file_rx.recv().is_err());
}

#[test]
fn collect_files_spans_more_than_one_batch() {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let root = tmp.path();

    for i in 0..(BATCH_SIZE * 2 + 5) {
        write(root.join(format!("f{i:03}.log")), b"x").expect("write file");
    }

    let files = collect_files(root, 2).expect("collect_files");
    assert_eq!(files.len(), BATCH_SIZE * 2 + 5);
}

#[cfg(unix)]
#[test]
fn symlinked_directories_are_not_descended() {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let root = tmp.path().join("root");
    let outside = tmp.path().join("outside");
    create_dir(&root).unwrap();
    create_dir(&outside).unwrap();
    write(outside.join("hidden.txt"), b"x").unwrap();
    std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

    let files = collect_files(&root, 1).expect("collect_files");
    assert_eq!(relative(&root, files), vec![PathBuf::from("link")]);
}

#[test]
fn walk_stops_when_the_consumer_goes_away() {
    let tmp = tempfile::tempdir().expect("create temp dir");
    for d in 0..16 {
        let dir = tmp.path().join(format!("d{d}"));
        create_dir_all(&dir).unwrap();
        for f in 0..(BATCH_SIZE + 1) {
            write(dir.join(format!("{f}.txt")), b"x").unwrap();
        }
    }

    let (file_tx, file_rx) = channel::unbounded::<Vec<PathBuf>>();
    drop(file_rx);

    let (done_tx, done_rx) = channel::bounded(1);
    let root = tmp.path().to_path_buf();
    thread::spawn(move || {
        let result = walk_parallel(vec![root], file_tx, 4);
        let _ = done_tx.send(result.is_ok());
    });

    let finished = done_rx.recv_timeout(Duration::from_secs(10));
    assert_eq!(finished, Ok(true), "walk kept running without a consumer");
}
