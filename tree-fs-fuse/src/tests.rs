use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use tree_fs::{SECTOR_SIZE, TreeFileSystem, WorkDir};
use vfs::{DirEntryType, Error};

use crate::BlockFile;

const TEST_SECTORS: usize = 4096;

/// 每个测试一个独立镜像文件，互不相扰
fn test_device(name: &str, sectors: usize) -> Arc<BlockFile> {
    let path = std::env::temp_dir().join(format!("tree-fs-test-{name}.img"));
    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)
        .unwrap();
    fd.set_len((sectors * SECTOR_SIZE) as u64).unwrap();
    Arc::new(BlockFile(Mutex::new(fd)))
}

#[test]
fn path_round_trip() {
    let fs = TreeFileSystem::format(test_device("path-round-trip", TEST_SECTORS));
    let root = WorkDir::root();

    fs.mkdir(&root, "/a").unwrap();
    fs.create(&root, "/a/b.txt", 1000).unwrap();

    let file = fs.open(&root, "/a/b.txt").unwrap();
    assert_eq!(file.len(), 1000);
    assert!(!file.is_dir());
    drop(file);

    fs.remove(&root, "/a/b.txt").unwrap();
    assert_eq!(fs.open(&root, "/a/b.txt").unwrap_err(), Error::NotFound);
    fs.close();
}

#[test]
fn empty_and_malformed_paths_fail() {
    let fs = TreeFileSystem::format(test_device("bad-paths", TEST_SECTORS));
    let root = WorkDir::root();

    assert_eq!(fs.open(&root, "").unwrap_err(), Error::InvalidPath);
    assert_eq!(fs.create(&root, "/", 0).unwrap_err(), Error::InvalidPath);
    assert_eq!(fs.remove(&root, "/").unwrap_err(), Error::InvalidPath);
    assert_eq!(
        fs.create(&root, "a-name-way-beyond-the-directory-entry-bound", 0)
            .unwrap_err(),
        Error::InvalidPath
    );
    assert_eq!(
        fs.open(&root, "/no/such/depth").unwrap_err(),
        Error::NotFound
    );
    fs.close();
}

#[test]
fn read_back_what_was_written() {
    let fs = TreeFileSystem::format(test_device("read-write", TEST_SECTORS));
    let root = WorkDir::root();

    fs.create(&root, "data", 0).unwrap();
    let mut file = fs.open(&root, "data").unwrap();

    let payload: Vec<u8> = (0..3000).map(|i| (i % 251) as u8).collect();
    assert_eq!(file.write(&payload).unwrap(), payload.len());
    assert_eq!(file.len(), payload.len());

    file.seek(0);
    let mut back = vec![0u8; payload.len()];
    assert_eq!(file.read(&mut back), payload.len());
    assert_eq!(back, payload);
    fs.close();
}

#[test]
fn growth_gap_reads_zero() {
    let fs = TreeFileSystem::format(test_device("growth-gap", TEST_SECTORS));
    let root = WorkDir::root();

    fs.create(&root, "sparse", 10).unwrap();
    let file = fs.open(&root, "sparse").unwrap();
    assert_eq!(file.write_at(2000, b"tail").unwrap(), 4);
    assert_eq!(file.len(), 2004);

    let mut gap = vec![0xffu8; 1990];
    assert_eq!(file.read_at(10, &mut gap), 1990);
    assert!(gap.iter().all(|&b| b == 0));

    let mut tail = [0u8; 4];
    assert_eq!(file.read_at(2000, &mut tail), 4);
    assert_eq!(&tail, b"tail");
    fs.close();
}

#[test]
fn survives_remount() {
    let dev = test_device("remount", TEST_SECTORS);
    let fs = TreeFileSystem::format(dev.clone());
    let root = WorkDir::root();

    fs.mkdir(&root, "/boot").unwrap();
    fs.create(&root, "/boot/kernel", 0).unwrap();
    let mut file = fs.open(&root, "/boot/kernel").unwrap();
    file.write(b"bzImage").unwrap();
    drop(file);

    let free_before = fs.free_sectors();
    fs.close();
    drop(fs);

    let fs = TreeFileSystem::mount(dev);
    assert_eq!(fs.free_sectors(), free_before);

    let mut file = fs.open(&root, "/boot/kernel").unwrap();
    let mut buf = [0u8; 7];
    assert_eq!(file.read(&mut buf), 7);
    assert_eq!(&buf, b"bzImage");
    fs.close();
}

#[test]
fn removal_returns_every_sector() {
    let fs = TreeFileSystem::format(test_device("removal-free", TEST_SECTORS));
    let root = WorkDir::root();

    let free_before = fs.free_sectors();
    fs.create(&root, "victim", 3 * SECTOR_SIZE).unwrap();
    assert!(fs.free_sectors() < free_before);

    fs.remove(&root, "victim").unwrap();
    assert_eq!(fs.free_sectors(), free_before);
    fs.close();
}

#[test]
fn failed_create_rolls_back_allocation() {
    let fs = TreeFileSystem::format(test_device("create-rollback", TEST_SECTORS));
    let root = WorkDir::root();

    fs.create(&root, "once", 600).unwrap();
    let free_before = fs.free_sectors();

    // inode 已初始化之后目录插入才失败，回退须归还全部扇区
    assert_eq!(
        fs.create(&root, "once", 600).unwrap_err(),
        Error::AlreadyExists
    );
    assert_eq!(fs.free_sectors(), free_before);
    fs.close();
}

#[test]
fn failed_extent_allocation_is_atomic() {
    // 小设备：64个扇区装不下一个顶满容量的文件
    let fs = TreeFileSystem::format(test_device("extent-atomic", 64));
    let root = WorkDir::root();

    let free_before = fs.free_sectors();
    assert_eq!(
        fs.create(&root, "big", 124 * SECTOR_SIZE).unwrap_err(),
        Error::NoSpace
    );
    assert_eq!(fs.free_sectors(), free_before);
    fs.close();
}

#[test]
fn directory_emptiness_gates_removal() {
    let fs = TreeFileSystem::format(test_device("emptiness-gate", TEST_SECTORS));
    let root = WorkDir::root();

    fs.mkdir(&root, "/d").unwrap();
    fs.create(&root, "/d/f", 0).unwrap();

    assert_eq!(fs.remove(&root, "/d").unwrap_err(), Error::DirectoryNotEmpty);
    assert!(fs.open(&root, "/d/f").is_ok());

    fs.remove(&root, "/d/f").unwrap();
    fs.remove(&root, "/d").unwrap();
    assert_eq!(fs.open(&root, "/d").unwrap_err(), Error::NotFound);
    fs.close();
}

#[test]
fn relative_paths_resolve_against_work_dir() {
    let fs = TreeFileSystem::format(test_device("work-dir-scope", TEST_SECTORS));
    let root = WorkDir::root();

    fs.mkdir(&root, "/x").unwrap();
    let mut wd = WorkDir::root();
    fs.chdir(&mut wd, "/x").unwrap();
    fs.create(&wd, "y", 10).unwrap();

    assert!(fs.open(&root, "/x/y").is_ok());

    fs.chdir(&mut wd, "/").unwrap();
    assert_eq!(fs.open(&wd, "y").unwrap_err(), Error::NotFound);
    assert!(fs.open(&wd, "/x/y").is_ok());
    fs.close();
}

#[test]
fn chdir_refuses_non_directories() {
    let fs = TreeFileSystem::format(test_device("chdir-kind", TEST_SECTORS));
    let root = WorkDir::root();

    fs.create(&root, "plain", 0).unwrap();
    let mut wd = WorkDir::root();
    assert_eq!(fs.chdir(&mut wd, "plain").unwrap_err(), Error::NotADirectory);
    assert_eq!(fs.chdir(&mut wd, "ghost").unwrap_err(), Error::NotFound);
    fs.close();
}

#[test]
fn dot_opens_the_work_dir_itself() {
    let fs = TreeFileSystem::format(test_device("dot", TEST_SECTORS));
    let root = WorkDir::root();

    fs.mkdir(&root, "/x").unwrap();
    let mut wd = WorkDir::root();
    fs.chdir(&mut wd, "/x").unwrap();

    let via_dot = fs.open(&wd, ".").unwrap();
    let via_path = fs.open(&root, "/x").unwrap();
    assert!(via_dot.is_dir());
    assert_eq!(via_dot.inumber(), via_path.inumber());

    // 根目录是自己的父目录
    let root_dot = fs.open(&root, ".").unwrap();
    assert_eq!(root_dot.inumber(), fs.open(&root, "/").unwrap().inumber());
    fs.close();
}

#[test]
fn readdir_yields_each_live_entry_once() {
    let fs = TreeFileSystem::format(test_device("readdir", TEST_SECTORS));
    let root = WorkDir::root();

    for name in ["a", "b", "c", "d"] {
        fs.create(&root, name, 0).unwrap();
    }
    fs.mkdir(&root, "sub").unwrap();
    fs.remove(&root, "b").unwrap();

    let mut dir = fs.open(&root, "/").unwrap();
    let mut seen = Vec::new();
    while let Some(entry) = fs.readdir(&mut dir).unwrap() {
        if entry.name == "sub" {
            assert_eq!(entry.ty, DirEntryType::Directory);
        } else {
            assert_eq!(entry.ty, DirEntryType::Regular);
        }
        seen.push(entry.name);
    }
    seen.sort();
    assert_eq!(seen, ["a", "c", "d", "sub"]);

    // 普通文件不可枚举
    let mut file = fs.open(&root, "a").unwrap();
    assert_eq!(fs.readdir(&mut file).unwrap_err(), Error::NotADirectory);
    fs.close();
}

#[test]
fn tombstoned_slots_are_reused() {
    let fs = TreeFileSystem::format(test_device("slot-reuse", TEST_SECTORS));
    let root = WorkDir::root();

    fs.create(&root, "first", 0).unwrap();
    fs.create(&root, "second", 0).unwrap();
    let dir_len = fs.open(&root, "/").unwrap().len();

    fs.remove(&root, "first").unwrap();
    fs.create(&root, "third", 0).unwrap();

    // 第三个文件落进墓碑槽位，目录文件没有变长
    assert_eq!(fs.open(&root, "/").unwrap().len(), dir_len);
    fs.close();
}

#[test]
fn create_in_removed_work_dir_is_rejected() {
    let fs = TreeFileSystem::format(test_device("stale-work-dir", TEST_SECTORS));
    let root = WorkDir::root();

    fs.mkdir(&root, "/gone").unwrap();
    let mut wd = WorkDir::root();
    fs.chdir(&mut wd, "/gone").unwrap();

    fs.remove(&root, "/gone").unwrap();
    assert_eq!(
        fs.create(&wd, "orphan", 0).unwrap_err(),
        Error::StaleWorkDir
    );
    fs.close();
}
