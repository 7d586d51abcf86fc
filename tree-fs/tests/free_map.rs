use tree_fs::layout::{DiskInode, DiskInodeKind};
use tree_fs::{FreeMap, ROOT_DIR_SECTOR, SectorId};

#[test]
fn allocations_never_overlap() {
    let mut map = FreeMap::new(100);
    let mut granted = Vec::new();

    while let Some(sector) = map.allocate_one() {
        assert!(!granted.contains(&sector));
        granted.push(sector);
    }

    assert_eq!(granted.len(), 100);
    assert_eq!(map.free_sectors(), 0);
}

#[test]
fn failed_multi_allocation_changes_nothing() {
    let mut map = FreeMap::new(10);
    let mut inode = DiskInode::new(DiskInodeKind::File, ROOT_DIR_SECTOR);

    assert!(!map.allocate_many(11, 0, &mut inode));
    assert_eq!(map.free_sectors(), 10);

    assert!(map.allocate_many(10, 0, &mut inode));
    assert_eq!(map.free_sectors(), 0);
}

#[test]
fn multi_allocation_records_into_the_table() {
    let mut map = FreeMap::new(64);
    let mut inode = DiskInode::new(DiskInodeKind::File, ROOT_DIR_SECTOR);

    assert!(map.allocate_many(5, 0, &mut inode));
    let mut granted: Vec<_> = (0..5).map(|i| inode.data_sector(i)).collect();
    granted.sort();
    granted.dedup();
    assert_eq!(granted.len(), 5);
}

#[test]
fn release_returns_sectors() {
    let mut map = FreeMap::new(64);
    let a = map.allocate_one().unwrap();
    let b = map.allocate_one().unwrap();

    map.release(a, 1);
    assert_eq!(map.free_sectors(), 63);
    map.release(b, 1);
    assert_eq!(map.free_sectors(), 64);
}

#[test]
fn table_overflow_is_refused() {
    let mut map = FreeMap::new(200);
    let mut inode = DiskInode::new(DiskInodeKind::File, ROOT_DIR_SECTOR);

    assert!(!map.allocate_many(DiskInode::SECTOR_TABLE + 1, 0, &mut inode));
    assert_eq!(map.free_sectors(), 200);
}

#[test]
#[should_panic(expected = "double free")]
fn double_free_is_a_bug() {
    let mut map = FreeMap::new(64);
    let sector = map.allocate_one().unwrap();
    map.release(sector, 1);
    map.release(sector, 1);
}

#[test]
#[should_panic(expected = "past end")]
fn release_past_the_device_is_a_bug() {
    let mut map = FreeMap::new(64);
    let mut inode = DiskInode::new(DiskInodeKind::File, ROOT_DIR_SECTOR);
    assert!(map.allocate_many(64, 0, &mut inode));

    map.release(SectorId::new(60), 8);
}
