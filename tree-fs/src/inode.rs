//! # 索引节点层
//!
//! 内存中的 inode 句柄。同一扇区经由打开表共享同一个句柄，
//! 重复打开即引用计数加一；删除只做标记，
//! 物理回收推迟到最后一个句柄落下时，由析构完成。

use alloc::sync::Arc;
use core::fmt;
use core::ptr;
use core::sync::atomic::{AtomicBool, Ordering};

use vfs::Error;

use crate::fs::TreeFileSystem;
use crate::layout::{DiskInode, DiskInodeKind};
use crate::sector::SectorId;

pub struct Inode {
    /// inode 所在扇区，也是它的编号
    sector: SectorId,
    fs: Arc<TreeFileSystem>,
    /// 置位后，最后一个句柄落下时回收全部扇区
    removed: AtomicBool,
}

impl Inode {
    /// 打开扇区上的 inode；同一扇区共享句柄。
    /// 扇区上没有合法 inode 时返回空。
    pub fn open(fs: &Arc<TreeFileSystem>, sector: SectorId) -> Option<Arc<Self>> {
        let mut table = fs.inodes().lock();

        if let Some(inode) = table
            .iter()
            .find_map(|(s, weak)| (*s == sector).then(|| weak.upgrade()).flatten())
        {
            return Some(inode);
        }

        let valid = fs
            .cache()
            .get(sector)
            .lock()
            .map(0, |disk: &DiskInode| disk.is_valid());
        if !valid {
            return None;
        }

        let inode = Arc::new(Self {
            sector,
            fs: fs.clone(),
            removed: AtomicBool::new(false),
        });
        table.push((sector, Arc::downgrade(&inode)));
        Some(inode)
    }

    /// 在扇区上建立全新的 inode：原子地分配数据扇区，再落盘结构。
    /// 失败时磁盘与位图都原样不动。
    pub(crate) fn create(
        fs: &Arc<TreeFileSystem>,
        sector: SectorId,
        len: u32,
        kind: DiskInodeKind,
        parent: SectorId,
    ) -> Result<(), Error> {
        if len as usize > DiskInode::MAX_LEN {
            return Err(Error::NoSpace);
        }

        let mut disk = DiskInode::new(kind, parent);
        let count = DiskInode::sectors_for(len as usize);
        if count > 0 && !fs.free_map().lock().allocate_many(count, 0, &mut disk) {
            return Err(Error::NoSpace);
        }
        disk.set_len(len);

        // 新到手的数据扇区清零，空洞读出来才是零
        for index in 0..count {
            fs.cache().get(disk.data_sector(index)).lock().zeroize();
        }
        fs.cache()
            .get(sector)
            .lock()
            .map_mut(0, |dst: &mut DiskInode| *dst = disk);
        Ok(())
    }

    /// inode 的编号，即其所在扇区
    #[inline]
    pub fn inumber(&self) -> SectorId {
        self.sector
    }

    #[inline]
    pub(crate) fn fs(&self) -> &Arc<TreeFileSystem> {
        &self.fs
    }

    pub fn is_dir(&self) -> bool {
        self.on_disk(|disk| disk.is_dir())
    }

    pub fn len(&self) -> usize {
        self.on_disk(|disk| disk.len() as usize)
    }

    /// 父目录的 inode 扇区；根目录是自己的父目录
    pub fn parent(&self) -> SectorId {
        self.on_disk(|disk| disk.parent())
    }

    /// 标记删除；物理回收推迟到最后一个句柄落下
    pub fn remove(&self) {
        self.removed.store(true, Ordering::Relaxed);
    }

    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> usize {
        self.on_disk(|disk| disk.read_at(offset, buf, self.fs.cache()))
    }

    /// 写入可越过文件末尾：先按需原子扩容，扩不动则一字节都不写
    pub fn write_at(&self, offset: usize, buf: &[u8]) -> Result<usize, Error> {
        let end = offset + buf.len();
        self.on_disk_mut(|disk| {
            if end > disk.len() as usize {
                Self::grow(disk, end, &self.fs)?;
            }
            Ok(disk.write_at(offset, buf, self.fs.cache()))
        })
    }

    fn grow(disk: &mut DiskInode, new_len: usize, fs: &Arc<TreeFileSystem>) -> Result<(), Error> {
        if new_len > DiskInode::MAX_LEN {
            return Err(Error::NoSpace);
        }

        let old_count = disk.sector_count();
        let new_count = DiskInode::sectors_for(new_len);
        if new_count > old_count
            && !fs
                .free_map()
                .lock()
                .allocate_many(new_count - old_count, old_count, disk)
        {
            return Err(Error::NoSpace);
        }
        for index in old_count..new_count {
            fs.cache().get(disk.data_sector(index)).lock().zeroize();
        }
        disk.set_len(new_len as u32);
        Ok(())
    }

    /// 读取磁盘上的 inode 结构并处理
    fn on_disk<V>(&self, f: impl FnOnce(&DiskInode) -> V) -> V {
        self.fs.cache().get(self.sector).lock().map(0, f)
    }

    fn on_disk_mut<V>(&self, f: impl FnOnce(&mut DiskInode) -> V) -> V {
        self.fs.cache().get(self.sector).lock().map_mut(0, f)
    }
}

impl Drop for Inode {
    fn drop(&mut self) {
        let mut table = self.fs.inodes().lock();
        table.retain(|(s, weak)| *s != self.sector || !ptr::eq(weak.as_ptr(), self));
        drop(table);

        if !self.removed.load(Ordering::Relaxed) {
            return;
        }

        // 回收：数据扇区与 inode 扇区一并归还位图；
        // inode 扇区清零，悬空引用再打开会确定性失败
        let data_sectors = self.on_disk(|disk| disk.data_sectors());
        self.fs.cache().get(self.sector).lock().zeroize();

        let mut free_map = self.fs.free_map().lock();
        for sector in data_sectors {
            free_map.release(sector, 1);
        }
        free_map.release(self.sector, 1);
    }
}

impl fmt::Debug for Inode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inode").field("sector", &self.sector).finish()
    }
}
