//! inode 的磁盘结构，恰好占满一个扇区。
//!
//! 数据扇区由一张直接索引表指认，表项由分配器在分配时写入；
//! 表满即文件达到容量上限。目录的空间用于存放子项记录，
//! 文件的空间用于存放它的数据。

use alloc::vec::Vec;

use crate::sector::{CacheManager, SectorId};
use crate::{DataSector, SECTOR_SIZE};

/// 合法 inode 的标记；没有它的扇区不是 inode
const INODE_MAGIC: u32 = 0x494e_4f44;

/// 直接索引表的槽位数：扇区去掉4个u32头部字段后的余量，
/// 使 [`DiskInode`] 恰好占满一个扇区
const SECTOR_TABLE: usize = (SECTOR_SIZE - 16) / 4;

#[derive(Clone)]
#[repr(C)]
pub struct DiskInode {
    magic: u32,
    /// 文件字节长度
    len: u32,
    // 裸u32而非枚举：缓存会把任意扇区按本结构解读，
    // 字段必须对一切位模式都合法
    kind: u32,
    /// 父目录的 inode 扇区；根目录指向自身
    parent: u32,
    /// 直接索引表：归属本 inode 的数据扇区
    sectors: [u32; SECTOR_TABLE],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DiskInodeKind {
    File = 0,
    Directory = 1,
}

impl DiskInode {
    /// 直接索引表的槽位数
    pub const SECTOR_TABLE: usize = SECTOR_TABLE;
    /// 单个文件的最大字节数
    pub const MAX_LEN: usize = SECTOR_TABLE * SECTOR_SIZE;

    pub fn new(kind: DiskInodeKind, parent: SectorId) -> Self {
        Self {
            magic: INODE_MAGIC,
            len: 0,
            kind: kind as u32,
            parent: parent.into(),
            sectors: [0; SECTOR_TABLE],
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.magic == INODE_MAGIC
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == DiskInodeKind::Directory as u32
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.len
    }

    pub(crate) fn set_len(&mut self, len: u32) {
        debug_assert!(len as usize <= Self::MAX_LEN);
        self.len = len;
    }

    #[inline]
    pub fn parent(&self) -> SectorId {
        SectorId::new(self.parent)
    }

    /// 第 index 个数据扇区的编号
    #[inline]
    pub fn data_sector(&self, index: usize) -> SectorId {
        SectorId::new(self.sectors[index])
    }

    pub(crate) fn set_data_sector(&mut self, slot: usize, sector: SectorId) {
        self.sectors[slot] = sector.into();
    }

    /// 容纳 len 字节所需的数据扇区数
    #[inline]
    pub fn sectors_for(len: usize) -> usize {
        len.div_ceil(SECTOR_SIZE)
    }

    /// 已持有的数据扇区数
    #[inline]
    pub fn sector_count(&self) -> usize {
        Self::sectors_for(self.len as usize)
    }

    /// 持有的全部数据扇区，回收时用
    pub(crate) fn data_sectors(&self) -> Vec<SectorId> {
        (0..self.sector_count()).map(|i| self.data_sector(i)).collect()
    }

    /// 从指定位置（字节偏移）读出数据填充 `buf`，越过文件末尾的部分截断
    pub(crate) fn read_at(&self, offset: usize, buf: &mut [u8], cache: &CacheManager) -> usize {
        let mut start = offset;
        let end = (start + buf.len()).min(self.len as usize);
        if start >= end {
            return 0;
        }

        // 已读取多少字节
        let mut read_size = 0;
        loop {
            // 当前数据扇区在索引表中的位置
            let index = start / SECTOR_SIZE;
            // 当前扇区的末地址（字节）
            let current_end = ((index + 1) * SECTOR_SIZE).min(end);
            let chunk = current_end - start;
            let dest = &mut buf[read_size..read_size + chunk];

            cache
                .get(self.data_sector(index))
                .lock()
                .map(0, |data: &DataSector| {
                    // 绝对地址 % 扇区大小 = 扇区内偏移
                    let inner = start % SECTOR_SIZE;
                    dest.copy_from_slice(&data[inner..inner + chunk]);
                });

            read_size += chunk;

            if current_end == end {
                break;
            }
            start = current_end;
        }

        read_size
    }

    /// 从指定位置写入 `buf`；调用方须先扩容到足够长度
    pub(crate) fn write_at(&mut self, offset: usize, buf: &[u8], cache: &CacheManager) -> usize {
        let mut start = offset;
        let end = start + buf.len();
        assert!(end <= self.len as usize);
        if start >= end {
            return 0;
        }

        let mut written_size = 0;
        loop {
            let index = start / SECTOR_SIZE;
            let current_end = ((index + 1) * SECTOR_SIZE).min(end);
            let chunk = current_end - start;

            cache
                .get(self.data_sector(index))
                .lock()
                .map_mut(0, |data: &mut DataSector| {
                    let inner = start % SECTOR_SIZE;
                    data[inner..inner + chunk]
                        .copy_from_slice(&buf[written_size..written_size + chunk]);
                });

            written_size += chunk;

            if current_end == end {
                break;
            }
            start = current_end;
        }

        written_size
    }
}
