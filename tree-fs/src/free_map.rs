//! # 空闲扇区分配器
//!
//! 位图，每个扇区一位，置位即占用；扇区存活与否唯一以此为准。
//! 位图整体驻留内存，持久化为保留 inode（[`FREE_MAP_SECTOR`]）
//! 的文件内容：格式化时建立，挂载时读入，停机时写回，
//! 走的都是普通文件的读写路径。
//!
//! [`FREE_MAP_SECTOR`]: crate::FREE_MAP_SECTOR

use alloc::vec;
use alloc::vec::Vec;

use crate::layout::DiskInode;
use crate::sector::SectorId;

/// 空闲扇区位图
pub struct FreeMap {
    /// 位组，置位即占用
    words: Vec<u64>,
    /// 设备总扇区数
    len: usize,
}

impl FreeMap {
    /// 全空的位图。
    /// 末尾越过设备的那些位直接标记占用，扫描便永远不会交出它们。
    pub fn new(sectors: usize) -> Self {
        let mut map = Self {
            words: vec![0; sectors.div_ceil(64)],
            len: sectors,
        };
        for pos in sectors..map.words.len() * 64 {
            map.set(pos);
        }
        map
    }

    /// 设备总扇区数
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// 当前空闲扇区数
    pub fn free_sectors(&self) -> usize {
        self.words.iter().map(|w| w.count_zeros() as usize).sum()
    }

    /// 把知名扇区标记为占用，仅格式化时用
    pub fn mark(&mut self, sector: SectorId) {
        assert!(!self.test(sector.index()));
        self.set(sector.index());
    }

    /// 分配一个空闲扇区；耗尽时返回空且位图不变
    pub fn allocate_one(&mut self) -> Option<SectorId> {
        let (index, word) = self
            .words
            .iter()
            .enumerate()
            .find(|(_, word)| **word != u64::MAX)?;
        let pos = index * 64 + word.trailing_ones() as usize;
        self.set(pos);
        Some(SectorId::new(pos as u32))
    }

    /// 一次性分配 `count` 个扇区（不要求连续），记入 inode
    /// 直接索引表中自 `first_slot` 起的槽位。
    /// 要么全部到手，要么位图原样不动。
    pub fn allocate_many(&mut self, count: usize, first_slot: usize, inode: &mut DiskInode) -> bool {
        if first_slot + count > DiskInode::SECTOR_TABLE || self.free_sectors() < count {
            return false;
        }
        for i in 0..count {
            // 预检保证此处不会落空
            let sector = self.allocate_one().unwrap();
            inode.set_data_sector(first_slot + i, sector);
        }
        true
    }

    /// 释放自 `sector` 起的 `count` 个扇区。
    /// 释放空闲扇区（双重释放）或越过设备末尾是调用方的逻辑错误。
    pub fn release(&mut self, sector: SectorId, count: usize) {
        for pos in sector.index()..sector.index() + count {
            assert!(pos < self.len, "release past end of device");
            assert!(self.test(pos), "double free of sector {pos}");
            self.clear(pos);
        }
    }

    /// 从持久化字节中恢复
    pub(crate) fn load(sectors: usize, bytes: &[u8]) -> Self {
        let mut map = Self::new(sectors);
        for (index, chunk) in bytes.chunks(8).enumerate() {
            let mut word = [0u8; 8];
            word[..chunk.len()].copy_from_slice(chunk);
            // 末尾哨兵位保持置位
            map.words[index] |= u64::from_le_bytes(word);
        }
        map
    }

    /// 持久化为小端字节
    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.byte_len());
        for word in &self.words {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    /// 位图文件的字节长度
    pub(crate) fn byte_len(&self) -> usize {
        self.words.len() * 8
    }

    #[inline]
    fn test(&self, pos: usize) -> bool {
        self.words[pos / 64] & (1u64 << (pos % 64)) != 0
    }

    #[inline]
    fn set(&mut self, pos: usize) {
        self.words[pos / 64] |= 1u64 << (pos % 64);
    }

    #[inline]
    fn clear(&mut self, pos: usize) {
        self.words[pos / 64] &= !(1u64 << (pos % 64));
    }
}
