//! # 文件句柄层
//!
//! 打开的文件：inode 句柄配上一个句柄私有的读写位置。
//! 同一 inode 可以有多个文件句柄，各自的位置互不相扰；
//! 目录枚举把这个位置当游标用。

use alloc::sync::Arc;

use vfs::{Error, Stat, StatKind};

use crate::inode::Inode;
use crate::sector::SectorId;

#[derive(Debug)]
pub struct File {
    inode: Arc<Inode>,
    pos: usize,
}

impl File {
    pub fn open(inode: Arc<Inode>) -> Self {
        Self { inode, pos: 0 }
    }

    /// 自当前位置读，游标前移
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = self.inode.read_at(self.pos, buf);
        self.pos += n;
        n
    }

    /// 自当前位置写，按需扩容，游标前移
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        let n = self.inode.write_at(self.pos, buf)?;
        self.pos += n;
        Ok(n)
    }

    /// 从指定偏移读，不动游标
    #[inline]
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> usize {
        self.inode.read_at(offset, buf)
    }

    /// 往指定偏移写，不动游标
    #[inline]
    pub fn write_at(&self, offset: usize, buf: &[u8]) -> Result<usize, Error> {
        self.inode.write_at(offset, buf)
    }

    #[inline]
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    #[inline]
    pub fn tell(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inode.len()
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.inode.is_dir()
    }

    /// inode 编号，即其所在扇区
    #[inline]
    pub fn inumber(&self) -> SectorId {
        self.inode.inumber()
    }

    pub fn stat(&self) -> Stat {
        let kind = if self.is_dir() {
            StatKind::DIR
        } else {
            StatKind::FILE
        };
        Stat::new(u64::from(u32::from(self.inumber())), kind)
    }

    #[inline]
    pub(crate) fn inode(&self) -> &Arc<Inode> {
        &self.inode
    }
}
