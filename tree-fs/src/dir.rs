//! # 目录层
//!
//! 目录也是文件：内容是一串定长目录项记录，按记录对齐读写。
//! 删除只在原记录上打墓碑，从不紧缩；
//! 新增优先复用墓碑槽位，没有才在末尾扩展。
//!
//! 路径到目录句柄的逐分量下行也在这一层完成。

use alloc::string::String;
use alloc::sync::Arc;
use core::cell::Cell;

use vfs::Error;

use crate::fs::{TreeFileSystem, WorkDir};
use crate::inode::Inode;
use crate::layout::{DirEntry, DiskInodeKind};
use crate::path::Path as _;
use crate::sector::SectorId;
use crate::{NAME_MAX, ROOT_DIR_SECTOR, SECTOR_SIZE};

/// 打开的目录：inode 句柄加枚举游标
pub struct Dir {
    inode: Arc<Inode>,
    pos: Cell<usize>,
}

impl Dir {
    /// 单个扇区可容纳的目录项数，即新目录的初始容量
    pub const INIT_ENTRIES: usize = SECTOR_SIZE / DirEntry::SIZE;

    /// 打开目录；inode 不是目录时返回空
    pub fn open(inode: Arc<Inode>) -> Option<Self> {
        inode.is_dir().then(|| Self {
            inode,
            pos: Cell::new(0),
        })
    }

    /// 打开根目录
    pub fn open_root(fs: &Arc<TreeFileSystem>) -> Option<Self> {
        Inode::open(fs, ROOT_DIR_SECTOR).and_then(Self::open)
    }

    /// 同一 inode 上的新句柄，游标归零
    pub fn reopen(&self) -> Self {
        Self {
            inode: self.inode.clone(),
            pos: Cell::new(0),
        }
    }

    /// 建立新目录：一个扇区大小的空目录项表
    pub(crate) fn create(
        fs: &Arc<TreeFileSystem>,
        sector: SectorId,
        parent: SectorId,
    ) -> Result<(), Error> {
        Inode::create(
            fs,
            sector,
            (Self::INIT_ENTRIES * DirEntry::SIZE) as u32,
            DiskInodeKind::Directory,
            parent,
        )
    }

    #[inline]
    pub fn inode(&self) -> &Arc<Inode> {
        &self.inode
    }

    #[inline]
    pub fn inumber(&self) -> SectorId {
        self.inode.inumber()
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.pos.get()
    }

    #[inline]
    pub fn set_pos(&self, pos: usize) {
        self.pos.set(pos);
    }

    /// 按名字查找目录项并打开其 inode
    pub fn lookup(&self, name: &str) -> Option<Arc<Inode>> {
        let (_, entry) = self.find(|e| e.is_in_use() && e.name() == name)?;
        Inode::open(self.inode.fs(), entry.sector())
    }

    /// 加入一条名为 `name`、指向 `sector` 的目录项
    pub fn add(&self, name: &str, sector: SectorId) -> Result<(), Error> {
        if name.is_empty() || name.len() > NAME_MAX {
            return Err(Error::InvalidPath);
        }
        if self.find(|e| e.is_in_use() && e.name() == name).is_some() {
            return Err(Error::AlreadyExists);
        }

        let offset = match self.find(|e| !e.is_in_use()) {
            Some((offset, _)) => offset,
            None => self.inode.len(),
        };
        let entry = DirEntry::new(name, sector);
        let written = self.inode.write_at(offset, entry.as_bytes())?;
        debug_assert_eq!(written, DirEntry::SIZE);
        Ok(())
    }

    /// 删除名为 `name` 的目录项：记录墓碑化，inode 标记删除
    pub fn remove(&self, name: &str) -> Result<(), Error> {
        let (offset, mut entry) = self
            .find(|e| e.is_in_use() && e.name() == name)
            .ok_or(Error::NotFound)?;
        let inode = Inode::open(self.inode.fs(), entry.sector()).ok_or(Error::NotFound)?;

        entry.tombstone();
        self.inode.write_at(offset, entry.as_bytes())?;
        inode.remove();
        Ok(())
    }

    /// 目录是否为空：只看在用目录项
    pub fn is_empty(&self) -> bool {
        self.find(|e| e.is_in_use()).is_none()
    }

    /// 自当前游标起产出下一条在用目录项，墓碑跳过；读尽返回空
    pub fn read_next(&self) -> Option<vfs::DirEntry> {
        let len = self.inode.len();
        let mut entry = DirEntry::default();
        let mut offset = self.pos.get();

        while offset < len {
            assert_eq!(
                self.inode.read_at(offset, entry.as_bytes_mut()),
                DirEntry::SIZE
            );
            offset += DirEntry::SIZE;

            if entry.is_in_use() {
                self.pos.set(offset);
                let ty = match Inode::open(self.inode.fs(), entry.sector()) {
                    Some(child) if child.is_dir() => vfs::DirEntryType::Directory,
                    _ => vfs::DirEntryType::Regular,
                };
                return Some(vfs::DirEntry {
                    inode: u64::from(u32::from(entry.sector())),
                    ty,
                    name: String::from(entry.name()),
                });
            }
        }

        self.pos.set(offset);
        None
    }

    /// 找到指向 `sector` 的在用目录项的名字。
    /// `.` 解析与工作目录存活检查的基础。
    pub fn entry_name_of(&self, sector: SectorId) -> Option<String> {
        self.find(|e| e.is_in_use() && e.sector() == sector)
            .map(|(_, entry)| String::from(entry.name()))
    }

    /// 打开 `path` 的父目录：绝对路径从根出发，相对路径从工作目录出发，
    /// 逐分量下行。空分量（连续的 `/`）跳过。
    pub fn open_parent(
        fs: &Arc<TreeFileSystem>,
        wd: &WorkDir,
        path: &str,
    ) -> Result<Self, Error> {
        let (parent, _) = path.split_parent();
        let start = if path.is_absolute() {
            ROOT_DIR_SECTOR
        } else {
            wd.sector()
        };
        let start = Inode::open(fs, start).ok_or(Error::NotFound)?;
        let mut dir = Self::open(start).ok_or(Error::NotADirectory)?;

        for component in parent.split('/').filter(|c| !c.is_empty()) {
            if component.len() > NAME_MAX {
                return Err(Error::InvalidPath);
            }
            let next = dir.lookup(component).ok_or(Error::NotFound)?;
            dir = Self::open(next).ok_or(Error::NotADirectory)?;
        }
        Ok(dir)
    }

    /// 逐记录扫描，返回第一条满足谓词的 `(字节偏移, 记录)`
    fn find(&self, pred: impl Fn(&DirEntry) -> bool) -> Option<(usize, DirEntry)> {
        let len = self.inode.len();
        let mut entry = DirEntry::default();

        for offset in (0..len).step_by(DirEntry::SIZE) {
            assert_eq!(
                self.inode.read_at(offset, entry.as_bytes_mut()),
                DirEntry::SIZE
            );
            if pred(&entry) {
                return Some((offset, entry));
            }
        }
        None
    }
}
