//! # 磁盘数据结构层
//!
//! 表示磁盘上文件系统的数据结构：inode 与目录项记录。

mod dir_entry;
mod inode;

pub use self::{
    dir_entry::DirEntry,
    inode::{DiskInode, DiskInodeKind},
};
