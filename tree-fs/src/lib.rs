//! # tree-fs
//!
//! 扇区粒度的磁盘文件系统：把块设备上的一列定长扇区组织成
//! 层次化的文件与目录命名空间。
//!
//! 磁盘格式只保留两个知名扇区：[`FREE_MAP_SECTOR`] 上的 inode
//! 描述空闲位图文件，[`ROOT_DIR_SECTOR`] 上的 inode 描述根目录；
//! 其余扇区归属全部由位图裁决。

#![no_std]

extern crate alloc;

/* 整体架构，自上而下 */

// 编排层：挂载生命周期、路径级操作与失败回退
mod fs;

// 文件句柄层：inode 句柄加私有读写游标
mod file;

// 目录层：目录项的查找、增删与枚举，路径的逐分量下行
mod dir;

// 索引节点层：打开 inode 表与推迟删除
mod inode;

// 路径字符串的拆分
mod path;

// 空闲扇区分配器：位图，持久化为保留文件
pub mod free_map;

// 磁盘数据结构层
pub mod layout;

// 扇区缓存层：对块设备的操作都经过这里
mod sector;

pub use self::{
    dir::Dir,
    file::File,
    free_map::FreeMap,
    fs::{TreeFileSystem, WorkDir},
    inode::Inode,
    path::Path,
    sector::SectorId,
};

/// 扇区大小（字节），也是分配粒度
pub const SECTOR_SIZE: usize = 512;
/// 空闲位图文件的 inode 扇区
pub const FREE_MAP_SECTOR: SectorId = SectorId::new(0);
/// 根目录的 inode 扇区
pub const ROOT_DIR_SECTOR: SectorId = SectorId::new(1);
/// 目录项名字的最大长度
pub const NAME_MAX: usize = 23;
/// 路径的最大长度
pub const PATH_MAX: usize = 256;

pub(crate) type DataSector = [u8; SECTOR_SIZE];
