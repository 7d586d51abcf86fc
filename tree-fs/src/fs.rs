//! # 编排层
//!
//! 把块设备、扇区缓存、空闲位图、打开 inode 表装进一个显式的
//! 上下文对象 [`TreeFileSystem`]：挂载生命周期就是这个对象的
//! 生命周期，格式化/挂载之外不存在可用的文件系统。
//!
//! 路径级操作在这里把分配器、inode 层与目录层串起来，
//! 任何一步失败都按相反的次序退回已取得的资源，
//! 不留下孤立扇区，也不留下悬空目录项。

use alloc::sync::{Arc, Weak};
use alloc::vec;
use alloc::vec::Vec;

use block_dev::BlockDevice;
use log::{debug, info};
use spin::Mutex;
use vfs::Error;

use crate::dir::Dir;
use crate::file::File;
use crate::free_map::FreeMap;
use crate::inode::Inode;
use crate::layout::{DiskInode, DiskInodeKind};
use crate::path::Path as _;
use crate::sector::{CacheManager, SectorId};
use crate::{FREE_MAP_SECTOR, NAME_MAX, PATH_MAX, ROOT_DIR_SECTOR};

/// 某个执行上下文（任务/线程）的工作目录。
/// 由调用方独占持有，只被 [`TreeFileSystem::chdir`] 改写；
/// 相对路径以它为起点解析。
#[derive(Debug, Clone)]
pub struct WorkDir {
    sector: SectorId,
}

impl WorkDir {
    /// 启动时的工作目录：根目录
    pub const fn root() -> Self {
        Self {
            sector: ROOT_DIR_SECTOR,
        }
    }

    #[inline]
    pub fn sector(&self) -> SectorId {
        self.sector
    }
}

/// 一个已挂载的文件系统实例
pub struct TreeFileSystem {
    cache: CacheManager,
    free_map: Mutex<FreeMap>,
    /// 打开 inode 表：同一扇区共享一个内存 inode
    inodes: Mutex<Vec<(SectorId, Weak<Inode>)>>,
    /// 保留位图文件，挂载期间一直打开
    free_map_file: Mutex<Option<Arc<Inode>>>,
}

impl TreeFileSystem {
    /// 格式化并挂载：全新的位图与空的根目录。
    ///
    /// # Panics
    ///
    /// 设备装不下基本结构、或根目录建立失败时直接崩溃——
    /// 此时不存在可操作的文件系统。
    pub fn format(dev: Arc<dyn BlockDevice>) -> Arc<Self> {
        let sectors = dev.num_blocks();
        info!("formatting file system: {sectors} sectors");
        assert!(sectors >= 4, "device too small to format");

        let mut free_map = FreeMap::new(sectors);
        assert!(
            free_map.byte_len() <= DiskInode::MAX_LEN,
            "device too large: free map exceeds a single file"
        );
        free_map.mark(FREE_MAP_SECTOR);
        free_map.mark(ROOT_DIR_SECTOR);
        let free_map_len = free_map.byte_len() as u32;

        let fs = Arc::new(Self {
            cache: CacheManager::new(dev),
            free_map: Mutex::new(free_map),
            inodes: Mutex::new(Vec::new()),
            free_map_file: Mutex::new(None),
        });

        // 位图自己的文件：数据扇区经正常分配取得，对应的位随之置上
        Inode::create(
            &fs,
            FREE_MAP_SECTOR,
            free_map_len,
            DiskInodeKind::File,
            FREE_MAP_SECTOR,
        )
        .expect("free map file creation failed");
        Dir::create(&fs, ROOT_DIR_SECTOR, ROOT_DIR_SECTOR)
            .expect("root directory creation failed");

        let file = Inode::open(&fs, FREE_MAP_SECTOR).expect("free map file vanished after format");
        *fs.free_map_file.lock() = Some(file);
        fs.sync_free_map();
        fs
    }

    /// 挂载已格式化的设备，从保留文件读回位图。
    ///
    /// # Panics
    ///
    /// 设备上没有合法的位图 inode（不是本文件系统的格式）时崩溃。
    pub fn mount(dev: Arc<dyn BlockDevice>) -> Arc<Self> {
        let sectors = dev.num_blocks();
        info!("mounting file system: {sectors} sectors");

        let fs = Arc::new(Self {
            cache: CacheManager::new(dev),
            free_map: Mutex::new(FreeMap::new(sectors)),
            inodes: Mutex::new(Vec::new()),
            free_map_file: Mutex::new(None),
        });

        let file = Inode::open(&fs, FREE_MAP_SECTOR).expect("device is not formatted");
        let mut bytes = vec![0; file.len()];
        assert_eq!(file.read_at(0, &mut bytes), bytes.len(), "free map truncated");
        *fs.free_map.lock() = FreeMap::load(sectors, &bytes);
        *fs.free_map_file.lock() = Some(file);
        fs
    }

    /// 停机：位图写回、保留文件句柄释放、缓存落盘。幂等；
    /// 此后任何操作都不再有意义。
    pub fn close(&self) {
        self.sync_free_map();
        let file = self.free_map_file.lock().take();
        drop(file);
        self.cache.sync_all();
        debug!("file system closed");
    }

    /// 打开 `path` 指向的文件或目录
    pub fn open(self: &Arc<Self>, wd: &WorkDir, path: &str) -> Result<File, Error> {
        if path.is_empty() || path.len() > PATH_MAX {
            return Err(Error::InvalidPath);
        }
        if path == "." {
            return self.open_dot(wd);
        }

        let parent = Dir::open_parent(self, wd, path)?;
        let leaf = path.file_name();
        let inode = if leaf.is_empty() {
            // 叶子为空（`/` 或 `a/b/`）：打开父目录自身
            parent.inode().clone()
        } else if leaf.len() > NAME_MAX {
            return Err(Error::InvalidPath);
        } else {
            parent.lookup(leaf).ok_or(Error::NotFound)?
        };
        Ok(File::open(inode))
    }

    /// 建立普通文件，初始大小 `size` 字节
    pub fn create(self: &Arc<Self>, wd: &WorkDir, path: &str, size: usize) -> Result<(), Error> {
        self.create_entry(wd, path, size, DiskInodeKind::File)
    }

    /// 建立子目录
    pub fn mkdir(self: &Arc<Self>, wd: &WorkDir, path: &str) -> Result<(), Error> {
        self.create_entry(wd, path, 0, DiskInodeKind::Directory)
    }

    /// 删除 `path` 指向的文件或目录。
    /// 目录须为空才可删除；目录项墓碑化，物理回收推迟到最后一个句柄。
    pub fn remove(self: &Arc<Self>, wd: &WorkDir, path: &str) -> Result<(), Error> {
        if path.is_empty() || path.len() > PATH_MAX {
            return Err(Error::InvalidPath);
        }
        let leaf = path.file_name();
        if leaf.is_empty() || leaf.len() > NAME_MAX {
            return Err(Error::InvalidPath);
        }

        let parent = Dir::open_parent(self, wd, path)?;
        let target = parent.lookup(leaf).ok_or(Error::NotFound)?;
        if target.is_dir() {
            let dir = Dir::open(target.clone()).ok_or(Error::NotADirectory)?;
            if !dir.is_empty() {
                return Err(Error::DirectoryNotEmpty);
            }
        }
        drop(target);
        parent.remove(leaf)
    }

    /// 改变工作目录；目标必须是目录。
    /// 叶子为空（如 `/`）时切到父目录自身。
    pub fn chdir(self: &Arc<Self>, wd: &mut WorkDir, path: &str) -> Result<(), Error> {
        if path.is_empty() || path.len() > PATH_MAX {
            return Err(Error::InvalidPath);
        }

        let parent = Dir::open_parent(self, wd, path)?;
        let leaf = path.file_name();
        let target = if leaf.is_empty() {
            parent.inode().clone()
        } else if leaf.len() > NAME_MAX {
            return Err(Error::InvalidPath);
        } else {
            parent.lookup(leaf).ok_or(Error::NotFound)?
        };
        if !target.is_dir() {
            return Err(Error::NotADirectory);
        }
        wd.sector = target.inumber();
        Ok(())
    }

    /// 枚举目录项。游标存放在文件句柄的读写位置上，跨调用续读；
    /// 墓碑不产出，读尽返回 `None`。
    pub fn readdir(&self, file: &mut File) -> Result<Option<vfs::DirEntry>, Error> {
        if !file.is_dir() {
            return Err(Error::NotADirectory);
        }
        let dir = Dir::open(file.inode().clone()).ok_or(Error::NotADirectory)?;
        dir.set_pos(file.tell());
        let entry = dir.read_next();
        file.seek(dir.pos());
        Ok(entry)
    }

    /// 当前空闲扇区数
    pub fn free_sectors(&self) -> usize {
        self.free_map.lock().free_sectors()
    }
}

impl TreeFileSystem {
    /// create 与 mkdir 的公共路径，按 `kind` 区分
    fn create_entry(
        self: &Arc<Self>,
        wd: &WorkDir,
        path: &str,
        size: usize,
        kind: DiskInodeKind,
    ) -> Result<(), Error> {
        if path.is_empty() || path.len() > PATH_MAX {
            return Err(Error::InvalidPath);
        }
        self.check_work_dir(wd)?;

        let leaf = path.file_name();
        if leaf.is_empty() || leaf.len() > NAME_MAX {
            return Err(Error::InvalidPath);
        }
        let size = u32::try_from(size).map_err(|_| Error::NoSpace)?;
        let parent = Dir::open_parent(self, wd, path)?;

        let sector = self.free_map.lock().allocate_one().ok_or(Error::NoSpace)?;
        let created = match kind {
            DiskInodeKind::Directory => Dir::create(self, sector, parent.inumber()),
            DiskInodeKind::File => Inode::create(self, sector, size, kind, parent.inumber()),
        };
        if let Err(err) = created {
            self.free_map.lock().release(sector, 1);
            return Err(err);
        }

        if let Err(err) = parent.add(leaf, sector) {
            debug!("create rollback: entry insertion failed for {path:?}");
            // 有序退回：inode 标记删除，句柄落下时把数据扇区与
            // inode 扇区一并归还位图
            let inode = Inode::open(self, sector).expect("fresh inode must open");
            inode.remove();
            drop(inode);
            return Err(err);
        }
        Ok(())
    }

    /// `.`：在工作目录的父目录里找到指向自己的那条目录项，
    /// 再按正常查找重新打开。根目录是自己的父目录，直接重开自身。
    fn open_dot(self: &Arc<Self>, wd: &WorkDir) -> Result<File, Error> {
        let cwd = wd.sector();
        if cwd == ROOT_DIR_SECTOR {
            let root = Inode::open(self, ROOT_DIR_SECTOR).ok_or(Error::NotFound)?;
            return Ok(File::open(root));
        }

        let current = Inode::open(self, cwd).ok_or(Error::NotFound)?;
        let parent = Inode::open(self, current.parent()).ok_or(Error::NotFound)?;
        let parent = Dir::open(parent).ok_or(Error::NotADirectory)?;
        let name = parent.entry_name_of(cwd).ok_or(Error::NotFound)?;
        let inode = parent.lookup(&name).ok_or(Error::NotFound)?;
        Ok(File::open(inode))
    }

    /// 工作目录必须仍是其父目录中的在用目录项（根目录除外），
    /// 防止在已被并发删除的目录下建立新项
    fn check_work_dir(self: &Arc<Self>, wd: &WorkDir) -> Result<(), Error> {
        let cwd = wd.sector();
        if cwd == ROOT_DIR_SECTOR {
            return Ok(());
        }

        let current = Inode::open(self, cwd).ok_or(Error::StaleWorkDir)?;
        let parent = Inode::open(self, current.parent()).ok_or(Error::StaleWorkDir)?;
        let parent = Dir::open(parent).ok_or(Error::StaleWorkDir)?;
        if parent.entry_name_of(cwd).is_none() {
            return Err(Error::StaleWorkDir);
        }
        Ok(())
    }

    /// 把内存位图写回保留文件
    fn sync_free_map(&self) {
        let file = self.free_map_file.lock();
        if let Some(file) = file.as_ref() {
            let bytes = self.free_map.lock().to_bytes();
            file.write_at(0, &bytes).expect("free map write-back failed");
        }
    }

    #[inline]
    pub(crate) fn cache(&self) -> &CacheManager {
        &self.cache
    }

    #[inline]
    pub(crate) fn free_map(&self) -> &Mutex<FreeMap> {
        &self.free_map
    }

    #[inline]
    pub(crate) fn inodes(&self) -> &Mutex<Vec<(SectorId, Weak<Inode>)>> {
        &self.inodes
    }
}

impl Drop for TreeFileSystem {
    fn drop(&mut self) {
        // close() 的兜底：至少把缓存落盘
        self.cache.sync_all();
    }
}
