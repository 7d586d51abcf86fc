//! # 扇区缓存层
//!
//! 块设备读写速度一般慢于内存读写速度，因此在内存中开辟缓冲区，
//! 把即将操作的扇区复制进来；对块设备的操作都经过缓存层，
//! 且**操作扇区时一定在缓冲区当中**。
//!
//! 缓存管理器不是全局的：每个已挂载的文件系统持有自己的一份，
//! 多个实例互不相扰。

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::mem;
use core::ptr;

use block_dev::BlockDevice;
use derive_more::{Add, From, Into};
use spin::Mutex;

use crate::SECTOR_SIZE;

/// 扇区编号，即块设备上的块ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Add, From, Into)]
#[repr(transparent)]
pub struct SectorId(u32);

impl SectorId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// 作为索引使用
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// 扇区缓存的调度与共享，归属于单个文件系统实例
pub(crate) struct CacheManager {
    /// 底层块设备的引用
    dev: Arc<dyn BlockDevice>,
    queue: Mutex<Vec<(SectorId, Arc<Mutex<SectorCache>>)>>,
}

/// 内存中的扇区
pub(crate) struct SectorCache {
    /// 缓存的数据
    data: [u8; SECTOR_SIZE],
    /// 对应的扇区
    id: SectorId,
    /// 底层块设备的引用
    dev: Arc<dyn BlockDevice>,
    /// 是否为脏块
    modified: bool,
}

impl CacheManager {
    /// 扇区缓存个数的上限
    const CAPACITY: usize = 16;

    pub fn new(dev: Arc<dyn BlockDevice>) -> Self {
        Self {
            dev,
            queue: Mutex::new(Vec::new()),
        }
    }

    // 缓存调度策略：踢走闲置扇区
    pub fn get(&self, id: SectorId) -> Arc<Mutex<SectorCache>> {
        let mut queue = self.queue.lock();

        // 尝试从缓冲区中读取扇区
        if let Some(cache) = queue
            .iter()
            .find_map(|(sid, cache)| (id == *sid).then_some(cache))
        {
            return Arc::clone(cache);
        }

        // 触及上限，写回一个扇区
        if queue.len() == Self::CAPACITY {
            let index = queue
                .iter()
                .position(|(_, cache)| Arc::strong_count(cache) == 1) // 没有其它引用的才能写回
                .expect("run out of sector cache");
            queue.remove(index);
        }

        // 缓存新扇区
        let cache = Arc::new(Mutex::new(SectorCache::new(id, self.dev.clone())));
        queue.push((id, cache.clone()));

        cache
    }

    pub fn sync_all(&self) {
        self.queue
            .lock()
            .iter()
            .for_each(|(_, cache)| cache.lock().sync());
    }
}

impl SectorCache {
    fn new(id: SectorId, dev: Arc<dyn BlockDevice>) -> Self {
        let mut data = [0; SECTOR_SIZE];
        dev.read_block(id.index(), &mut data);

        Self {
            data,
            id,
            dev,
            modified: false,
        }
    }

    pub fn sync(&mut self) {
        if self.modified {
            self.modified = false;
            self.dev.write_block(self.id.index(), &self.data);
        }
    }

    pub fn get<T: Sized>(&self, offset: usize) -> &T {
        let type_size = mem::size_of::<T>();
        assert!(type_size + offset <= SECTOR_SIZE);
        let addr = ptr::from_ref(&self.data[offset]).cast();
        unsafe { &*addr }
    }

    pub fn get_mut<T: Sized>(&mut self, offset: usize) -> &mut T {
        let type_size = mem::size_of::<T>();
        assert!(type_size + offset <= SECTOR_SIZE);
        self.modified = true;
        let addr = ptr::from_mut(&mut self.data[offset]).cast();
        unsafe { &mut *addr }
    }

    #[inline]
    pub fn map<T: Sized, V>(&self, offset: usize, f: impl FnOnce(&T) -> V) -> V {
        f(self.get(offset))
    }

    #[inline]
    pub fn map_mut<T: Sized, V>(&mut self, offset: usize, f: impl FnOnce(&mut T) -> V) -> V {
        f(self.get_mut(offset))
    }

    #[inline]
    pub fn zeroize(&mut self) {
        self.data.fill(0);
        self.modified = true;
    }
}

impl Drop for SectorCache {
    fn drop(&mut self) {
        self.sync();
    }
}
