#[cfg(test)]
mod tests;

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Mutex;

use block_dev::BlockDevice;
use tree_fs::SECTOR_SIZE;

/// 以主机上的一个普通文件模拟块设备
pub struct BlockFile(pub Mutex<File>);

impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) {
        let mut file = self.0.lock().unwrap();
        file.seek(SeekFrom::Start((block_id * SECTOR_SIZE) as u64))
            .expect("seeking error");
        assert_eq!(file.read(buf).unwrap(), SECTOR_SIZE, "not a complete sector!");
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) {
        let mut file = self.0.lock().unwrap();
        file.seek(SeekFrom::Start((block_id * SECTOR_SIZE) as u64))
            .expect("seeking error");
        assert_eq!(
            file.write(buf).unwrap(),
            SECTOR_SIZE,
            "not a complete sector!"
        );
    }

    fn num_blocks(&self) -> usize {
        let file = self.0.lock().unwrap();
        file.metadata().unwrap().len() as usize / SECTOR_SIZE
    }
}
