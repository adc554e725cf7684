//! 内存块设备
//!
//! 稀疏存储、支持多设备号的 [`BlockDevice`] 实现，带读写计数和故障注入，
//! 用于测试以及不需要真实磁盘的嵌入场景。未写过的块读出为全零。

use super::BlockDevice;
use crate::consts::BLOCK_SIZE;
use crate::error::{Error, ErrorKind, Result};
use crate::types::{BlockNo, DeviceId};
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use spin::Mutex;

/// 内存块设备
pub struct RamDisk {
    /// 每个设备的块数
    num_blocks: u32,
    /// (设备号, 块号) -> 块数据
    blocks: Mutex<BTreeMap<(DeviceId, BlockNo), Box<[u8; BLOCK_SIZE]>>>,
    /// 物理读取次数
    reads: AtomicU64,
    /// 物理写入次数
    writes: AtomicU64,
    /// 为 true 时所有读写返回 I/O 错误
    faulty: AtomicBool,
}

impl RamDisk {
    /// 创建内存块设备，每个设备号有 `num_blocks` 个块
    pub fn new(num_blocks: u32) -> Self {
        Self {
            num_blocks,
            blocks: Mutex::new(BTreeMap::new()),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            faulty: AtomicBool::new(false),
        }
    }

    /// 每个设备的块数
    pub fn num_blocks(&self) -> u32 {
        self.num_blocks
    }

    /// 物理读取次数
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// 物理写入次数
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// 注入或清除故障
    pub fn set_faulty(&self, faulty: bool) {
        self.faulty.store(faulty, Ordering::SeqCst);
    }

    /// 绕过计数直接查看块内容（测试用）
    pub fn peek(&self, dev: DeviceId, block_no: BlockNo) -> [u8; BLOCK_SIZE] {
        match self.blocks.lock().get(&(dev, block_no)) {
            Some(data) => **data,
            None => [0u8; BLOCK_SIZE],
        }
    }

    /// 绕过计数直接写入块内容（测试用）
    pub fn poke(&self, dev: DeviceId, block_no: BlockNo, data: &[u8; BLOCK_SIZE]) {
        self.blocks.lock().insert((dev, block_no), Box::new(*data));
    }

    fn check(&self, block_no: BlockNo) -> Result<()> {
        if self.faulty.load(Ordering::SeqCst) {
            return Err(Error::new(ErrorKind::Io, "injected device fault"));
        }
        if block_no >= self.num_blocks {
            return Err(Error::new(ErrorKind::InvalidInput, "block number out of range"));
        }
        Ok(())
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&self, dev: DeviceId, block_no: BlockNo, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        self.check(block_no)?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        match self.blocks.lock().get(&(dev, block_no)) {
            Some(data) => buf.copy_from_slice(&data[..]),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_block(&self, dev: DeviceId, block_no: BlockNo, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
        self.check(block_no)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.blocks.lock().insert((dev, block_no), Box::new(*buf));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwritten_block_reads_zero() {
        let disk = RamDisk::new(16);
        let mut buf = [0xAAu8; BLOCK_SIZE];
        disk.read_block(0, 3, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
        assert_eq!(disk.read_count(), 1);
    }

    #[test]
    fn test_devices_are_separate() {
        let disk = RamDisk::new(16);
        let mut data = [0u8; BLOCK_SIZE];
        data[0] = 0x42;
        disk.write_block(1, 7, &data).unwrap();

        assert_eq!(disk.peek(1, 7)[0], 0x42);
        assert_eq!(disk.peek(0, 7)[0], 0);
        assert_eq!(disk.write_count(), 1);
    }

    #[test]
    fn test_out_of_range() {
        let disk = RamDisk::new(4);
        let mut buf = [0u8; BLOCK_SIZE];
        let err = disk.read_block(0, 4, &mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(disk.read_count(), 0);
    }

    #[test]
    fn test_fault_injection() {
        let disk = RamDisk::new(4);
        let mut buf = [0u8; BLOCK_SIZE];

        disk.set_faulty(true);
        assert_eq!(disk.read_block(0, 0, &mut buf).unwrap_err().kind(), ErrorKind::Io);
        assert_eq!(disk.write_block(0, 0, &buf).unwrap_err().kind(), ErrorKind::Io);

        disk.set_faulty(false);
        assert!(disk.read_block(0, 0, &mut buf).is_ok());
    }
}
