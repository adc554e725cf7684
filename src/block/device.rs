//! 块设备接口

use crate::consts::BLOCK_SIZE;
use crate::error::Result;
use crate::types::{BlockNo, DeviceId};
use alloc::sync::Arc;

/// 块设备接口
///
/// 实现此 trait 以提供底层块设备访问。缓存在每次未命中时调用一次 `read_block`，
/// 在每次显式写回时调用一次 `write_block`；对同一缓存块同一时刻至多有一个未完成的调用
/// （由该缓存块的独占锁串行化）。
///
/// 两个方法都是同步的。返回的错误会原样传递给缓存的调用者，缓存本身不重试。
///
/// # 示例
///
/// ```rust,ignore
/// use bcache_core::{BlockDevice, BlockNo, DeviceId, Result, BLOCK_SIZE};
///
/// struct MyDisk {
///     // ...
/// }
///
/// impl BlockDevice for MyDisk {
///     fn read_block(&self, dev: DeviceId, block_no: BlockNo, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
///         // 发起 virtio 请求并等待完成
///         Ok(())
///     }
///
///     fn write_block(&self, dev: DeviceId, block_no: BlockNo, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait BlockDevice: Send + Sync {
    /// 读取一个块到 `buf`
    fn read_block(&self, dev: DeviceId, block_no: BlockNo, buf: &mut [u8; BLOCK_SIZE]) -> Result<()>;

    /// 将 `buf` 写入一个块
    fn write_block(&self, dev: DeviceId, block_no: BlockNo, buf: &[u8; BLOCK_SIZE]) -> Result<()>;
}

impl<D: BlockDevice + ?Sized> BlockDevice for Arc<D> {
    #[inline]
    fn read_block(&self, dev: DeviceId, block_no: BlockNo, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        (**self).read_block(dev, block_no, buf)
    }

    #[inline]
    fn write_block(&self, dev: DeviceId, block_no: BlockNo, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
        (**self).write_block(dev, block_no, buf)
    }
}

impl<D: BlockDevice + ?Sized> BlockDevice for &D {
    #[inline]
    fn read_block(&self, dev: DeviceId, block_no: BlockNo, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        (**self).read_block(dev, block_no, buf)
    }

    #[inline]
    fn write_block(&self, dev: DeviceId, block_no: BlockNo, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
        (**self).write_block(dev, block_no, buf)
    }
}
