//! 缓存块句柄 - RAII 风格的块访问
//!
//! [`Buf`] 是调用者对一个缓存块的引用：
//! - 由 [`BlockCache::get`] / [`BlockCache::read`] 返回，创建时已持有独占锁并计入引用计数
//! - 持有期间缓存块身份不会改变（引用计数 >= 1 的缓存块不会被回收）
//! - 可以暂时放开独占锁（[`Buf::unlock`]）而保留引用，之后用 [`Buf::lock`] 重新获取
//! - [`Buf::release`] 显式释放；未释放就丢弃时由 `Drop` 释放
//!
//! # 示例
//!
//! ```rust,ignore
//! let buf = cache.read(0, 5)?;
//! buf.with_data(|data| {
//!     println!("First byte: {:02x}", data[0]);
//! })?;
//!
//! let mut buf = cache.read(0, 6)?;
//! buf.with_data_mut(|data| data[0] = 0x42)?;
//! buf.write_back()?;
//! buf.release()?;
//! ```

use super::block_cache::BlockCache;
use super::buffer::CacheFlags;
use crate::block::BlockDevice;
use crate::consts::BLOCK_SIZE;
use crate::error::{Error, ErrorKind, Result};
use crate::types::{BlockNo, BufferId, DeviceId};
use spin::MutexGuard;

/// 缓存块句柄
pub struct Buf<'a, D: BlockDevice> {
    pub(super) cache: &'a BlockCache<D>,
    pub(super) id: BufferId,
    pub(super) dev: DeviceId,
    pub(super) block_no: BlockNo,
    /// 独占锁守卫，`None` 表示当前未持有独占锁
    pub(super) guard: Option<MutexGuard<'a, [u8; BLOCK_SIZE]>>,
    /// 引用是否已经归还
    pub(super) released: bool,
}

impl<'a, D: BlockDevice> Buf<'a, D> {
    pub(super) fn new(
        cache: &'a BlockCache<D>,
        id: BufferId,
        dev: DeviceId,
        block_no: BlockNo,
        guard: MutexGuard<'a, [u8; BLOCK_SIZE]>,
    ) -> Self {
        Self {
            cache,
            id,
            dev,
            block_no,
            guard: Some(guard),
            released: false,
        }
    }

    /// 设备号
    pub fn dev(&self) -> DeviceId {
        self.dev
    }

    /// 块号
    pub fn block_no(&self) -> BlockNo {
        self.block_no
    }

    /// 缓存块在缓存池中的下标
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// 是否持有独占锁
    pub fn is_locked(&self) -> bool {
        self.guard.is_some()
    }

    /// 数据是否已从设备读入
    pub fn is_valid(&self) -> bool {
        self.cache.slot(self.id).with_meta(|m| m.is_valid())
    }

    /// 数据是否被修改且尚未写回
    pub fn is_dirty(&self) -> bool {
        self.cache
            .slot(self.id)
            .with_meta(|m| m.flags.contains(CacheFlags::DIRTY))
    }

    /// 只读访问块数据
    pub fn with_data<R>(&self, f: impl FnOnce(&[u8; BLOCK_SIZE]) -> R) -> Result<R> {
        let data = self.guard.as_ref().ok_or_else(|| lock_not_held("with_data"))?;
        Ok(f(&**data))
    }

    /// 修改块数据，并标记为脏
    pub fn with_data_mut<R>(&mut self, f: impl FnOnce(&mut [u8; BLOCK_SIZE]) -> R) -> Result<R> {
        let data = self
            .guard
            .as_mut()
            .ok_or_else(|| lock_not_held("with_data_mut"))?;
        let ret = f(&mut **data);
        self.cache
            .slot(self.id)
            .with_meta(|m| m.flags.insert(CacheFlags::DIRTY));
        Ok(ret)
    }

    /// 放开独占锁，保留引用
    ///
    /// 引用计数不变，缓存块不会被回收；其他等待者此时可以获取独占锁。
    pub fn unlock(&mut self) {
        self.guard = None;
    }

    /// 重新获取独占锁（可能阻塞）
    pub fn lock(&mut self) {
        if self.guard.is_none() {
            self.guard = Some(self.cache.slot(self.id).data.lock());
        }
    }

    /// 写回设备，见 [`BlockCache::write_back`]
    pub fn write_back(&self) -> Result<()> {
        self.cache.write_back(self)
    }

    /// 增加一个 pin，见 [`BlockCache::pin`]
    pub fn pin(&self) -> Result<()> {
        self.cache.pin(self)
    }

    /// 去掉一个 pin，见 [`BlockCache::unpin`]
    pub fn unpin(&self) -> Result<()> {
        self.cache.unpin(self)
    }

    /// 释放句柄
    ///
    /// 要求持有独占锁，否则返回 [`ErrorKind::LockNotHeld`]。无论成功与否，句柄都被消费，
    /// 它占有的引用都会归还。
    pub fn release(mut self) -> Result<()> {
        if self.guard.is_none() {
            log::error!(
                "[BCACHE] brelse dev={} block={}: exclusive lock not held",
                self.dev,
                self.block_no
            );
            return Err(lock_not_held("brelse"));
        }
        self.put();
        Ok(())
    }

    /// 先放开独占锁，再归还引用
    fn put(&mut self) {
        if self.released {
            return;
        }
        self.guard = None;
        self.released = true;
        self.cache.put_ref(self.id, self.block_no);
    }
}

impl<D: BlockDevice> Drop for Buf<'_, D> {
    fn drop(&mut self) {
        self.put();
    }
}

impl<D: BlockDevice> core::fmt::Debug for Buf<'_, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Buf")
            .field("id", &self.id)
            .field("dev", &self.dev)
            .field("block_no", &self.block_no)
            .field("locked", &self.is_locked())
            .finish()
    }
}

pub(super) fn lock_not_held(message: &'static str) -> Error {
    Error::new(ErrorKind::LockNotHeld, message)
}
