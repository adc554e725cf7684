//! 块缓存实现
//!
//! # 结构
//!
//! ```text
//! struct BlockCache {
//!     device: D,                        // 外部块设备
//!     bufs: Box<[Buffer]>,              // 固定大小的缓存池，终生不重新分配
//!     buckets: Box<[Mutex<Bucket>]>,    // 按 block_no % buckets 分片的查找索引
//!     pool: Mutex<()>,                  // 只用于串行化“寻找空闲缓存块”这一步
//!     stats: StatCounters,
//! }
//! ```
//!
//! # 锁顺序
//!
//! 桶锁 → 池锁 → 缓存块元数据锁。
//!
//! - 不存在同时持有两个桶锁的路径
//! - 池锁只能通过 `claim_free` 获取，它要求调用者出示一个桶锁守卫
//! - 元数据锁是叶子锁
//! - 持有桶锁时从不等待独占锁；命中路径先放开桶锁再阻塞在独占锁上
//! - 设备 I/O 期间只持有独占锁
//!
//! # 回收策略
//!
//! 最后一个持有者释放时缓存块立即从桶中摘除并变为空闲，数据和 VALID 标志虽然留在槽位里，
//! 但之后的查找不会再命中它。缓存在这里主要是“使用期间的协调点”，不保证为将来的读取保留数据。

use super::bucket::Bucket;
use super::buffer::{Buffer, CacheFlags};
use super::handle::{lock_not_held, Buf};
use crate::block::BlockDevice;
use crate::error::{Error, ErrorKind, Result};
use crate::types::{BlockNo, BufferId, CacheConfig, DeviceId};
use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};
use spin::{Mutex, MutexGuard};

/// 缓存统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// 缓存命中次数
    pub hits: u64,
    /// 缓存未命中次数
    pub misses: u64,
    /// 设备读取次数
    pub device_reads: u64,
    /// 设备写入次数
    pub device_writes: u64,
    /// 最后一次释放导致的摘除次数
    pub evictions: u64,
}

impl CacheStats {
    /// 总访问次数
    pub fn total_accesses(&self) -> u64 {
        self.hits + self.misses
    }

    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_accesses();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct StatCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    device_reads: AtomicU64,
    device_writes: AtomicU64,
    evictions: AtomicU64,
}

impl StatCounters {
    #[inline]
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            device_reads: self.device_reads.load(Ordering::Relaxed),
            device_writes: self.device_writes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// 块缓存
///
/// 在多个线程之间以 `&BlockCache` 共享。对同一个块的并发调用者通过缓存块的独占锁串行化；
/// 不同块的查找只在各自的桶锁上竞争。
pub struct BlockCache<D: BlockDevice> {
    device: D,
    bufs: Box<[Buffer]>,
    buckets: Box<[Mutex<Bucket>]>,
    pool: Mutex<()>,
    stats: StatCounters,
}

impl<D: BlockDevice> BlockCache<D> {
    /// 使用默认配置创建块缓存
    pub fn new(device: D) -> Self {
        Self::build(device, CacheConfig::default())
    }

    /// 使用指定配置创建块缓存
    ///
    /// # 示例
    ///
    /// ```rust,ignore
    /// let cache = BlockCache::with_config(disk, CacheConfig::new(64, 31))?;
    /// ```
    pub fn with_config(device: D, config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(device, config))
    }

    fn build(device: D, config: CacheConfig) -> Self {
        let bufs: Vec<Buffer> = (0..config.capacity).map(|_| Buffer::new()).collect();
        let buckets: Vec<Mutex<Bucket>> =
            (0..config.buckets).map(|_| Mutex::new(Bucket::new())).collect();

        log::debug!(
            "[BCACHE] init capacity={} buckets={}",
            config.capacity,
            config.buckets
        );

        Self {
            device,
            bufs: bufs.into_boxed_slice(),
            buckets: buckets.into_boxed_slice(),
            pool: Mutex::new(()),
            stats: StatCounters::default(),
        }
    }

    /// 缓存池容量
    pub fn capacity(&self) -> usize {
        self.bufs.len()
    }

    /// 哈希桶数量
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// 底层块设备
    pub fn device(&self) -> &D {
        &self.device
    }

    /// 统计信息快照
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    pub(super) fn slot(&self, id: BufferId) -> &Buffer {
        &self.bufs[id]
    }

    #[inline]
    fn bucket_index(&self, block_no: BlockNo) -> usize {
        block_no as usize % self.buckets.len()
    }

    #[inline]
    fn bucket(&self, block_no: BlockNo) -> &Mutex<Bucket> {
        &self.buckets[self.bucket_index(block_no)]
    }

    /// 获取 (dev, block_no) 对应的缓存块，不读设备
    ///
    /// 返回的句柄持有独占锁并计入引用计数。数据可能尚未有效，见 [`Buf::is_valid`]。
    ///
    /// # 错误
    ///
    /// 缓存池中没有空闲缓存块时返回 [`ErrorKind::PoolExhausted`]。
    pub fn get(&self, dev: DeviceId, block_no: BlockNo) -> Result<Buf<'_, D>> {
        let mut bucket = self.bucket(block_no).lock();

        // 已经缓存？
        if let Some(id) = bucket.find(&self.bufs, dev, block_no) {
            self.bufs[id].with_meta(|m| m.refcnt += 1);
            drop(bucket);
            StatCounters::bump(&self.stats.hits);
            log::trace!("[BCACHE] get dev={} block={} HIT buf={}", dev, block_no, id);
            return Ok(Buf::new(self, id, dev, block_no, self.bufs[id].data.lock()));
        }

        // 未缓存，回收一个空闲缓存块
        let id = self.claim_free(&bucket)?;
        self.bufs[id].with_meta(|m| m.rebind(dev, block_no));
        bucket.push_front(&self.bufs, id);
        drop(bucket);

        StatCounters::bump(&self.stats.misses);
        log::debug!("[BCACHE] get dev={} block={} MISS buf={}", dev, block_no, id);
        Ok(Buf::new(self, id, dev, block_no, self.bufs[id].data.lock()))
    }

    /// 在池锁下线性扫描，占用第一个空闲缓存块（引用计数置 1）
    ///
    /// `_bucket` 是调用者已持有的桶锁，池锁因此总在桶锁之后获取。
    fn claim_free(&self, _bucket: &MutexGuard<'_, Bucket>) -> Result<BufferId> {
        let _pool = self.pool.lock();
        for (id, buf) in self.bufs.iter().enumerate() {
            let claimed = buf.with_meta(|m| {
                if m.is_free() {
                    m.refcnt = 1;
                    true
                } else {
                    false
                }
            });
            if claimed {
                return Ok(id);
            }
        }

        log::error!(
            "[BCACHE] no free buffers: all {} buffers are referenced",
            self.bufs.len()
        );
        Err(Error::new(ErrorKind::PoolExhausted, "bget: no buffers"))
    }

    /// 读取块
    ///
    /// 如果缓存块数据无效，调用一次设备读取填充它。并发请求同一块的调用者阻塞在独占锁上，
    /// 不会重复读设备。
    ///
    /// 设备错误原样返回；句柄随之释放，数据保持无效，下一次读取会重新访问设备。
    pub fn read(&self, dev: DeviceId, block_no: BlockNo) -> Result<Buf<'_, D>> {
        let mut buf = self.get(dev, block_no)?;
        if !buf.is_valid() {
            self.fill(&mut buf)?;
        }
        Ok(buf)
    }

    fn fill(&self, buf: &mut Buf<'_, D>) -> Result<()> {
        let data = buf.guard.as_mut().ok_or_else(|| lock_not_held("bread"))?;
        StatCounters::bump(&self.stats.device_reads);
        log::debug!("[BCACHE] device read dev={} block={}", buf.dev, buf.block_no);
        if let Err(e) = self.device.read_block(buf.dev, buf.block_no, &mut **data) {
            log::warn!(
                "[BCACHE] device read dev={} block={} failed: {}",
                buf.dev,
                buf.block_no,
                e
            );
            return Err(e);
        }
        self.bufs[buf.id].with_meta(|m| m.flags.insert(CacheFlags::VALID));
        Ok(())
    }

    /// 将缓存块数据写回设备
    ///
    /// 要求句柄持有独占锁，否则返回 [`ErrorKind::LockNotHeld`]。
    pub fn write_back(&self, buf: &Buf<'_, D>) -> Result<()> {
        self.check_owner(buf)?;
        let data = match buf.guard.as_ref() {
            Some(data) => data,
            None => {
                log::error!(
                    "[BCACHE] bwrite dev={} block={}: exclusive lock not held",
                    buf.dev,
                    buf.block_no
                );
                return Err(lock_not_held("bwrite"));
            }
        };

        StatCounters::bump(&self.stats.device_writes);
        log::debug!("[BCACHE] device write dev={} block={}", buf.dev, buf.block_no);
        if let Err(e) = self.device.write_block(buf.dev, buf.block_no, &**data) {
            log::warn!(
                "[BCACHE] device write dev={} block={} failed: {}",
                buf.dev,
                buf.block_no,
                e
            );
            return Err(e);
        }
        self.bufs[buf.id].with_meta(|m| m.flags.remove(CacheFlags::DIRTY));
        Ok(())
    }

    /// 释放句柄，见 [`Buf::release`]
    pub fn release(&self, buf: Buf<'_, D>) -> Result<()> {
        self.check_owner(&buf)?;
        buf.release()
    }

    /// 归还一个引用；最后一个引用归还时把缓存块从桶中摘除
    ///
    /// 调用前独占锁已经放开。
    pub(super) fn put_ref(&self, id: BufferId, block_no: BlockNo) {
        let mut bucket = self.bucket(block_no).lock();
        let last = self.bufs[id].with_meta(|m| {
            debug_assert!(m.refcnt >= 1);
            if m.refcnt > 1 {
                m.refcnt -= 1;
                false
            } else {
                true
            }
        });

        if last {
            bucket.remove(&self.bufs, id);
            // 置 0 必须在摘除之后，否则池扫描可能提前占用它
            self.bufs[id].with_meta(|m| m.refcnt = 0);
            StatCounters::bump(&self.stats.evictions);
            log::trace!("[BCACHE] release block={} buf={} evicted", block_no, id);
        } else {
            log::trace!("[BCACHE] release block={} buf={}", block_no, id);
        }
    }

    /// 增加一个 pin，不要求持有独占锁
    ///
    /// pin 计入引用计数，使缓存块在句柄释放后仍留在索引中，直到对应的 [`unpin`](Self::unpin)。
    pub fn pin(&self, buf: &Buf<'_, D>) -> Result<()> {
        self.check_owner(buf)?;
        let _bucket = self.bucket(buf.block_no).lock();
        let refcnt = self.bufs[buf.id].with_meta(|m| {
            m.refcnt += 1;
            m.pins += 1;
            m.refcnt
        });
        log::debug!("[BCACHE] pin block={} refcnt={}", buf.block_no, refcnt);
        Ok(())
    }

    /// 去掉一个 pin，不要求持有独占锁
    ///
    /// 只减少引用计数，从不摘除缓存块；摘除只发生在释放路径上。
    /// 没有对应的 pin 时返回 [`ErrorKind::InvalidState`]。
    pub fn unpin(&self, buf: &Buf<'_, D>) -> Result<()> {
        self.check_owner(buf)?;
        let _bucket = self.bucket(buf.block_no).lock();
        let refcnt = self.bufs[buf.id].with_meta(|m| {
            if m.pins == 0 {
                return None;
            }
            m.pins -= 1;
            m.refcnt -= 1;
            Some(m.refcnt)
        });

        match refcnt {
            Some(refcnt) => {
                log::debug!("[BCACHE] unpin block={} refcnt={}", buf.block_no, refcnt);
                Ok(())
            }
            None => {
                log::error!("[BCACHE] unpin block={}: not pinned", buf.block_no);
                Err(Error::new(ErrorKind::InvalidState, "unpin without matching pin"))
            }
        }
    }

    fn check_owner(&self, buf: &Buf<'_, D>) -> Result<()> {
        if core::ptr::eq(buf.cache, self) {
            Ok(())
        } else {
            Err(Error::new(
                ErrorKind::InvalidInput,
                "buffer handle belongs to another cache",
            ))
        }
    }

    /// (dev, block_no) 当前是否在索引中
    pub fn is_cached(&self, dev: DeviceId, block_no: BlockNo) -> bool {
        let bucket = self.bucket(block_no).lock();
        bucket.find(&self.bufs, dev, block_no).is_some()
    }

    /// (dev, block_no) 的引用计数，不在索引中时返回 `None`
    pub fn ref_count(&self, dev: DeviceId, block_no: BlockNo) -> Option<u32> {
        let bucket = self.bucket(block_no).lock();
        bucket
            .find(&self.bufs, dev, block_no)
            .map(|id| self.bufs[id].with_meta(|m| m.refcnt))
    }

    /// 空闲缓存块数量（快照）
    pub fn free_count(&self) -> usize {
        self.bufs
            .iter()
            .filter(|buf| buf.with_meta(|m| m.is_free()))
            .count()
    }

    /// 检查缓存内部不变量
    ///
    /// 逐个桶（每次只持有一个桶锁）检查：
    /// - 链表前驱/后继一致，且无环
    /// - 链表中的缓存块属于该桶、引用计数 >= 1、pin 数不超过引用计数
    /// - 同一 (dev, block_no) 最多出现一次，同一缓存块最多在一个链表中
    /// - 不在任何链表中的缓存块都是空闲的
    ///
    /// 后两项跨桶检查只在没有并发操作时才准确。
    pub fn verify(&self) -> Result<()> {
        let mut linked = vec![false; self.bufs.len()];

        for (index, bucket) in self.buckets.iter().enumerate() {
            let bucket = bucket.lock();
            let mut seen: Vec<(DeviceId, BlockNo)> = Vec::new();
            let mut prev = None;

            for id in bucket.iter(&self.bufs) {
                if linked[id] {
                    return Err(corrupted("buffer linked twice"));
                }
                linked[id] = true;

                let meta = *self.bufs[id].meta.lock();
                if meta.prev != prev {
                    return Err(corrupted("bucket chain prev link mismatch"));
                }
                if self.bucket_index(meta.block_no) != index {
                    return Err(corrupted("buffer linked into wrong bucket"));
                }
                if meta.refcnt == 0 {
                    return Err(corrupted("indexed buffer has no holders"));
                }
                if meta.pins > meta.refcnt {
                    return Err(corrupted("pin count exceeds reference count"));
                }
                if seen.contains(&(meta.dev, meta.block_no)) {
                    return Err(corrupted("block indexed twice"));
                }
                seen.push((meta.dev, meta.block_no));
                prev = Some(id);
            }
        }

        for (id, buf) in self.bufs.iter().enumerate() {
            if !linked[id] && !buf.with_meta(|m| m.is_free()) {
                return Err(corrupted("unindexed buffer is not free"));
            }
        }
        Ok(())
    }
}

fn corrupted(message: &'static str) -> Error {
    log::error!("[BCACHE] verify: {}", message);
    Error::new(ErrorKind::InvalidState, message)
}

impl<D: BlockDevice> core::fmt::Debug for BlockCache<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlockCache")
            .field("capacity", &self.capacity())
            .field("buckets", &self.bucket_count())
            .field("free", &self.free_count())
            .field("stats", &self.stats())
            .finish()
    }
}
