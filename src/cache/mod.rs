//! 块缓存模块
//!
//! 位于块设备与上层逻辑之间：复用最近访问过的块以减少设备读取，
//! 同时作为同一个块的并发调用者之间唯一的同步点。
//!
//! # 主要组件
//!
//! - [`BlockCache`] - 缓存表：固定大小的缓存池、分片的哈希桶索引和池锁
//! - [`Buf`] - 缓存块句柄，持有独占锁和一个引用
//! - [`CacheFlags`] - 缓存块状态标志
//! - [`CacheStats`] - 缓存统计信息
//!
//! # 缓存块生命周期
//!
//! | 状态         | 引用计数 | 桶链表     |
//! |--------------|----------|------------|
//! | 空闲         | 0        | 不在       |
//! | 被索引、使用中 | >= 1     | 在所属桶中 |
//!
//! 缓存块在启动时一次性分配，之后只原地重新绑定身份。引用计数降到 0（最后一次释放）时，
//! 缓存块立刻从桶中摘除，不存在“在缓存中但空闲”的状态。
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use bcache_core::{BlockCache, RamDisk};
//!
//! let cache = BlockCache::new(RamDisk::new(1024));
//!
//! // 读取块（未命中时读设备）
//! let mut buf = cache.read(0, 5)?;
//! buf.with_data_mut(|data| data[0] = 42)?;
//!
//! // 写回并释放
//! buf.write_back()?;
//! buf.release()?;
//!
//! let stats = cache.stats();
//! println!("hits={} misses={}", stats.hits, stats.misses);
//! ```
//!
//! # 内存分配要求
//!
//! 本模块依赖 `alloc` crate，需要用户提供全局分配器。

mod block_cache;
mod bucket;
mod buffer;
mod handle;

pub use block_cache::{BlockCache, CacheStats};
pub use buffer::CacheFlags;
pub use handle::Buf;
