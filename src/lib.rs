//! bcache_core: 分桶加锁的块缓存
//!
//! 位于块设备和文件系统之间的缓存层，提供：
//! - **固定大小的缓存池**，启动时一次性分配，耗尽时立即报错而不增长
//! - **按块号分片的哈希桶索引**，不相关块的查找可以完全并行
//! - **每个缓存块的独占锁和引用计数**，同一块的并发调用者看到串行化的一致视图
//! - **pin/unpin**，让缓存块在跨多步操作时不被回收
//!
//! # 示例
//!
//! ```rust,ignore
//! use bcache_core::{BlockCache, BlockDevice, CacheConfig, Result};
//!
//! fn main() -> Result<()> {
//!     let cache = BlockCache::with_config(MyDisk::new(), CacheConfig::new(64, 13))?;
//!
//!     let buf = cache.read(0, 1)?;
//!     let magic = buf.with_data(|data| u32::from_le_bytes([data[0], data[1], data[2], data[3]]))?;
//!     buf.release()?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`block`] - 块设备抽象
//! - [`consts`] - 常量定义
//! - [`types`] - 公共类型和配置
//! - [`cache`] - 块缓存

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

/// 错误处理
pub mod error;

/// 块设备抽象
pub mod block;

/// 常量定义
pub mod consts;

/// 公共类型
pub mod types;

/// 块缓存
pub mod cache;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 块设备
pub use block::{BlockDevice, RamDisk};

// 常量与类型
pub use consts::{BLOCK_SIZE, NBUCKET, NBUF};
pub use types::{BlockNo, BufferId, CacheConfig, DeviceId};

// 缓存
pub use cache::{BlockCache, Buf, CacheFlags, CacheStats};
