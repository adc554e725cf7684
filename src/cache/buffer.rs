//! 缓存块结构
//!
//! 每个缓存块由两部分组成：
//!
//! - [`BufMeta`]：身份、引用计数、标志和桶链表下标，只在所属哈希桶的锁下修改。
//!   它自己的 `spin::Mutex` 是叶子锁，持有期间不再获取任何其他锁。
//! - 数据区：`BLOCK_SIZE` 字节的块内容，由独占锁保护，只有独占锁持有者可以读写。

use crate::consts::BLOCK_SIZE;
use crate::types::{BlockNo, BufferId, DeviceId};
use bitflags::bitflags;
use spin::Mutex;

bitflags! {
    /// 缓存块标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CacheFlags: u8 {
        /// 数据已从设备读入，与当前身份一致
        const VALID = 0x01;
        /// 数据经句柄修改后尚未写回
        const DIRTY = 0x02;
    }
}

/// 缓存块元数据
#[derive(Debug, Clone, Copy)]
pub(crate) struct BufMeta {
    /// 设备号（仅在被索引时有意义）
    pub dev: DeviceId,
    /// 块号（仅在被索引时有意义）
    pub block_no: BlockNo,
    /// 引用计数：持有者数量加上 pin 数量
    pub refcnt: u32,
    /// 其中由 pin 贡献的部分
    pub pins: u32,
    /// 块状态标志
    pub flags: CacheFlags,
    /// 桶链表前驱
    pub prev: Option<BufferId>,
    /// 桶链表后继
    pub next: Option<BufferId>,
}

impl BufMeta {
    const fn new() -> Self {
        Self {
            dev: 0,
            block_no: 0,
            refcnt: 0,
            pins: 0,
            flags: CacheFlags::empty(),
            prev: None,
            next: None,
        }
    }

    /// 空闲：无持有者、不在任何桶中
    pub fn is_free(&self) -> bool {
        self.refcnt == 0
    }

    pub fn matches(&self, dev: DeviceId, block_no: BlockNo) -> bool {
        self.dev == dev && self.block_no == block_no
    }

    /// 绑定到新身份，数据随之失效
    pub fn rebind(&mut self, dev: DeviceId, block_no: BlockNo) {
        self.dev = dev;
        self.block_no = block_no;
        self.flags = CacheFlags::empty();
    }

    pub fn is_valid(&self) -> bool {
        self.flags.contains(CacheFlags::VALID)
    }
}

/// 缓存块
pub(crate) struct Buffer {
    pub meta: Mutex<BufMeta>,
    /// 独占锁及其保护的块数据
    pub data: Mutex<[u8; BLOCK_SIZE]>,
}

impl Buffer {
    pub fn new() -> Self {
        Self {
            meta: Mutex::new(BufMeta::new()),
            data: Mutex::new([0u8; BLOCK_SIZE]),
        }
    }

    /// 在元数据锁下执行闭包
    #[inline]
    pub fn with_meta<R>(&self, f: impl FnOnce(&mut BufMeta) -> R) -> R {
        f(&mut *self.meta.lock())
    }
}
