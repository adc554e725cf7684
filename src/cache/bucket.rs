//! 哈希桶
//!
//! 查找索引的一个分片：一个双向链表头，链表节点是缓存池中的缓存块下标，
//! 前驱/后继存放在各缓存块的 `BufMeta` 中。
//!
//! 所有方法都要求调用者持有本桶的锁（通过锁守卫拿到 `&Bucket` / `&mut Bucket`），
//! 链表结构因此只会被一个线程修改。插入和摘除都是 O(1)。

use super::buffer::Buffer;
use crate::types::{BlockNo, BufferId, DeviceId};

/// 哈希桶
#[derive(Debug, Default)]
pub(crate) struct Bucket {
    head: Option<BufferId>,
}

impl Bucket {
    pub const fn new() -> Self {
        Self { head: None }
    }

    /// 在链表中查找 (dev, block_no)
    pub fn find(&self, bufs: &[Buffer], dev: DeviceId, block_no: BlockNo) -> Option<BufferId> {
        self.iter(bufs)
            .find(|&id| bufs[id].with_meta(|m| m.matches(dev, block_no)))
    }

    /// 插入到链表头
    pub fn push_front(&mut self, bufs: &[Buffer], id: BufferId) {
        let old_head = self.head;
        bufs[id].with_meta(|m| {
            m.prev = None;
            m.next = old_head;
        });
        if let Some(next) = old_head {
            bufs[next].with_meta(|m| m.prev = Some(id));
        }
        self.head = Some(id);
    }

    /// 从链表中摘除
    ///
    /// 调用者保证 `id` 当前在本桶中。
    pub fn remove(&mut self, bufs: &[Buffer], id: BufferId) {
        let (prev, next) = bufs[id].with_meta(|m| (m.prev.take(), m.next.take()));
        match prev {
            Some(prev) => bufs[prev].with_meta(|m| m.next = next),
            None => {
                debug_assert_eq!(self.head, Some(id));
                self.head = next;
            }
        }
        if let Some(next) = next {
            bufs[next].with_meta(|m| m.prev = prev);
        }
    }

    /// 按链表顺序遍历缓存块下标
    pub fn iter<'a>(&self, bufs: &'a [Buffer]) -> BucketIter<'a> {
        BucketIter {
            bufs,
            cursor: self.head,
        }
    }
}

/// 桶链表迭代器
pub(crate) struct BucketIter<'a> {
    bufs: &'a [Buffer],
    cursor: Option<BufferId>,
}

impl Iterator for BucketIter<'_> {
    type Item = BufferId;

    fn next(&mut self) -> Option<BufferId> {
        let id = self.cursor?;
        self.cursor = self.bufs[id].with_meta(|m| m.next);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn pool(n: usize) -> Vec<Buffer> {
        (0..n)
            .map(|i| {
                let buf = Buffer::new();
                buf.with_meta(|m| m.rebind(0, i as BlockNo));
                buf
            })
            .collect()
    }

    #[test]
    fn test_push_front_order() {
        let bufs = pool(4);
        let mut bucket = Bucket::new();
        assert_eq!(bucket.iter(&bufs).next(), None);

        bucket.push_front(&bufs, 0);
        bucket.push_front(&bufs, 2);
        bucket.push_front(&bufs, 3);

        let ids: Vec<_> = bucket.iter(&bufs).collect();
        assert_eq!(ids, [3, 2, 0]);
        assert_eq!(bufs[3].with_meta(|m| m.prev), None);
        assert_eq!(bufs[0].with_meta(|m| m.next), None);
    }

    #[test]
    fn test_remove_head_middle_tail() {
        let bufs = pool(4);
        let mut bucket = Bucket::new();
        for id in 0..4 {
            bucket.push_front(&bufs, id);
        }

        // 中间
        bucket.remove(&bufs, 2);
        assert_eq!(bucket.iter(&bufs).collect::<Vec<_>>(), [3, 1, 0]);
        // 头
        bucket.remove(&bufs, 3);
        assert_eq!(bucket.iter(&bufs).collect::<Vec<_>>(), [1, 0]);
        // 尾
        bucket.remove(&bufs, 0);
        assert_eq!(bucket.iter(&bufs).collect::<Vec<_>>(), [1]);
        assert_eq!(bufs[1].with_meta(|m| (m.prev, m.next)), (None, None));

        bucket.remove(&bufs, 1);
        assert_eq!(bucket.iter(&bufs).next(), None);
        for buf in &bufs {
            assert_eq!(buf.with_meta(|m| (m.prev, m.next)), (None, None));
        }
    }

    #[test]
    fn test_find() {
        let bufs = pool(4);
        let mut bucket = Bucket::new();
        bucket.push_front(&bufs, 1);
        bucket.push_front(&bufs, 3);

        assert_eq!(bucket.find(&bufs, 0, 3), Some(3));
        assert_eq!(bucket.find(&bufs, 0, 1), Some(1));
        assert_eq!(bucket.find(&bufs, 0, 2), None);
        assert_eq!(bucket.find(&bufs, 1, 3), None);
    }
}
