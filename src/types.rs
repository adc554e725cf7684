//! 块缓存公共类型定义

use crate::consts::{NBUCKET, NBUF};
use crate::error::{Error, ErrorKind, Result};

/// 设备号
pub type DeviceId = u32;

/// 设备上的块号
pub type BlockNo = u32;

/// 缓存块在缓存池中的下标
///
/// 哈希桶链表用下标而非指针串联缓存块。
pub type BufferId = usize;

/// 块缓存配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// 缓存池容量（缓存块数）
    pub capacity: usize,
    /// 哈希桶数量
    pub buckets: usize,
}

impl CacheConfig {
    /// 创建配置
    pub const fn new(capacity: usize, buckets: usize) -> Self {
        Self { capacity, buckets }
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "cache capacity must be non-zero",
            ));
        }
        if self.buckets == 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "bucket count must be non-zero",
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: NBUF,
            buckets: NBUCKET,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.capacity, 30);
        assert_eq!(config.buckets, 13);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let err = CacheConfig::new(0, 13).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = CacheConfig::new(8, 0).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
