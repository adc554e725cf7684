//! 块缓存常量定义
//!
//! 这个模块包含了块缓存的编译期常量：
//! - 块大小
//! - 默认缓存池容量
//! - 默认哈希桶数量

//=============================================================================
// 块相关
//=============================================================================

/// 块大小（字节），与块设备的块大小一致
pub const BLOCK_SIZE: usize = 1024;

//=============================================================================
// 缓存池相关
//=============================================================================

/// 单次文件系统操作最多写入的块数
pub const MAXOPBLOCKS: usize = 10;

/// 默认缓存块数量
pub const NBUF: usize = MAXOPBLOCKS * 3;

/// 默认哈希桶数量
///
/// 取素数以分散 `block_no % NBUCKET` 的冲突
pub const NBUCKET: usize = 13;
