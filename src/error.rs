//! 错误类型定义
//!
//! 提供块缓存操作的错误类型。

use core::fmt;

/// 块缓存操作错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// I/O 错误（由块设备返回）
    Io,
    /// 无效参数
    InvalidInput,
    /// 无效状态
    InvalidState,
    /// 缓存池中没有空闲缓存块
    ///
    /// 调用者同时持有的缓存块超过了池容量，属于容量规划或泄漏错误，不应重试。
    PoolExhausted,
    /// 调用者没有持有缓存块的独占锁
    LockNotHeld,
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self { kind, message }
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }

    /// 是否为契约违例（调用者的 bug，而非运行时状况）
    pub const fn is_contract_violation(&self) -> bool {
        matches!(self.kind, ErrorKind::PoolExhausted | ErrorKind::LockNotHeld)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;
