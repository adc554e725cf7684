//! 块设备抽象
//!
//! block/device.rs 定义缓存与底层设备之间的同步读写接口。
//! block/ram.rs 提供一个内存中的设备实现，用于测试和无盘环境。

mod device;
mod ram;

pub use device::BlockDevice;
pub use ram::RamDisk;
