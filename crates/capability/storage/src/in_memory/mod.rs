//! 内存写入实现模块
//!
//! 仅用于本地演示和测试。
//!
//! - PointWriter: InMemoryPointWriter（支持注入写入失败、连接拒绝、写入延迟）

pub mod point_writer;

pub use point_writer::*;
