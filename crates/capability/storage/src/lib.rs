//! # 时序存储写入模块
//!
//! 为接入会话提供统一的点位写入抽象，会话只依赖 [`PointWriter`]，不感知具体存储。
//!
//! ## 模块说明
//!
//! - [`traits`]：写入接口（connect / write / write_batch / close）
//! - [`error`]：写入错误（Unreachable / Rejected）
//! - [`line_protocol`]：InfluxDB 行协议编码
//! - [`influxdb`]：InfluxDB v2 HTTP 写入实现（生产环境使用）
//! - [`in_memory`]：内存写入实现（测试与演示），支持注入失败
//!
//! ## 错误语义
//!
//! - HTTP 4xx、编码失败 → `WriteError::Rejected`
//! - 传输错误、超时、HTTP 5xx → `WriteError::Unreachable`
//! - 连接校验失败（令牌无效、bucket 不存在、不可达）→ `ConnectionError::RefusedByStorage`
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use bridge_storage::{InfluxDbConfig, InfluxDbWriter, PointWriter};
//!
//! let mut writer = InfluxDbWriter::new(InfluxDbConfig {
//!     url: "http://localhost:8086".parse()?,
//!     token: "my-token".to_string(),
//!     org: "myorg".to_string(),
//!     bucket: "weather_data".to_string(),
//!     timeout: std::time::Duration::from_secs(10),
//! })?;
//! writer.connect().await?;
//! writer.write(&point).await?;
//! writer.close().await;
//! ```

pub mod error;
pub mod in_memory;
pub mod influxdb;
pub mod line_protocol;
pub mod traits;

pub use error::*;
pub use in_memory::InMemoryPointWriter;
pub use influxdb::{InfluxDbConfig, InfluxDbWriter};
pub use line_protocol::{EncodeError, encode_point, encode_points};
pub use traits::*;
