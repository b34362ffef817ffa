//! 接入会话与投递策略。
//!
//! - [`IngestionSession`]：订阅/接收循环、逐条处理、生命周期
//! - [`DeliveryPolicy`]：拒绝与写入失败的处置
//! - [`SessionCounters`]：按类型统计的写入计数（会话独占写，外部只读）

pub mod counters;
pub mod policy;
pub mod session;

pub use counters::{CountersHandle, CountersSnapshot, REJECT_LABELS, SessionCounters};
pub use policy::{DeliveryPolicy, Disposition};
pub use session::{IngestionSession, ProcessOutcome, SessionConfig, SessionError, SessionState};
