pub mod address;
pub mod data;
pub mod error;
pub mod kind;

pub use address::{BrokerAddress, InvalidAddress};
pub use data::{Point, RawMessage, Reading};
pub use error::ConnectionError;
pub use kind::{ReadingKind, TopicRoute, UnknownKind, default_routes, topic_matches};

/// 规范化后的 UTC 时间点。
///
/// 所有进入点位映射的时间都是该类型，不存在无时区的值。
pub type CanonicalTimestamp = chrono::DateTime<chrono::Utc>;
