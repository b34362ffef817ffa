//! 报文解析、时间戳规整与点位映射。
//!
//! 三个阶段均为纯函数；[`Normalizer`] 将其串联为 RawMessage → Point。

pub mod envelope;
pub mod mapper;
pub mod timestamp;

pub use envelope::{EnvelopeParser, ParseError};
pub use mapper::map;
pub use timestamp::{TimestampError, normalize};

use domain::{Point, RawMessage, TopicRoute};

/// 消息被拒绝的原因。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Timestamp(#[from] TimestampError),
}

impl RejectReason {
    /// 用于日志与计数的稳定标签。
    pub fn label(&self) -> &'static str {
        match self {
            RejectReason::Parse(ParseError::Malformed(_)) => "malformed",
            RejectReason::Parse(ParseError::UnknownTopic(_)) => "unknown_topic",
            RejectReason::Parse(ParseError::MissingValue(_)) => "missing_value",
            RejectReason::Parse(ParseError::InvalidValue { .. }) => "invalid_value",
            RejectReason::Timestamp(TimestampError::Unparseable(_)) => "unparseable_timestamp",
        }
    }
}

/// RawMessage → Point 的规整器。
#[derive(Debug, Clone)]
pub struct Normalizer {
    parser: EnvelopeParser,
}

impl Normalizer {
    pub fn new(routes: Vec<TopicRoute>, tag_keys: Vec<String>) -> Self {
        Self {
            parser: EnvelopeParser::new(routes, tag_keys),
        }
    }

    pub fn parser(&self) -> &EnvelopeParser {
        &self.parser
    }

    pub fn to_point(&self, message: &RawMessage) -> Result<Point, RejectReason> {
        let reading = self.parser.parse(&message.topic, &message.payload)?;
        let time = normalize(reading.declared_timestamp.as_deref(), message.arrival_time)?;
        Ok(map(reading, time))
    }
}
