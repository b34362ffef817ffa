use crate::CanonicalTimestamp;
use crate::kind::ReadingKind;
use std::collections::BTreeMap;

/// 总线投递的原始消息。
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    /// 接入桥收到消息的时刻。
    pub arrival_time: CanonicalTimestamp,
}

impl RawMessage {
    pub fn new(
        topic: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        arrival_time: CanonicalTimestamp,
    ) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            arrival_time,
        }
    }
}

/// 按 topic 解码后的读数。
///
/// `value` 恒为有限值：缺失或非数值的报文在解析阶段即被拒绝，不会构造出 Reading。
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub kind: ReadingKind,
    pub value: f64,
    /// 报文声明的时间戳（原样保留，由时间戳规整负责解释）。
    pub declared_timestamp: Option<String>,
    pub tags: BTreeMap<String, String>,
}

/// 时序存储点位。
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Point {
    pub measurement: String,
    /// 至少包含一个字段。
    pub fields: BTreeMap<String, f64>,
    pub tags: BTreeMap<String, String>,
    pub time: CanonicalTimestamp,
}
