//! 报文信封解析：topic + payload → Reading。

use domain::{Reading, ReadingKind, TopicRoute};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// 报文中声明时间戳的键。
pub const TIMESTAMP_KEY: &str = "timestamp";

/// 报文解析错误（均为消息级错误，丢弃后会话继续）。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("unknown topic: {0}")]
    UnknownTopic(String),
    #[error("missing value for key: {0}")]
    MissingValue(String),
    #[error("invalid value for key {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// 按 topic 路由表解析报文。
#[derive(Debug, Clone)]
pub struct EnvelopeParser {
    routes: Vec<TopicRoute>,
    tag_keys: Vec<String>,
}

impl EnvelopeParser {
    pub fn new(routes: Vec<TopicRoute>, tag_keys: Vec<String>) -> Self {
        Self { routes, tag_keys }
    }

    /// 精确匹配优先，其次按配置顺序匹配通配路由。
    pub fn kind_for(&self, topic: &str) -> Option<ReadingKind> {
        self.routes
            .iter()
            .find(|route| route.topic == topic)
            .or_else(|| self.routes.iter().find(|route| route.matches(topic)))
            .map(|route| route.kind)
    }

    /// 解析单条报文。纯函数，不涉及任何 I/O。
    pub fn parse(&self, topic: &str, payload: &[u8]) -> Result<Reading, ParseError> {
        let kind = self
            .kind_for(topic)
            .ok_or_else(|| ParseError::UnknownTopic(topic.to_string()))?;
        let document = decode_object(payload)?;

        let key = kind.field();
        let value = match document.get(key) {
            None | Some(Value::Null) => return Err(ParseError::MissingValue(key.to_string())),
            Some(value) => coerce_f64(value).ok_or_else(|| ParseError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            })?,
        };

        let declared_timestamp = match document.get(TIMESTAMP_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text.clone()),
            Some(other) => Some(other.to_string()),
        };

        let mut tags = BTreeMap::new();
        for tag_key in &self.tag_keys {
            if let Some(tag_value) = document.get(tag_key.as_str()).and_then(tag_text) {
                tags.insert(tag_key.clone(), tag_value);
            }
        }

        Ok(Reading {
            kind,
            value,
            declared_timestamp,
            tags,
        })
    }
}

fn decode_object(payload: &[u8]) -> Result<Map<String, Value>, ParseError> {
    match serde_json::from_slice::<Value>(payload) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ParseError::Malformed(format!(
            "expected JSON object, got {}",
            json_type(&other)
        ))),
        Err(err) => Err(ParseError::Malformed(err.to_string())),
    }
}

/// 数值或可解析为数值的字符串；结果必须是有限值。
fn coerce_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// 标量标签值转为字符串；null 与复合值不产生标签。
fn tag_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
