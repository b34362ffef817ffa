//! 模拟读数生成与报文编码。

use chrono::{DateTime, SecondsFormat, Utc};
use domain::ReadingKind;
use rand::Rng;
use serde_json::{Map, Value};

/// 各类型读数的取值范围（闭区间）。
pub fn value_range(kind: ReadingKind) -> (f64, f64) {
    match kind {
        ReadingKind::Temperature => (15.0, 30.0),
        ReadingKind::Humidity => (40.0, 80.0),
        ReadingKind::Pressure => (1000.0, 1020.0),
        ReadingKind::WindSpeed => (0.0, 15.0),
    }
}

/// 在取值范围内随机取值，保留两位小数。
pub fn sample<R: Rng + ?Sized>(kind: ReadingKind, rng: &mut R) -> f64 {
    let (low, high) = value_range(kind);
    let value = rng.gen_range(low..=high);
    ((value * 100.0).round() / 100.0).clamp(low, high)
}

/// `{"timestamp": ..., "<field>": value, "location": ...}`
pub fn payload(kind: ReadingKind, value: f64, location: &str, at: DateTime<Utc>) -> Vec<u8> {
    let mut body = Map::new();
    body.insert(
        "timestamp".to_string(),
        Value::String(at.to_rfc3339_opts(SecondsFormat::Secs, true)),
    );
    body.insert(kind.field().to_string(), Value::from(value));
    body.insert("location".to_string(), Value::String(location.to_string()));
    Value::Object(body).to_string().into_bytes()
}
