//! 时间戳规整：异构时间表示 → UTC 时间点。

use chrono::{DateTime, NaiveDateTime, Utc};
use domain::CanonicalTimestamp;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimestampError {
    #[error("unparseable timestamp: {0}")]
    Unparseable(String),
}

const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

const NAIVE_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// 大于等于该值的纪元数按毫秒解释，否则按秒。
const EPOCH_MILLIS_THRESHOLD: f64 = 1e12;

/// 规整声明时间；未声明（或为空）时取到达时间。
pub fn normalize(
    declared: Option<&str>,
    arrival_time: CanonicalTimestamp,
) -> Result<CanonicalTimestamp, TimestampError> {
    let Some(raw) = declared.map(str::trim).filter(|text| !text.is_empty()) else {
        return Ok(arrival_time);
    };
    parse_declared(raw).ok_or_else(|| TimestampError::Unparseable(raw.to_string()))
}

fn parse_declared(raw: &str) -> Option<CanonicalTimestamp> {
    // "Z" 需先替换为显式偏移，再走通用解析。
    let text = substitute_utc_designator(raw);

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(&text, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }
    // 无时区的时间按 UTC 解释。
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(&text, format) {
            return Some(parsed.and_utc());
        }
    }
    parse_epoch(&text)
}

fn substitute_utc_designator(text: &str) -> String {
    match text.strip_suffix(['Z', 'z']) {
        Some(stripped) => format!("{stripped}+00:00"),
        None => text.to_string(),
    }
}

fn parse_epoch(text: &str) -> Option<CanonicalTimestamp> {
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (text, None),
    };
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if let Some(fraction) = fraction {
        if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let value = text.parse::<f64>().ok()?;
        let micros = if value >= EPOCH_MILLIS_THRESHOLD {
            value * 1_000.0
        } else {
            value * 1_000_000.0
        };
        return DateTime::from_timestamp_micros(micros.round() as i64);
    }
    let value = whole.parse::<i64>().ok()?;
    if value as f64 >= EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    }
}
