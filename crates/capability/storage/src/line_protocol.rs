//! InfluxDB 行协议编码。
//!
//! `measurement[,tag=value...] field=value[,field=value...] timestamp_ns`

use domain::Point;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("point has no fields")]
    NoFields,
    #[error("field {0} is not finite")]
    NonFinite(String),
    #[error("timestamp out of range: {0}")]
    TimeOutOfRange(String),
}

/// 编码单个点位（不含结尾换行）。
pub fn encode_point(point: &Point) -> Result<String, EncodeError> {
    if point.fields.is_empty() {
        return Err(EncodeError::NoFields);
    }
    let ts_ns = point
        .time
        .timestamp_nanos_opt()
        .ok_or_else(|| EncodeError::TimeOutOfRange(point.time.to_rfc3339()))?;

    let mut line = escape(&point.measurement, &[',', ' ']);
    for (key, value) in &point.tags {
        if value.is_empty() {
            continue;
        }
        let _ = write!(
            line,
            ",{}={}",
            escape(key, &[',', '=', ' ']),
            escape(value, &[',', '=', ' '])
        );
    }
    for (index, (key, value)) in point.fields.iter().enumerate() {
        if !value.is_finite() {
            return Err(EncodeError::NonFinite(key.clone()));
        }
        let separator = if index == 0 { ' ' } else { ',' };
        let _ = write!(line, "{}{}={}", separator, escape(key, &[',', '=', ' ']), value);
    }
    let _ = write!(line, " {}", ts_ns);
    Ok(line)
}

/// 编码多个点位，以换行分隔。
pub fn encode_points(points: &[Point]) -> Result<String, EncodeError> {
    let lines = points
        .iter()
        .map(encode_point)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines.join("\n"))
}

fn escape(text: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\n' | '\r' => escaped.push_str("\\ "),
            // 结尾的反斜杠会吞掉后面的分隔符
            '\\' => escaped.push_str("\\\\"),
            ch if special.contains(&ch) => {
                escaped.push('\\');
                escaped.push(ch);
            }
            ch => escaped.push(ch),
        }
    }
    escaped
}
