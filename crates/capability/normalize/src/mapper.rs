//! Reading + 规范时间 → 存储点位。

use domain::{CanonicalTimestamp, Point, Reading};
use std::collections::BTreeMap;

/// 构造点位：measurement 取类别名，唯一字段为读数值，标签原样透传。
///
/// 空值标签直接省略，不以占位值写入存储。
pub fn map(reading: Reading, time: CanonicalTimestamp) -> Point {
    let mut fields = BTreeMap::new();
    fields.insert(reading.kind.field().to_string(), reading.value);
    let tags = reading
        .tags
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .collect();
    Point {
        measurement: reading.kind.measurement().to_string(),
        fields,
        tags,
        time,
    }
}
