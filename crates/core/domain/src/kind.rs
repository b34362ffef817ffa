use std::fmt;
use std::str::FromStr;

/// 读数类别。
///
/// 每个类别对应一个 measurement 名称和一个字段名（当前两者相同）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingKind {
    Temperature,
    Humidity,
    Pressure,
    WindSpeed,
}

impl ReadingKind {
    pub const ALL: [ReadingKind; 4] = [
        ReadingKind::Temperature,
        ReadingKind::Humidity,
        ReadingKind::Pressure,
        ReadingKind::WindSpeed,
    ];

    /// 规范名称，同时用作 measurement 名。
    pub fn name(self) -> &'static str {
        match self {
            ReadingKind::Temperature => "temperature",
            ReadingKind::Humidity => "humidity",
            ReadingKind::Pressure => "pressure",
            ReadingKind::WindSpeed => "wind_speed",
        }
    }

    pub fn measurement(self) -> &'static str {
        self.name()
    }

    /// 报文中必填的数值键，也是写入点位的字段名。
    pub fn field(self) -> &'static str {
        self.name()
    }
}

impl fmt::Display for ReadingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown reading kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for ReadingKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        ReadingKind::ALL
            .into_iter()
            .find(|kind| kind.name() == normalized)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// topic 到读数类别的路由。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRoute {
    pub topic: String,
    pub kind: ReadingKind,
}

impl TopicRoute {
    pub fn new(topic: impl Into<String>, kind: ReadingKind) -> Self {
        Self {
            topic: topic.into(),
            kind,
        }
    }

    /// 解析路由条目：`topic=kind`，或仅 `topic`（取最后一段作为类别名）。
    pub fn parse(entry: &str) -> Result<Self, UnknownKind> {
        let entry = entry.trim();
        let (topic, kind) = match entry.split_once('=') {
            Some((topic, kind)) => (topic.trim(), kind.trim()),
            None => (entry, entry.rsplit('/').next().unwrap_or(entry)),
        };
        if topic.is_empty() {
            return Err(UnknownKind(entry.to_string()));
        }
        Ok(Self::new(topic, kind.parse()?))
    }

    /// 路由 topic 作为 MQTT 过滤器时是否匹配 `topic`。
    pub fn matches(&self, topic: &str) -> bool {
        topic_matches(&self.topic, topic)
    }
}

/// MQTT topic 过滤器匹配（支持 `+` 与 `#`）。
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(expected), Some(actual)) if expected == actual => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// 默认路由：温度与湿度。
pub fn default_routes() -> Vec<TopicRoute> {
    vec![
        TopicRoute::new("data/temperature", ReadingKind::Temperature),
        TopicRoute::new("data/humidity", ReadingKind::Humidity),
    ]
}
