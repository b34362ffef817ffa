//! 接入桥运行配置加载。

use domain::{BrokerAddress, TopicRoute};
use std::env;
use url::Url;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 接入桥运行配置。
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub mqtt_broker: BrokerAddress,
    pub mqtt_client_id: String,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_connect_timeout_seconds: u64,
    pub mqtt_keep_alive_seconds: u64,
    pub mqtt_qos: u8,
    /// 有序、去重后的订阅路由。
    pub topics: Vec<TopicRoute>,
    pub tag_keys: Vec<String>,
    pub influxdb_url: Url,
    pub influxdb_token: String,
    pub influxdb_org: String,
    pub influxdb_bucket: String,
    pub write_timeout_seconds: u64,
    /// 连续不可达写入达到该次数即视为存储连接丢失（0 表示关闭）。
    pub max_consecutive_unreachable: u32,
    pub http_addr: Option<String>,
}

impl BridgeConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源读取配置（便于测试）。
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Lookup(lookup);
        let influxdb_token = vars
            .optional("BRIDGE_INFLUXDB_TOKEN")
            .ok_or_else(|| ConfigError::Missing("BRIDGE_INFLUXDB_TOKEN".to_string()))?;
        let mqtt_broker = vars.broker("BRIDGE_MQTT_BROKER", "127.0.0.1:1883")?;
        let mqtt_client_id = vars
            .optional("BRIDGE_MQTT_CLIENT_ID")
            .unwrap_or_else(|| format!("telemetry-bridge-{}", uuid::Uuid::new_v4()));
        let mqtt_username = vars.optional("BRIDGE_MQTT_USERNAME");
        let mqtt_password = vars.optional("BRIDGE_MQTT_PASSWORD");
        let mqtt_connect_timeout_seconds =
            vars.u64_with_default("BRIDGE_MQTT_CONNECT_TIMEOUT_SECONDS", 10)?;
        let mqtt_keep_alive_seconds = vars.u64_with_default("BRIDGE_MQTT_KEEP_ALIVE_SECONDS", 60)?;
        let mqtt_qos = vars.u8_with_default("BRIDGE_MQTT_QOS", 1)?;
        if mqtt_qos > 2 {
            return Err(ConfigError::Invalid(
                "BRIDGE_MQTT_QOS".to_string(),
                mqtt_qos.to_string(),
            ));
        }
        let topics = vars.topics("BRIDGE_TOPICS")?;
        let tag_keys = vars
            .optional("BRIDGE_TAG_KEYS")
            .map(|value| split_list(&value))
            .unwrap_or_else(|| vec!["location".to_string()]);
        let influxdb_url = vars.url("BRIDGE_INFLUXDB_URL", "http://localhost:8086")?;
        let influxdb_org = vars
            .optional("BRIDGE_INFLUXDB_ORG")
            .unwrap_or_else(|| "myorg".to_string());
        let influxdb_bucket = vars
            .optional("BRIDGE_INFLUXDB_BUCKET")
            .unwrap_or_else(|| "weather_data".to_string());
        let write_timeout_seconds = vars.u64_with_default("BRIDGE_WRITE_TIMEOUT_SECONDS", 10)?;
        let max_consecutive_unreachable =
            vars.u32_with_default("BRIDGE_MAX_CONSECUTIVE_UNREACHABLE", 0)?;
        let http_addr = vars.optional("BRIDGE_HTTP_ADDR");

        Ok(Self {
            mqtt_broker,
            mqtt_client_id,
            mqtt_username,
            mqtt_password,
            mqtt_connect_timeout_seconds,
            mqtt_keep_alive_seconds,
            mqtt_qos,
            topics,
            tag_keys,
            influxdb_url,
            influxdb_token,
            influxdb_org,
            influxdb_bucket,
            write_timeout_seconds,
            max_consecutive_unreachable,
            http_addr,
        })
    }
}

/// 模拟发布程序配置。
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub mqtt_broker: BrokerAddress,
    pub mqtt_client_id: String,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_qos: u8,
    pub interval_ms: u64,
    pub topics: Vec<TopicRoute>,
    pub location: String,
}

impl PublisherConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 未设置 `PUBLISHER_MQTT_BROKER` 时沿用接入桥的总线地址。
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Lookup(lookup);
        let broker_key = if vars.optional("PUBLISHER_MQTT_BROKER").is_some() {
            "PUBLISHER_MQTT_BROKER"
        } else {
            "BRIDGE_MQTT_BROKER"
        };
        let mqtt_broker = vars.broker(broker_key, "127.0.0.1:1883")?;
        let mqtt_client_id = vars
            .optional("PUBLISHER_MQTT_CLIENT_ID")
            .unwrap_or_else(|| format!("telemetry-publisher-{}", uuid::Uuid::new_v4()));
        let mqtt_qos = vars.u8_with_default("PUBLISHER_MQTT_QOS", 1)?;
        if mqtt_qos > 2 {
            return Err(ConfigError::Invalid(
                "PUBLISHER_MQTT_QOS".to_string(),
                mqtt_qos.to_string(),
            ));
        }
        let interval_ms = vars.u64_with_default("PUBLISHER_INTERVAL_MS", 1000)?;
        if interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "PUBLISHER_INTERVAL_MS".to_string(),
                "0".to_string(),
            ));
        }

        Ok(Self {
            mqtt_broker,
            mqtt_client_id,
            mqtt_username: vars.optional("PUBLISHER_MQTT_USERNAME"),
            mqtt_password: vars.optional("PUBLISHER_MQTT_PASSWORD"),
            mqtt_qos,
            interval_ms,
            topics: vars.topics("PUBLISHER_TOPICS")?,
            location: vars
                .optional("PUBLISHER_LOCATION")
                .unwrap_or_else(|| "Weather Station 1".to_string()),
        })
    }
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// 空字符串视同未设置。
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn u64_with_default(&self, key: &str, default: u64) -> Result<u64, ConfigError> {
        match self.optional(key) {
            Some(value) => value
                .parse::<u64>()
                .map_err(|_| ConfigError::Invalid(key.to_string(), value)),
            None => Ok(default),
        }
    }

    fn u32_with_default(&self, key: &str, default: u32) -> Result<u32, ConfigError> {
        match self.optional(key) {
            Some(value) => value
                .parse::<u32>()
                .map_err(|_| ConfigError::Invalid(key.to_string(), value)),
            None => Ok(default),
        }
    }

    fn u8_with_default(&self, key: &str, default: u8) -> Result<u8, ConfigError> {
        match self.optional(key) {
            Some(value) => value
                .parse::<u8>()
                .map_err(|_| ConfigError::Invalid(key.to_string(), value)),
            None => Ok(default),
        }
    }

    fn broker(&self, key: &str, default: &str) -> Result<BrokerAddress, ConfigError> {
        let value = self.optional(key).unwrap_or_else(|| default.to_string());
        value
            .parse::<BrokerAddress>()
            .map_err(|_| ConfigError::Invalid(key.to_string(), value))
    }

    fn url(&self, key: &str, default: &str) -> Result<Url, ConfigError> {
        let value = self.optional(key).unwrap_or_else(|| default.to_string());
        let url = Url::parse(&value).map_err(|_| ConfigError::Invalid(key.to_string(), value.clone()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(key.to_string(), value));
        }
        Ok(url)
    }

    fn topics(&self, key: &str) -> Result<Vec<TopicRoute>, ConfigError> {
        let Some(value) = self.optional(key) else {
            return Ok(domain::default_routes());
        };
        let mut routes: Vec<TopicRoute> = Vec::new();
        for entry in split_list(&value) {
            let route = TopicRoute::parse(&entry)
                .map_err(|err| ConfigError::Invalid(key.to_string(), err.to_string()))?;
            if routes.iter().any(|existing| existing.topic == route.topic) {
                continue;
            }
            routes.push(route);
        }
        if routes.is_empty() {
            return Err(ConfigError::Invalid(key.to_string(), value));
        }
        Ok(routes)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
