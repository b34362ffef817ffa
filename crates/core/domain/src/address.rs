use std::fmt;
use std::str::FromStr;

pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// 总线地址（`host:port`，省略端口时取 MQTT 默认端口）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
}

impl BrokerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid broker address: {0}")]
pub struct InvalidAddress(pub String);

impl FromStr for BrokerAddress {
    type Err = InvalidAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("mqtt://").unwrap_or(s);
        let (host, port) = match s.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| InvalidAddress(s.to_string()))?;
                (host, port)
            }
            None => (s, DEFAULT_MQTT_PORT),
        };
        if host.is_empty() || port == 0 {
            return Err(InvalidAddress(s.to_string()));
        }
        Ok(Self::new(host, port))
    }
}
