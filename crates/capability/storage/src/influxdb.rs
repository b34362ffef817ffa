//! InfluxDB v2 HTTP 写入实现
//!
//! - 连接校验：`GET /api/v2/buckets?name=..&org=..`（同时校验令牌与 bucket）
//! - 写入：`POST /api/v2/write?org=..&bucket=..&precision=ns`，行协议正文

use crate::error::WriteError;
use crate::line_protocol::{encode_point, encode_points};
use crate::traits::PointWriter;
use async_trait::async_trait;
use bridge_telemetry::targets;
use domain::{ConnectionError, Point};
use reqwest::{Client, StatusCode, header};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// InfluxDB 写入配置。
#[derive(Debug, Clone)]
pub struct InfluxDbConfig {
    pub url: Url,
    pub token: String,
    pub org: String,
    pub bucket: String,
    pub timeout: Duration,
}

/// InfluxDB v2 写入器。
pub struct InfluxDbWriter {
    config: InfluxDbConfig,
    write_url: Url,
    buckets_url: Url,
    client: Option<Client>,
}

impl InfluxDbWriter {
    pub fn new(config: InfluxDbConfig) -> Result<Self, ConnectionError> {
        let write_url = endpoint(
            &config.url,
            "api/v2/write",
            &[
                ("org", config.org.as_str()),
                ("bucket", config.bucket.as_str()),
                ("precision", "ns"),
            ],
        )?;
        let buckets_url = endpoint(
            &config.url,
            "api/v2/buckets",
            &[("name", config.bucket.as_str()), ("org", config.org.as_str())],
        )?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ConnectionError::RefusedByStorage(err.to_string()))?;
        Ok(Self {
            config,
            write_url,
            buckets_url,
            client: Some(client),
        })
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.config.token)
    }

    async fn post_lines(&self, body: String) -> Result<(), WriteError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| WriteError::Unreachable("writer closed".to_string()))?;
        let response = client
            .post(self.write_url.clone())
            .header(header::AUTHORIZATION, self.auth_header())
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(|err| WriteError::Unreachable(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let detail = response.text().await.unwrap_or_default();
        let reason = if detail.is_empty() {
            status.to_string()
        } else {
            format!("{}: {}", status, detail.trim())
        };
        if status.is_client_error() {
            Err(WriteError::Rejected(reason))
        } else {
            Err(WriteError::Unreachable(reason))
        }
    }
}

#[async_trait]
impl PointWriter for InfluxDbWriter {
    async fn connect(&mut self) -> Result<(), ConnectionError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ConnectionError::RefusedByStorage("writer closed".to_string()))?;
        let response = client
            .get(self.buckets_url.clone())
            .header(header::AUTHORIZATION, self.auth_header())
            .send()
            .await
            .map_err(|err| ConnectionError::RefusedByStorage(err.to_string()))?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ConnectionError::RefusedByStorage(format!(
                "credential rejected ({})",
                status
            )));
        }
        if !status.is_success() {
            return Err(ConnectionError::RefusedByStorage(status.to_string()));
        }
        let body = response
            .bytes()
            .await
            .map_err(|err| ConnectionError::RefusedByStorage(err.to_string()))?;
        let found = serde_json::from_slice::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| {
                value
                    .get("buckets")
                    .and_then(|buckets| buckets.as_array())
                    .map(|buckets| !buckets.is_empty())
            })
            .unwrap_or(false);
        if !found {
            return Err(ConnectionError::RefusedByStorage(format!(
                "bucket not found: {}",
                self.config.bucket
            )));
        }
        info!(
            target: targets::STORAGE,
            url = %self.config.url,
            org = %self.config.org,
            bucket = %self.config.bucket,
            "storage_connected"
        );
        Ok(())
    }

    async fn write(&mut self, point: &Point) -> Result<(), WriteError> {
        let line = encode_point(point)?;
        debug!(target: targets::STORAGE, line = %line, "storage_write");
        self.post_lines(line).await
    }

    async fn write_batch(&mut self, points: &[Point]) -> Result<(), WriteError> {
        if points.is_empty() {
            return Ok(());
        }
        let body = encode_points(points)?;
        self.post_lines(body).await
    }

    async fn close(&mut self) {
        if self.client.take().is_some() {
            info!(target: targets::STORAGE, bucket = %self.config.bucket, "storage_closed");
        }
    }
}

/// 在基础 URL 之后拼接 API 路径（保留基础路径前缀）。
fn endpoint(base: &Url, path: &str, query: &[(&str, &str)]) -> Result<Url, ConnectionError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    let mut url = base
        .join(path)
        .map_err(|err| ConnectionError::RefusedByStorage(err.to_string()))?;
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let base = Url::parse("http://influx.local:8086/proxy").unwrap();
        let url = endpoint(&base, "api/v2/write", &[("bucket", "weather data")]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://influx.local:8086/proxy/api/v2/write?bucket=weather+data"
        );
    }

    #[test]
    fn endpoint_on_root_url() {
        let base = Url::parse("http://localhost:8086").unwrap();
        let url = endpoint(&base, "api/v2/buckets", &[]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8086/api/v2/buckets");
    }
}
