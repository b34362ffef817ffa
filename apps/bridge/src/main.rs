//! 遥测接入桥：订阅 MQTT topic，将读数写入 InfluxDB。
//!
//! 退出码：停止信号或消息流结束 → 0；配置错误、连接失败 → 1。

mod http;
mod signal;

use bridge_config::BridgeConfig;
use bridge_ingest::{MqttBusClient, MqttBusConfig};
use bridge_pipeline::{IngestionSession, SessionConfig};
use bridge_storage::{InfluxDbConfig, InfluxDbWriter};
use bridge_telemetry::{init_tracing, targets};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在）
    dotenvy::dotenv().ok();
    init_tracing();

    let config = match BridgeConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(target: targets::SESSION, error = %err, "config_invalid");
            return Err(err.into());
        }
    };
    info!(
        target: targets::SESSION,
        broker = %config.mqtt_broker,
        influxdb = %config.influxdb_url,
        bucket = %config.influxdb_bucket,
        topics = ?config.topics.iter().map(|route| route.topic.as_str()).collect::<Vec<_>>(),
        "bridge_starting"
    );

    // 状态接口先绑定端口，失败时尚未占用总线与存储
    let listener = match &config.http_addr {
        Some(addr) => Some(tokio::net::TcpListener::bind(addr).await?),
        None => None,
    };

    let writer = InfluxDbWriter::new(InfluxDbConfig {
        url: config.influxdb_url.clone(),
        token: config.influxdb_token.clone(),
        org: config.influxdb_org.clone(),
        bucket: config.influxdb_bucket.clone(),
        timeout: Duration::from_secs(config.write_timeout_seconds),
    })?;
    let bus = MqttBusClient::new(MqttBusConfig {
        client_id: config.mqtt_client_id.clone(),
        username: config.mqtt_username.clone(),
        password: config.mqtt_password.clone(),
        keep_alive: Duration::from_secs(config.mqtt_keep_alive_seconds),
        qos: config.mqtt_qos,
    });
    let mut session = IngestionSession::new(
        SessionConfig {
            broker: config.mqtt_broker.clone(),
            connect_timeout: Duration::from_secs(config.mqtt_connect_timeout_seconds),
            routes: config.topics.clone(),
            tag_keys: config.tag_keys.clone(),
            max_consecutive_unreachable: config.max_consecutive_unreachable,
        },
        Box::new(bus),
        Box::new(writer),
    );

    if let Err(err) = session.start().await {
        error!(target: targets::SESSION, error = %err, "bridge_start_failed");
        return Err(err.into());
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    let signal_task = tokio::spawn(signal::wait_for_shutdown(stop_tx.clone()));

    let http_task = listener.map(|listener| {
        let app = http::router(http::StatusState {
            counters: session.counters(),
            state: session.watch_state(),
        });
        let mut http_stop = stop_rx.clone();
        tokio::spawn(async move {
            if let Ok(addr) = listener.local_addr() {
                info!(target: targets::HTTP, addr = %addr, "status_server_listening");
            }
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = http_stop.wait_for(|stopped| *stopped).await;
                })
                .await
        })
    });

    let result = session.run(stop_rx).await;

    // 会话已关闭：通知其余任务退出并等待
    stop_tx.send_replace(true);
    signal_task.abort();
    let _ = signal_task.await;
    if let Some(task) = http_task {
        match task.await {
            Ok(Err(err)) => warn!(target: targets::HTTP, error = %err, "status_server_failed"),
            Err(err) => warn!(target: targets::HTTP, error = %err, "status_server_join_failed"),
            Ok(Ok(())) => {}
        }
    }

    match result {
        Ok(()) => {
            info!(target: targets::SESSION, "bridge_stopped");
            Ok(())
        }
        Err(err) => {
            error!(target: targets::SESSION, error = %err, "bridge_failed");
            Err(err.into())
        }
    }
}
