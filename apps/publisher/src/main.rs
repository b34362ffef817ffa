//! 模拟传感器发布程序：按固定间隔向各 topic 发布随机读数，Ctrl-C 退出。

mod reading;

use bridge_config::PublisherConfig;
use bridge_ingest::mqtt::qos_from_u8;
use bridge_telemetry::{init_tracing, targets};
use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rumqttc::{AsyncClient, MqttOptions};
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = match PublisherConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(target: targets::PUBLISHER, error = %err, "config_invalid");
            return Err(err.into());
        }
    };

    let mut options = MqttOptions::new(
        config.mqtt_client_id.clone(),
        config.mqtt_broker.host.clone(),
        config.mqtt_broker.port,
    );
    options.set_keep_alive(Duration::from_secs(30));
    if let (Some(username), Some(password)) = (&config.mqtt_username, &config.mqtt_password) {
        options.set_credentials(username, password);
    }
    let (client, mut eventloop) = AsyncClient::new(options, 10);
    let eventloop_task = tokio::spawn(async move {
        loop {
            if let Err(err) = eventloop.poll().await {
                warn!(target: targets::PUBLISHER, error = %err, "mqtt_eventloop_error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    });

    info!(
        target: targets::PUBLISHER,
        broker = %config.mqtt_broker,
        interval_ms = config.interval_ms,
        topics = config.topics.len(),
        "publisher_started"
    );

    let mut rng = StdRng::from_entropy();
    let published = publish_until(&client, &config, &mut rng, shutdown_signal()).await;
    info!(target: targets::PUBLISHER, published, "shutdown_signal");

    if let Err(err) = client.disconnect().await {
        warn!(target: targets::PUBLISHER, error = %err, "mqtt_disconnect_failed");
    }
    // 留出时间发送 DISCONNECT
    tokio::time::sleep(Duration::from_millis(200)).await;
    eventloop_task.abort();
    info!(target: targets::PUBLISHER, "publisher_stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(target: targets::PUBLISHER, error = %err, "ctrl_c_handler_failed");
        std::future::pending::<()>().await;
    }
}

/// 按间隔发布读数，直到 `shutdown` 完成；返回成功发布的条数。
///
/// `shutdown` 只创建一次，发布等待期间到达的信号在下一轮被观察到。
async fn publish_until<F>(
    client: &AsyncClient,
    config: &PublisherConfig,
    rng: &mut StdRng,
    shutdown: F,
) -> u64
where
    F: Future<Output = ()>,
{
    let qos = qos_from_u8(config.mqtt_qos);
    let mut ticker = tokio::time::interval(Duration::from_millis(config.interval_ms));
    let mut published = 0;
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => return published,
            _ = ticker.tick() => {
                let now = Utc::now();
                for route in &config.topics {
                    let value = reading::sample(route.kind, &mut *rng);
                    let payload = reading::payload(route.kind, value, &config.location, now);
                    match client.publish(route.topic.clone(), qos, false, payload).await {
                        Ok(()) => {
                            published += 1;
                            info!(
                                target: targets::PUBLISHER,
                                topic = %route.topic,
                                kind = %route.kind,
                                value,
                                "reading_published"
                            );
                        }
                        Err(err) => warn!(
                            target: targets::PUBLISHER,
                            topic = %route.topic,
                            error = %err,
                            "reading_publish_failed"
                        ),
                    }
                }
            }
        }
    }
}
