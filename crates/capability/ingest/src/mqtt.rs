//! MQTT 总线客户端（rumqttc）。
//!
//! 单连接承载全部订阅；连接、订阅阶段逐个等待 ConnAck / SubAck，
//! 期间收到的 Publish 暂存，进入运行态后按到达顺序交付。

use crate::BusClient;
use async_trait::async_trait;
use bridge_telemetry::targets;
use chrono::Utc;
use domain::{BrokerAddress, ConnectionError, RawMessage};
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
    SubscribeReasonCode,
};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

/// MQTT 客户端配置。
#[derive(Debug, Clone)]
pub struct MqttBusConfig {
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive: Duration,
    pub qos: u8,
}

/// MQTT 总线客户端。
pub struct MqttBusClient {
    config: MqttBusConfig,
    client: Option<AsyncClient>,
    eventloop: Option<EventLoop>,
    pending: VecDeque<RawMessage>,
    ack_timeout: Duration,
}

impl MqttBusClient {
    pub fn new(config: MqttBusConfig) -> Self {
        Self {
            config,
            client: None,
            eventloop: None,
            pending: VecDeque::new(),
            ack_timeout: Duration::from_secs(10),
        }
    }
}

#[async_trait]
impl BusClient for MqttBusClient {
    async fn connect(
        &mut self,
        broker: &BrokerAddress,
        timeout: Duration,
    ) -> Result<(), ConnectionError> {
        let mut options =
            MqttOptions::new(self.config.client_id.clone(), broker.host.clone(), broker.port);
        options.set_keep_alive(self.config.keep_alive);
        if let (Some(username), Some(password)) =
            (self.config.username.as_ref(), self.config.password.as_ref())
        {
            options.set_credentials(username, password);
        }

        let (client, mut eventloop) = AsyncClient::new(options, 64);
        self.ack_timeout = timeout;
        let connack = tokio::time::timeout(timeout, wait_connack(&mut eventloop, &mut self.pending))
            .await
            .map_err(|_| ConnectionError::Timeout(format!("connect to {}", broker)))?;
        connack?;

        info!(
            target: targets::INGEST,
            broker = %broker,
            client_id = %self.config.client_id,
            "mqtt_connected"
        );
        self.client = Some(client);
        self.eventloop = Some(eventloop);
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), ConnectionError> {
        let (Some(client), Some(eventloop)) = (self.client.as_ref(), self.eventloop.as_mut()) else {
            return Err(ConnectionError::RefusedByBroker("not connected".to_string()));
        };
        client
            .subscribe(topic, qos_from_u8(self.config.qos))
            .await
            .map_err(|err| ConnectionError::RefusedByBroker(err.to_string()))?;
        let suback = tokio::time::timeout(
            self.ack_timeout,
            wait_suback(eventloop, &mut self.pending, topic),
        )
        .await
        .map_err(|_| ConnectionError::Timeout(format!("subscribe to {}", topic)))?;
        suback?;
        info!(target: targets::INGEST, topic = %topic, qos = self.config.qos, "mqtt_subscribed");
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<RawMessage>, ConnectionError> {
        if let Some(message) = self.pending.pop_front() {
            return Ok(Some(message));
        }
        let Some(eventloop) = self.eventloop.as_mut() else {
            return Err(ConnectionError::BrokerLost("not connected".to_string()));
        };
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return Ok(Some(RawMessage::new(
                        publish.topic,
                        publish.payload.to_vec(),
                        Utc::now(),
                    )));
                }
                Ok(event) => debug!(target: targets::INGEST, event = ?event, "mqtt_event"),
                Err(err) => return Err(ConnectionError::BrokerLost(err.to_string())),
            }
        }
    }

    async fn disconnect(&mut self) {
        let (Some(client), Some(mut eventloop)) = (self.client.take(), self.eventloop.take())
        else {
            return;
        };
        if let Err(err) = client.disconnect().await {
            warn!(target: targets::INGEST, error = %err, "mqtt_disconnect_failed");
            return;
        }
        // 继续轮询直到 DISCONNECT 报文发出
        let flushed = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;
        if flushed.is_err() {
            warn!(target: targets::INGEST, "mqtt_disconnect_flush_timeout");
        }
        self.pending.clear();
        info!(target: targets::INGEST, client_id = %self.config.client_id, "mqtt_disconnected");
    }
}

async fn wait_connack(
    eventloop: &mut EventLoop,
    pending: &mut VecDeque<RawMessage>,
) -> Result<(), ConnectionError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    return Ok(());
                }
                return Err(ConnectionError::RefusedByBroker(format!("{:?}", ack.code)));
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => pending.push_back(RawMessage::new(
                publish.topic,
                publish.payload.to_vec(),
                Utc::now(),
            )),
            Ok(_) => {}
            Err(rumqttc::ConnectionError::ConnectionRefused(code)) => {
                return Err(ConnectionError::RefusedByBroker(format!("{:?}", code)));
            }
            Err(err) => return Err(ConnectionError::RefusedByBroker(err.to_string())),
        }
    }
}

async fn wait_suback(
    eventloop: &mut EventLoop,
    pending: &mut VecDeque<RawMessage>,
    topic: &str,
) -> Result<(), ConnectionError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                if ack
                    .return_codes
                    .iter()
                    .any(|code| matches!(code, SubscribeReasonCode::Failure))
                {
                    return Err(ConnectionError::RefusedByBroker(format!(
                        "subscription refused: {}",
                        topic
                    )));
                }
                return Ok(());
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => pending.push_back(RawMessage::new(
                publish.topic,
                publish.payload.to_vec(),
                Utc::now(),
            )),
            Ok(_) => {}
            Err(err) => return Err(ConnectionError::BrokerLost(err.to_string())),
        }
    }
}

pub fn qos_from_u8(value: u8) -> QoS {
    match value {
        0 => QoS::AtMostOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qos_mapping() {
        assert_eq!(qos_from_u8(0), QoS::AtMostOnce);
        assert_eq!(qos_from_u8(1), QoS::AtLeastOnce);
        assert_eq!(qos_from_u8(2), QoS::ExactlyOnce);
    }

    #[tokio::test]
    async fn recv_before_connect_is_connection_lost() {
        let mut client = MqttBusClient::new(MqttBusConfig {
            client_id: "test".to_string(),
            username: None,
            password: None,
            keep_alive: Duration::from_secs(30),
            qos: 1,
        });
        let err = client.recv().await.expect_err("not connected");
        assert!(matches!(err, ConnectionError::BrokerLost(_)));
        let err = client.subscribe("data/temperature").await.expect_err("not connected");
        assert!(matches!(err, ConnectionError::RefusedByBroker(_)));
        client.disconnect().await;
    }

    #[tokio::test]
    async fn connect_to_closed_port_is_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let mut client = MqttBusClient::new(MqttBusConfig {
            client_id: "test".to_string(),
            username: None,
            password: None,
            keep_alive: Duration::from_secs(30),
            qos: 1,
        });
        let err = client
            .connect(&BrokerAddress::new("127.0.0.1", port), Duration::from_secs(2))
            .await
            .expect_err("refused");
        assert!(matches!(
            err,
            ConnectionError::RefusedByBroker(_) | ConnectionError::Timeout(_)
        ));
    }
}
