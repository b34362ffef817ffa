//! 进程内总线（tokio mpsc），用于测试与本地演示。

use crate::{BusClient, topic_matches};
use async_trait::async_trait;
use chrono::Utc;
use domain::{BrokerAddress, CanonicalTimestamp, ConnectionError, RawMessage};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

enum BusEvent {
    Message(RawMessage),
    Lost(String),
}

#[derive(Default)]
struct ChannelBusState {
    subscriptions: Mutex<Vec<String>>,
    refused_topics: Mutex<Vec<String>>,
    refuse_connect: Mutex<Option<String>>,
    connected: AtomicBool,
    disconnects: AtomicUsize,
}

/// 创建一对进程内总线客户端与发布句柄。
///
/// 所有句柄都被丢弃后，客户端的消息流结束。
pub fn channel() -> (ChannelBus, ChannelBusHandle) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let state = Arc::new(ChannelBusState::default());
    (
        ChannelBus {
            receiver,
            state: state.clone(),
        },
        ChannelBusHandle { sender, state },
    )
}

/// 进程内总线客户端。
pub struct ChannelBus {
    receiver: mpsc::UnboundedReceiver<BusEvent>,
    state: Arc<ChannelBusState>,
}

/// 发布端与故障注入句柄。
#[derive(Clone)]
pub struct ChannelBusHandle {
    sender: mpsc::UnboundedSender<BusEvent>,
    state: Arc<ChannelBusState>,
}

impl ChannelBusHandle {
    /// 以当前时刻为到达时间发布一条消息。
    pub fn publish(&self, topic: &str, payload: impl Into<Vec<u8>>) -> bool {
        self.publish_at(topic, payload, Utc::now())
    }

    pub fn publish_at(
        &self,
        topic: &str,
        payload: impl Into<Vec<u8>>,
        arrival_time: CanonicalTimestamp,
    ) -> bool {
        self.sender
            .send(BusEvent::Message(RawMessage::new(
                topic,
                payload,
                arrival_time,
            )))
            .is_ok()
    }

    /// 连接在当前队列之后中断。
    pub fn drop_connection(&self, reason: &str) -> bool {
        self.sender.send(BusEvent::Lost(reason.to_string())).is_ok()
    }

    pub fn refuse_connect(&self, reason: &str) {
        if let Ok(mut guard) = self.state.refuse_connect.lock() {
            *guard = Some(reason.to_string());
        }
    }

    pub fn refuse_subscription(&self, topic: &str) {
        if let Ok(mut guard) = self.state.refused_topics.lock() {
            guard.push(topic.to_string());
        }
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.state
            .subscriptions
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    /// 客户端收到断开请求的次数。
    pub fn disconnects(&self) -> usize {
        self.state.disconnects.load(Ordering::SeqCst)
    }
}

impl ChannelBus {
    fn is_subscribed(&self, topic: &str) -> bool {
        self.state
            .subscriptions
            .lock()
            .map(|guard| guard.iter().any(|filter| topic_matches(filter, topic)))
            .unwrap_or(false)
    }
}

#[async_trait]
impl BusClient for ChannelBus {
    async fn connect(
        &mut self,
        broker: &BrokerAddress,
        _timeout: Duration,
    ) -> Result<(), ConnectionError> {
        let refused = self
            .state
            .refuse_connect
            .lock()
            .ok()
            .and_then(|guard| guard.clone());
        if let Some(reason) = refused {
            return Err(ConnectionError::RefusedByBroker(format!(
                "{}: {}",
                broker, reason
            )));
        }
        self.state.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), ConnectionError> {
        if !self.state.connected.load(Ordering::SeqCst) {
            return Err(ConnectionError::RefusedByBroker("not connected".to_string()));
        }
        let refused = self
            .state
            .refused_topics
            .lock()
            .map(|guard| guard.iter().any(|refused| refused == topic))
            .unwrap_or(false);
        if refused {
            return Err(ConnectionError::RefusedByBroker(format!(
                "subscription refused: {}",
                topic
            )));
        }
        if let Ok(mut guard) = self.state.subscriptions.lock() {
            if !guard.iter().any(|existing| existing == topic) {
                guard.push(topic.to_string());
            }
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<RawMessage>, ConnectionError> {
        if !self.state.connected.load(Ordering::SeqCst) {
            return Err(ConnectionError::BrokerLost("not connected".to_string()));
        }
        loop {
            match self.receiver.recv().await {
                Some(BusEvent::Message(message)) => {
                    if self.is_subscribed(&message.topic) {
                        return Ok(Some(message));
                    }
                }
                Some(BusEvent::Lost(reason)) => {
                    self.state.connected.store(false, Ordering::SeqCst);
                    return Err(ConnectionError::BrokerLost(reason));
                }
                None => return Ok(None),
            }
        }
    }

    async fn disconnect(&mut self) {
        self.state.connected.store(false, Ordering::SeqCst);
        self.state.disconnects.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.state.subscriptions.lock() {
            guard.clear();
        }
    }
}
