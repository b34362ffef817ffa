//! 接入会话：Idle → Connecting → Running → Draining → Closed。

use crate::counters::{CountersHandle, SessionCounters};
use crate::policy::{DeliveryPolicy, Disposition};
use bridge_ingest::BusClient;
use bridge_normalize::{Normalizer, RejectReason};
use bridge_storage::{PointWriter, WriteError};
use bridge_telemetry::targets;
use domain::{BrokerAddress, ConnectionError, RawMessage, TopicRoute};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Running,
    Draining,
    Closed,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Running => "running",
            SessionState::Draining => "draining",
            SessionState::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 会话错误。`Connection` 对会话是致命的。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error("operation not allowed in state {0}")]
    InvalidState(SessionState),
}

/// 会话参数。
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub broker: BrokerAddress,
    pub connect_timeout: Duration,
    /// 订阅顺序即配置顺序。
    pub routes: Vec<TopicRoute>,
    pub tag_keys: Vec<String>,
    pub max_consecutive_unreachable: u32,
}

/// 单条消息的处理结果（非致命）。
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Written,
    Rejected(RejectReason),
    WriteFailed(WriteError),
}

enum Next {
    Stop,
    Received(Result<Option<RawMessage>, ConnectionError>),
}

/// 接入会话。
///
/// 独占持有总线与写入器句柄；计数器通过 [`CountersHandle`] 只读共享。
pub struct IngestionSession {
    config: SessionConfig,
    bus: Box<dyn BusClient>,
    writer: Box<dyn PointWriter>,
    normalizer: Normalizer,
    policy: DeliveryPolicy,
    counters: Arc<SessionCounters>,
    state: watch::Sender<SessionState>,
}

impl IngestionSession {
    pub fn new(
        config: SessionConfig,
        bus: Box<dyn BusClient>,
        writer: Box<dyn PointWriter>,
    ) -> Self {
        let normalizer = Normalizer::new(config.routes.clone(), config.tag_keys.clone());
        let policy = DeliveryPolicy::new(config.max_consecutive_unreachable);
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            config,
            bus,
            writer,
            normalizer,
            policy,
            counters: Arc::new(SessionCounters::default()),
            state,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// 状态变化订阅（状态接口使用）。
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn counters(&self) -> CountersHandle {
        CountersHandle::new(self.counters.clone())
    }

    /// 连接总线、逐个订阅 topic 并连接存储。
    ///
    /// 任一步失败都会释放已获取的句柄，会话进入 Closed。
    pub async fn start(&mut self) -> Result<(), SessionError> {
        let state = self.state();
        if state != SessionState::Idle {
            return Err(SessionError::InvalidState(state));
        }
        self.transition(SessionState::Connecting);
        if let Err(err) = self.acquire().await {
            error!(target: targets::SESSION, error = %err, "session_start_failed");
            self.release().await;
            return Err(err.into());
        }
        self.transition(SessionState::Running);
        Ok(())
    }

    async fn acquire(&mut self) -> Result<(), ConnectionError> {
        self.bus
            .connect(&self.config.broker, self.config.connect_timeout)
            .await?;
        for route in &self.config.routes {
            self.bus.subscribe(&route.topic).await?;
            debug!(target: targets::SESSION, topic = %route.topic, kind = %route.kind, "topic_subscribed");
        }
        self.writer.connect().await?;
        info!(
            target: targets::SESSION,
            broker = %self.config.broker,
            topics = self.config.routes.len(),
            "session_connected"
        );
        Ok(())
    }

    /// 处理一条消息：解析 → 时间戳规整 → 映射 → 写入 → 计数。
    ///
    /// 只有投递策略判定为致命时返回 `Err`。
    pub async fn process(&mut self, message: RawMessage) -> Result<ProcessOutcome, SessionError> {
        let state = self.state();
        if state != SessionState::Running {
            return Err(SessionError::InvalidState(state));
        }

        let point = match self.normalizer.to_point(&message) {
            Ok(point) => point,
            Err(reason) => {
                self.counters.record_rejected(&reason);
                warn!(
                    target: targets::SESSION,
                    topic = %message.topic,
                    reason = reason.label(),
                    error = %reason,
                    payload_bytes = message.payload.len(),
                    "message_rejected"
                );
                return match self.policy.on_reject(&reason) {
                    Disposition::Drop => Ok(ProcessOutcome::Rejected(reason)),
                    Disposition::Fatal(cause) => Err(cause.into()),
                };
            }
        };

        match self.writer.write(&point).await {
            Ok(()) => {
                self.policy.on_write_success();
                if let Some(kind) = self.normalizer.parser().kind_for(&message.topic) {
                    self.counters.record_written(kind);
                }
                debug!(
                    target: targets::SESSION,
                    measurement = %point.measurement,
                    time = %point.time,
                    "point_written"
                );
                Ok(ProcessOutcome::Written)
            }
            Err(err) => {
                self.counters.record_write_failure();
                warn!(
                    target: targets::SESSION,
                    measurement = %point.measurement,
                    tags = ?point.tags,
                    fields = ?point.fields,
                    time = %point.time,
                    error = %err,
                    "point_write_failed"
                );
                match self.policy.on_write_error(&err) {
                    Disposition::Drop => Ok(ProcessOutcome::WriteFailed(err)),
                    Disposition::Fatal(cause) => Err(cause.into()),
                }
            }
        }
    }

    /// 接收循环，直到停止信号、消息流结束或致命错误；返回前总会关闭会话。
    ///
    /// 停止信号只在等待消息时被观察，进行中的写入会先完成或失败。
    pub async fn run(&mut self, mut stop: watch::Receiver<bool>) -> Result<(), SessionError> {
        let state = self.state();
        if state != SessionState::Running {
            return Err(SessionError::InvalidState(state));
        }

        let result = loop {
            let next = tokio::select! {
                biased;
                _ = stop_requested(&mut stop) => Next::Stop,
                received = self.bus.recv() => Next::Received(received),
            };
            match next {
                Next::Stop => {
                    info!(target: targets::SESSION, "stop_requested");
                    break Ok(());
                }
                Next::Received(Ok(Some(message))) => {
                    if let Err(err) = self.process(message).await {
                        error!(target: targets::SESSION, error = %err, "session_fatal");
                        break Err(err);
                    }
                }
                Next::Received(Ok(None)) => {
                    info!(target: targets::SESSION, "message_stream_ended");
                    break Ok(());
                }
                Next::Received(Err(err)) => {
                    error!(target: targets::SESSION, error = %err, "bus_connection_lost");
                    break Err(err.into());
                }
            }
        };

        self.shutdown().await;
        result
    }

    /// 释放总线与写入器句柄并进入 Closed；可重复调用。
    pub async fn shutdown(&mut self) {
        if self.state() == SessionState::Closed {
            return;
        }
        self.transition(SessionState::Draining);
        self.release().await;
    }

    async fn release(&mut self) {
        self.bus.disconnect().await;
        self.writer.close().await;
        self.transition(SessionState::Closed);

        let snapshot = self.counters.snapshot();
        info!(
            target: targets::SESSION,
            written = ?snapshot.written,
            rejected = ?snapshot.rejected,
            write_failures = snapshot.write_failures,
            "session_closed"
        );
    }

    fn transition(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        info!(target: targets::SESSION, from = %previous, to = %next, "session_state");
    }
}

/// 停止信号置位时返回；发送端被丢弃则永不返回。
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    if stop.wait_for(|stopped| *stopped).await.is_err() {
        std::future::pending::<()>().await;
    }
}
