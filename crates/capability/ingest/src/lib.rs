//! 总线接入：订阅 topic 并以接收循环的形式交付原始消息。

pub mod channel;
pub mod mqtt;

pub use channel::{ChannelBus, ChannelBusHandle, channel};
pub use mqtt::{MqttBusClient, MqttBusConfig};
pub use domain::topic_matches;

use async_trait::async_trait;
use domain::{BrokerAddress, ConnectionError, RawMessage};
use std::time::Duration;

/// 发布/订阅总线客户端抽象。
///
/// 句柄由接入会话独占持有。`recv` 必须可安全取消：会话在等待消息的同时观察停止信号。
#[async_trait]
pub trait BusClient: Send {
    /// 连接总线，超时或被拒绝均为致命错误。
    async fn connect(
        &mut self,
        broker: &BrokerAddress,
        timeout: Duration,
    ) -> Result<(), ConnectionError>;

    /// 订阅 topic，返回前必须拿到确认。
    async fn subscribe(&mut self, topic: &str) -> Result<(), ConnectionError>;

    /// 下一条消息；`Ok(None)` 表示消息流已结束。
    async fn recv(&mut self) -> Result<Option<RawMessage>, ConnectionError>;

    /// 断开连接并释放订阅；可重复调用。
    async fn disconnect(&mut self);
}
