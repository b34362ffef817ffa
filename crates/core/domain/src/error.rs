/// 总线或存储连接错误。
///
/// 该类错误对会话是致命的：运行循环终止并上抛至进程边界。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("broker refused: {0}")]
    RefusedByBroker(String),
    #[error("storage refused: {0}")]
    RefusedByStorage(String),
    #[error("broker connection lost: {0}")]
    BrokerLost(String),
    #[error("storage connection lost: {0}")]
    StorageLost(String),
    #[error("timeout: {0}")]
    Timeout(String),
}
