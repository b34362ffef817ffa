//! 存储层错误类型
//!
//! 写入错误只影响当前消息：
//! - Unreachable：存储不可达（连接失败、超时、5xx）
//! - Rejected：存储拒绝该点位（4xx、编码失败）

use crate::line_protocol::EncodeError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    #[error("storage unreachable: {0}")]
    Unreachable(String),
    #[error("point rejected: {0}")]
    Rejected(String),
}

impl From<EncodeError> for WriteError {
    fn from(err: EncodeError) -> Self {
        Self::Rejected(err.to_string())
    }
}
