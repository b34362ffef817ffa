//! 状态接口的 DTO 与响应契约。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 标准 API 响应封装。
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 健康检查响应体。
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthDto {
    pub ok: bool,
}

/// 接入会话状态快照。
///
/// `written` 以读数类型名（如 `temperature`）为键，`rejected` 以拒绝原因标签为键。
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusDto {
    pub state: String,
    pub written: BTreeMap<String, u64>,
    pub rejected: BTreeMap<String, u64>,
    pub write_failures: u64,
    pub total_written: u64,
    pub total_rejected: u64,
}
