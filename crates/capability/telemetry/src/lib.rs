//! 日志初始化与请求 ID 生成。
//!
//! 计数器不在这里：会话计数由接入会话自行持有（见 `bridge-pipeline`）。

use tracing_subscriber::{EnvFilter, fmt};

/// 各能力模块统一使用的日志 target。
pub mod targets {
    pub const INGEST: &str = "bridge.ingest";
    pub const SESSION: &str = "bridge.session";
    pub const STORAGE: &str = "bridge.storage";
    pub const HTTP: &str = "bridge.http";
    pub const PUBLISHER: &str = "bridge.publisher";
}

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 初始化 tracing（默认 info，`RUST_LOG` 覆盖）。
pub fn init_tracing() {
    init_tracing_with_default("info");
}

/// 以指定默认级别初始化 tracing；重复调用不会报错。
pub fn init_tracing_with_default(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}
