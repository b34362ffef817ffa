//! 点位写入内存实现
//!
//! 克隆出的句柄共享同一份状态：写入器交给会话独占后，测试仍可通过克隆句柄观察写入结果。

use crate::error::WriteError;
use crate::line_protocol::encode_point;
use crate::traits::PointWriter;
use async_trait::async_trait;
use domain::{ConnectionError, Point};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

#[derive(Default)]
struct InMemoryState {
    points: RwLock<Vec<Point>>,
    failures: Mutex<VecDeque<WriteError>>,
    connect_refusal: Mutex<Option<String>>,
    write_delay: Mutex<Option<Duration>>,
    attempts: AtomicU64,
    connected: AtomicBool,
    closed: AtomicBool,
}

/// 点位写入内存存储
#[derive(Clone, Default)]
pub struct InMemoryPointWriter {
    state: Arc<InMemoryState>,
}

impl InMemoryPointWriter {
    /// 创建新的内存写入器
    pub fn new() -> Self {
        Self::default()
    }

    /// 已成功写入的点位（按写入顺序）
    pub fn points(&self) -> Vec<Point> {
        self.state
            .points
            .read()
            .map(|points| points.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.state.points.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 写入尝试次数（含失败）
    pub fn attempts(&self) -> u64 {
        self.state.attempts.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// 下一次写入返回指定错误（可多次调用排队）
    pub fn fail_next(&self, err: WriteError) {
        if let Ok(mut failures) = self.state.failures.lock() {
            failures.push_back(err);
        }
    }

    /// 使 `connect` 以指定原因失败
    pub fn refuse_connect(&self, reason: impl Into<String>) {
        if let Ok(mut refusal) = self.state.connect_refusal.lock() {
            *refusal = Some(reason.into());
        }
    }

    /// 每次写入前等待指定时长（模拟阻塞写入）
    pub fn set_write_delay(&self, delay: Duration) {
        if let Ok(mut slot) = self.state.write_delay.lock() {
            *slot = Some(delay);
        }
    }

    fn take_failure(&self) -> Option<WriteError> {
        self.state
            .failures
            .lock()
            .ok()
            .and_then(|mut failures| failures.pop_front())
    }

    fn write_delay(&self) -> Option<Duration> {
        self.state.write_delay.lock().ok().and_then(|slot| *slot)
    }
}

#[async_trait]
impl PointWriter for InMemoryPointWriter {
    async fn connect(&mut self) -> Result<(), ConnectionError> {
        let refusal = self
            .state
            .connect_refusal
            .lock()
            .map_err(|_| ConnectionError::RefusedByStorage("lock failed".to_string()))?
            .clone();
        if let Some(reason) = refusal {
            return Err(ConnectionError::RefusedByStorage(reason));
        }
        self.state.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn write(&mut self, point: &Point) -> Result<(), WriteError> {
        self.state.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.write_delay() {
            tokio::time::sleep(delay).await;
        }
        if self.is_closed() {
            return Err(WriteError::Unreachable("writer closed".to_string()));
        }
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        // 与真实存储一致：无法编码的点位被拒绝
        encode_point(point)?;
        let mut points = self
            .state
            .points
            .write()
            .map_err(|_| WriteError::Unreachable("lock failed".to_string()))?;
        points.push(point.clone());
        Ok(())
    }

    async fn close(&mut self) {
        self.state.closed.store(true, Ordering::SeqCst);
        self.state.connected.store(false, Ordering::SeqCst);
    }
}
