use bridge_normalize::RejectReason;
use bridge_storage::WriteError;
use domain::ConnectionError;

/// 失败处置结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// 丢弃当前消息，会话继续运行。
    Drop,
    /// 会话终止。
    Fatal(ConnectionError),
}

/// 投递策略：至多一次，单次失败不重试。
///
/// `max_consecutive_unreachable > 0` 时，连续 N 次 `Unreachable` 视为存储连接丢失。
/// 成功写入或 `Rejected` 会清零连续计数。
#[derive(Debug, Clone, Default)]
pub struct DeliveryPolicy {
    max_consecutive_unreachable: u32,
    unreachable_streak: u32,
}

impl DeliveryPolicy {
    pub fn new(max_consecutive_unreachable: u32) -> Self {
        Self {
            max_consecutive_unreachable,
            unreachable_streak: 0,
        }
    }

    pub fn on_reject(&self, _reason: &RejectReason) -> Disposition {
        Disposition::Drop
    }

    pub fn on_write_success(&mut self) {
        self.unreachable_streak = 0;
    }

    pub fn on_write_error(&mut self, err: &WriteError) -> Disposition {
        match err {
            WriteError::Rejected(_) => {
                self.unreachable_streak = 0;
                Disposition::Drop
            }
            WriteError::Unreachable(reason) => {
                self.unreachable_streak = self.unreachable_streak.saturating_add(1);
                if self.max_consecutive_unreachable > 0
                    && self.unreachable_streak >= self.max_consecutive_unreachable
                {
                    return Disposition::Fatal(ConnectionError::StorageLost(format!(
                        "{} consecutive unreachable writes, last: {}",
                        self.unreachable_streak, reason
                    )));
                }
                Disposition::Drop
            }
        }
    }

    pub fn unreachable_streak(&self) -> u32 {
        self.unreachable_streak
    }
}
