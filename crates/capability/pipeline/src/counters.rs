use bridge_normalize::RejectReason;
use domain::ReadingKind;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// 拒绝原因标签（与 [`RejectReason::label`] 一致）。
pub const REJECT_LABELS: [&str; 5] = [
    "malformed",
    "unknown_topic",
    "missing_value",
    "invalid_value",
    "unparseable_timestamp",
];

/// 会话计数器：进程生命周期内单调递增，只由会话写入。
#[derive(Debug, Default)]
pub struct SessionCounters {
    written: [AtomicU64; ReadingKind::ALL.len()],
    rejected: [AtomicU64; REJECT_LABELS.len()],
    write_failures: AtomicU64,
}

impl SessionCounters {
    pub(crate) fn record_written(&self, kind: ReadingKind) {
        self.written[kind_slot(kind)].fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self, reason: &RejectReason) {
        let label = reason.label();
        if let Some(slot) = REJECT_LABELS.iter().position(|known| *known == label) {
            self.rejected[slot].fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn written(&self, kind: ReadingKind) -> u64 {
        self.written[kind_slot(kind)].load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            written: ReadingKind::ALL
                .iter()
                .map(|kind| (*kind, self.written(*kind)))
                .collect(),
            rejected: REJECT_LABELS
                .iter()
                .zip(self.rejected.iter())
                .map(|(label, count)| (label.to_string(), count.load(Ordering::Relaxed)))
                .collect(),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

fn kind_slot(kind: ReadingKind) -> usize {
    match kind {
        ReadingKind::Temperature => 0,
        ReadingKind::Humidity => 1,
        ReadingKind::Pressure => 2,
        ReadingKind::WindSpeed => 3,
    }
}

/// 计数器只读句柄，可跨任务共享（日志、状态接口）。
#[derive(Debug, Clone)]
pub struct CountersHandle {
    inner: Arc<SessionCounters>,
}

impl CountersHandle {
    pub(crate) fn new(inner: Arc<SessionCounters>) -> Self {
        Self { inner }
    }

    pub fn written(&self, kind: ReadingKind) -> u64 {
        self.inner.written(kind)
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        self.inner.snapshot()
    }
}

/// 计数器快照。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CountersSnapshot {
    pub written: BTreeMap<ReadingKind, u64>,
    pub rejected: BTreeMap<String, u64>,
    pub write_failures: u64,
}

impl CountersSnapshot {
    pub fn written(&self, kind: ReadingKind) -> u64 {
        self.written.get(&kind).copied().unwrap_or(0)
    }

    pub fn rejected(&self, label: &str) -> u64 {
        self.rejected.get(label).copied().unwrap_or(0)
    }

    pub fn total_written(&self) -> u64 {
        self.written.values().sum()
    }

    pub fn total_rejected(&self) -> u64 {
        self.rejected.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_normalize::{ParseError, TimestampError};

    #[test]
    fn snapshot_lists_every_kind_and_label() {
        let counters = SessionCounters::default();
        counters.record_written(ReadingKind::Humidity);
        counters.record_written(ReadingKind::Humidity);
        counters.record_rejected(&RejectReason::Timestamp(TimestampError::Unparseable(
            "yesterday".to_string(),
        )));
        counters.record_rejected(&RejectReason::Parse(ParseError::UnknownTopic(
            "data/x".to_string(),
        )));
        counters.record_write_failure();

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.written.len(), ReadingKind::ALL.len());
        assert_eq!(snapshot.written(ReadingKind::Humidity), 2);
        assert_eq!(snapshot.written(ReadingKind::Temperature), 0);
        assert_eq!(snapshot.rejected.len(), REJECT_LABELS.len());
        assert_eq!(snapshot.rejected("unparseable_timestamp"), 1);
        assert_eq!(snapshot.rejected("unknown_topic"), 1);
        assert_eq!(snapshot.total_rejected(), 2);
        assert_eq!(snapshot.total_written(), 2);
        assert_eq!(snapshot.write_failures, 1);
    }
}
