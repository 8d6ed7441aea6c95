//! Audit trail for accept/reject decisions
//!
//! Every policy check and every skipped archive entry is reported to an
//! [`AuditSink`]. The sink is handed to the components that need it as an
//! explicit `Arc<dyn AuditSink>` parameter; nothing in this crate reads the
//! records back.
//!
//! # Examples
//!
//! ```
//! use modbridge::audit::{AuditRecord, AuditSink, MemoryAuditSink, Verdict};
//!
//! let sink = MemoryAuditSink::new();
//! sink.record(AuditRecord::new("type_filter", "Barracks", Verdict::Rejected, "Forbidden type: STRUCTURE"));
//!
//! assert_eq!(sink.rejection_counts().get("Forbidden type: STRUCTURE"), Some(&1));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Outcome attached to an audit record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Accepted,
    Rejected,
    /// Input was passed over without a decision (corrupt entry, unreadable container)
    Skipped,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Accepted => write!(f, "accepted"),
            Verdict::Rejected => write!(f, "rejected"),
            Verdict::Skipped => write!(f, "skipped"),
        }
    }
}

/// One append-only audit entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    /// Name of the check or stage that produced the record (e.g. `type_filter`)
    pub operation: String,
    /// Object, weapon, unit or archive entry the decision is about
    pub target: String,
    pub verdict: Verdict,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AuditRecord {
    pub fn new(
        operation: impl Into<String>,
        target: impl Into<String>,
        verdict: Verdict,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            operation: operation.into(),
            target: target.into(),
            verdict,
            reason: reason.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Receiver for audit records
///
/// Implementations must serialize concurrent calls themselves; the engine may
/// share one sink between threads.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord);
}

/// Shared handle type used throughout the engine
pub type SharedAuditSink = Arc<dyn AuditSink>;

/// Discards every record
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _record: AuditRecord) {}
}

/// Forwards records to `tracing` as structured events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: AuditRecord) {
        let details = record.details.as_deref().unwrap_or("");
        match record.verdict {
            Verdict::Accepted => tracing::info!(
                target: "modbridge::audit",
                operation = %record.operation,
                target_name = %record.target,
                verdict = %record.verdict,
                details,
                "{}",
                record.reason
            ),
            Verdict::Rejected | Verdict::Skipped => tracing::warn!(
                target: "modbridge::audit",
                operation = %record.operation,
                target_name = %record.target,
                verdict = %record.verdict,
                details,
                "{}",
                record.reason
            ),
        }
    }
}

/// Keeps every record in memory, in arrival order
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records received so far
    pub fn records(&self) -> Vec<AuditRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of rejections per reason string
    pub fn rejection_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in self.lock().iter() {
            if record.verdict == Verdict::Rejected {
                *counts.entry(record.reason.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AuditRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: AuditRecord) {
        self.lock().push(record);
    }
}
