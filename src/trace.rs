//! Diagnostic tracing.
//!
//! [`Tracer`] is a bounded ring of method-call records any component may
//! write into; once full, each append drops the oldest record. Draining via
//! [`Tracer::take`] is retry-safe: the returned snapshot can be rolled back
//! to the head of the buffer if shipping it somewhere else fails.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::transport::Transport;

/// Ring capacity. Once full, the oldest record is dropped per append.
const MAX_TRACE_RECORDS: usize = 1024;

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRecord {
    pub tag: String,
    pub id: Option<String>,
    pub data: Option<serde_json::Value>,
    /// Epoch millis at record time.
    pub timestamp: i64,
}

#[derive(Debug, Default)]
struct TraceBuffer {
    enabled: bool,
    disposed: bool,
    records: VecDeque<TraceRecord>,
}

/// Thread-safe trace recorder. Low contention and small, so a single mutex
/// guards everything.
#[derive(Debug)]
pub struct Tracer {
    id: Option<String>,
    buffer: Arc<Mutex<TraceBuffer>>,
}

impl Tracer {
    pub fn new(id: Option<String>) -> Self {
        Self {
            id,
            buffer: Arc::new(Mutex::new(TraceBuffer {
                enabled: true,
                disposed: false,
                records: VecDeque::new(),
            })),
        }
    }

    /// Appends a record iff tracing is enabled and the tracer not disposed.
    pub fn trace(&self, tag: impl Into<String>, data: Option<serde_json::Value>) {
        let mut buffer = self.buffer.lock().unwrap();
        if !buffer.enabled || buffer.disposed {
            return;
        }
        if buffer.records.len() == MAX_TRACE_RECORDS {
            buffer.records.pop_front();
        }
        buffer.records.push_back(TraceRecord {
            tag: tag.into(),
            id: self.id.clone(),
            data,
            timestamp: chrono::Utc::now().timestamp_millis(),
        });
    }

    /// Toggles capture. Any actual state change wipes the buffer — enabling
    /// and disabling both start from a clean slate.
    pub fn set_enabled(&self, enabled: bool) {
        let mut buffer = self.buffer.lock().unwrap();
        if buffer.disposed || buffer.enabled == enabled {
            return;
        }
        buffer.enabled = enabled;
        buffer.records.clear();
    }

    /// Atomically snapshots and empties the buffer. Call
    /// [`TraceSnapshot::rollback`] if the drained records could not be
    /// delivered and must not be lost.
    pub fn take(&self) -> TraceSnapshot {
        let mut buffer = self.buffer.lock().unwrap();
        TraceSnapshot {
            records: std::mem::take(&mut buffer.records).into(),
            buffer: self.buffer.clone(),
        }
    }

    /// Permanently discards the buffer. Further traces are silent no-ops.
    pub fn dispose(&self) {
        let mut buffer = self.buffer.lock().unwrap();
        buffer.disposed = true;
        buffer.records.clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.buffer.lock().unwrap().records.len()
    }
}

/// A drained batch of trace records.
pub struct TraceSnapshot {
    pub records: Vec<TraceRecord>,
    buffer: Arc<Mutex<TraceBuffer>>,
}

impl TraceSnapshot {
    /// Re-inserts the snapshot at the head of the buffer, preserving the
    /// original chronological order. No-op after [`Tracer::dispose`].
    pub fn rollback(self) {
        let mut buffer = self.buffer.lock().unwrap();
        if buffer.disposed {
            return;
        }
        for record in self.records.into_iter().rev() {
            buffer.records.push_front(record);
        }
        while buffer.records.len() > MAX_TRACE_RECORDS {
            buffer.records.pop_front();
        }
    }
}

/// Forwarding wrapper that traces every [`Transport`] call. Statically typed
/// stand-in for a reflective proxy: each delegated method records its name
/// and payload around the call.
pub struct TracedTransport {
    inner: Arc<dyn Transport>,
    tracer: Arc<Tracer>,
}

impl TracedTransport {
    pub fn new(inner: Arc<dyn Transport>, tracer: Arc<Tracer>) -> Self {
        Self { inner, tracer }
    }
}

#[async_trait]
impl Transport for TracedTransport {
    async fn send(&self, text: &str) -> Result<()> {
        self.tracer
            .trace("send", Some(serde_json::Value::String(text.to_string())));
        let result = self.inner.send(text).await;
        if let Err(e) = &result {
            self.tracer
                .trace("send-error", Some(serde_json::Value::String(e.to_string())));
        }
        result
    }

    async fn close(&self) -> Result<()> {
        self.tracer.trace("close", None);
        let result = self.inner.close().await;
        if let Err(e) = &result {
            self.tracer
                .trace("close-error", Some(serde_json::Value::String(e.to_string())));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(tracer: &Tracer) -> Vec<String> {
        tracer
            .buffer
            .lock()
            .unwrap()
            .records
            .iter()
            .map(|r| r.tag.clone())
            .collect()
    }

    #[test]
    fn trace_appends_in_order() {
        let tracer = Tracer::new(Some("conn-1".into()));
        tracer.trace("first", None);
        tracer.trace("second", Some(serde_json::json!({ "n": 2 })));
        assert_eq!(tags(&tracer), vec!["first", "second"]);

        let record = &tracer.buffer.lock().unwrap().records[0];
        assert_eq!(record.id.as_deref(), Some("conn-1"));
    }

    #[test]
    fn toggling_enabled_clears_history_both_ways() {
        let tracer = Tracer::new(None);
        tracer.trace("kept?", None);
        tracer.set_enabled(false);
        assert_eq!(tracer.len(), 0);

        // Disabled: nothing is recorded.
        tracer.trace("dropped", None);
        assert_eq!(tracer.len(), 0);

        // Re-enabling also wipes (fresh start on any actual change).
        tracer.set_enabled(true);
        tracer.trace("fresh", None);
        tracer.set_enabled(true); // no change, no wipe
        assert_eq!(tags(&tracer), vec!["fresh"]);
    }

    #[test]
    fn take_drains_and_rollback_restores_head_order() {
        let tracer = Tracer::new(None);
        tracer.trace("a", None);
        tracer.trace("b", None);

        let snapshot = tracer.take();
        assert_eq!(tracer.len(), 0);
        assert_eq!(snapshot.records.len(), 2);

        // New traffic lands while the batch is in flight.
        tracer.trace("c", None);

        // Shipping failed: roll back. Snapshot goes back to the head.
        snapshot.rollback();
        assert_eq!(tags(&tracer), vec!["a", "b", "c"]);
    }

    #[test]
    fn full_ring_drops_the_oldest_records() {
        let tracer = Tracer::new(None);
        for i in 0..MAX_TRACE_RECORDS + 10 {
            tracer.trace(format!("tag-{i}"), None);
        }
        assert_eq!(tracer.len(), MAX_TRACE_RECORDS);
        assert_eq!(tags(&tracer).first().map(String::as_str), Some("tag-10"));
        assert_eq!(
            tags(&tracer).last().map(String::as_str),
            Some(format!("tag-{}", MAX_TRACE_RECORDS + 9).as_str())
        );
    }

    #[test]
    fn dispose_is_irreversible() {
        let tracer = Tracer::new(None);
        tracer.trace("a", None);
        let snapshot = tracer.take();

        tracer.dispose();
        tracer.trace("late", None);
        snapshot.rollback();
        assert_eq!(tracer.len(), 0);
    }

    #[tokio::test]
    async fn traced_transport_records_delegated_calls() {
        use crate::transport::mock::MockTransport;

        let inner = Arc::new(MockTransport::default());
        let tracer = Arc::new(Tracer::new(None));
        let traced = TracedTransport::new(inner.clone(), tracer.clone());

        traced.send("hello").await.unwrap();
        traced.close().await.unwrap();

        assert_eq!(inner.sent_frames(), vec!["hello"]);
        assert_eq!(tags(&tracer), vec!["send", "close"]);
    }
}
