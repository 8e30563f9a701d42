//! [`RequestLog`]: bounded record of recent RPCs for `/debug/requests`.
//!
//! Records hold method, timing and outcome only. Payloads, key material and
//! tokens never reach this module.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, PoisonError},
    time::{Instant, SystemTime, UNIX_EPOCH},
};

use common::{
    protocol::{Outcome, TraceRecord},
    PluginError,
};

/// Number of records kept when no capacity is given.
pub const DEFAULT_CAPACITY: usize = 128;

/// An RPC that has started but not yet been recorded.
#[derive(Debug)]
pub struct CallTrace {
    pub id: String,
    method: &'static str,
    started_at_ms: u64,
    started: Instant,
}

/// Shared ring buffer of [`TraceRecord`]s, newest at the back.
///
/// The lock is only held to push or copy records, never across an `.await`.
#[derive(Clone, Debug)]
pub struct RequestLog {
    inner: Arc<Mutex<VecDeque<TraceRecord>>>,
    capacity: usize,
}

impl RequestLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Start timing a call to `method`.
    pub fn begin(&self, method: &'static str) -> CallTrace {
        let started_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        CallTrace {
            id: uuid::Uuid::new_v4().to_string(),
            method,
            started_at_ms,
            started: Instant::now(),
        }
    }

    /// Record the outcome of `call`, evicting the oldest record when full.
    pub fn finish(&self, call: CallTrace, error: Option<&PluginError>) {
        if self.capacity == 0 {
            return;
        }
        let record = TraceRecord {
            id: call.id,
            method: call.method.to_owned(),
            started_at_ms: call.started_at_ms,
            duration_ms: call.started.elapsed().as_millis() as u64,
            outcome: if error.is_some() {
                Outcome::Error
            } else {
                Outcome::Ok
            },
            error_kind: error.map(|e| e.kind().to_owned()),
        };
        let mut records = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Copy of all records, newest first.
    pub fn recent(&self) -> Vec<TraceRecord> {
        let records = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        records.iter().rev().cloned().collect()
    }
}

impl Default for RequestLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
