//! Anomaly sink for protocol violations that must not crash the loop.
//!
//! Reports are keyed by a stable id so downstream aggregation can bucket
//! occurrences across devices and releases. Besides the injected reporter,
//! a small rolling buffer of recent reports is kept in-process for
//! diagnostic surfaces.

use std::collections::VecDeque;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use uuid::Uuid;

/// Carrier messaging service produced no result before the timeout.
pub const ANOMALY_CARRIER_NO_RESPONSE: Uuid =
    Uuid::from_u128(0x91b24a0e_6f04_4c1f_9d73_0a5c2e81d440);
/// A carrier completion callback arrived for an already-completed batch.
pub const ANOMALY_DUPLICATE_CALLBACK: Uuid =
    Uuid::from_u128(0x3d7f5c21_88ab_4e0d_b1c6_54f09a72e913);
/// A completion or consent decision referenced no live tracked unit.
pub const ANOMALY_ORPHAN_COMPLETION: Uuid =
    Uuid::from_u128(0x5a0ec3b7_21d9_47f5_8c2e_d16b94a07af2);
/// A send failed with an error class outside the expected failure set.
pub const ANOMALY_UNEXPECTED_SEND_ERROR: Uuid =
    Uuid::from_u128(0xc48a1f66_0b3d_4ab8_92e4_7d50c3f8b12a);

pub trait AnomalyReporter: Send {
    fn report(&mut self, id: Uuid, message: &str);
}

#[derive(Debug, Clone)]
pub struct AnomalyRecord {
    pub id: Uuid,
    pub message: String,
}

// Rolling buffer only; unbounded growth is not acceptable here.
const MAX_RECENT: usize = 32;

static RECENT: Lazy<Mutex<VecDeque<AnomalyRecord>>> =
    Lazy::new(|| Mutex::new(VecDeque::new()));

/// Default reporter: logs the report and records it in the process-wide
/// rolling buffer.
pub struct TracingAnomalyReporter;

impl AnomalyReporter for TracingAnomalyReporter {
    fn report(&mut self, id: Uuid, message: &str) {
        tracing::error!("anomaly {}: {}", id, message);
        let mut recent = RECENT.lock().unwrap();
        recent.push_front(AnomalyRecord { id, message: message.to_string() });
        while recent.len() > MAX_RECENT {
            recent.pop_back();
        }
    }
}

/// Snapshot of recently reported anomalies, newest first.
pub fn recent() -> Vec<AnomalyRecord> {
    RECENT.lock().unwrap().iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_buffer_is_bounded() {
        let mut reporter = TracingAnomalyReporter;
        for i in 0..(MAX_RECENT + 10) {
            reporter.report(ANOMALY_ORPHAN_COMPLETION, &format!("report {i}"));
        }
        assert!(recent().len() <= MAX_RECENT);
        assert_eq!(recent()[0].message, format!("report {}", MAX_RECENT + 9));
    }
}
