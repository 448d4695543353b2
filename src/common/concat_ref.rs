//! Process-wide concatenation reference counter.
//!
//! Every multi-part message gets an 8-bit reference shared by all of its
//! parts so the receiver can reassemble them. The counter lives for the
//! process, is seeded once on first use so consecutive process restarts do
//! not reuse the same sequence, wraps at 255 and is independent of the
//! per-unit TP message reference.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

static CONCAT_REF: OnceLock<AtomicU8> = OnceLock::new();

fn cell() -> &'static AtomicU8 {
    CONCAT_REF.get_or_init(|| {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as u8;
        AtomicU8::new(seed)
    })
}

/// Next concatenation reference, wrapping.
pub fn next_concatenated_ref() -> u8 {
    cell().fetch_add(1, Ordering::Relaxed).wrapping_add(1)
}
