//! Per-subscription TP message reference allocator.
//!
//! The last used value is recovered at SIM-load time and persisted after
//! every allocation to both the SIM-resident record and the subscription
//! store. The two writes are deliberately redundant; at load time the SIM
//! value wins whenever it is set, since a SIM moved to another device must
//! keep its sequence and the subscription record is the stale copy then.

use crate::config::StackConfig;
use crate::platform::stores::{SimRecords, SubscriptionStore, TPMR_NOT_SET};

pub struct MessageRefAllocator {
    sub_id: i32,
    last: i32,
}

impl MessageRefAllocator {
    pub fn new(sub_id: i32) -> Self {
        Self { sub_id, last: TPMR_NOT_SET }
    }

    /// Recover the last used value. Read failures from either store are
    /// non-fatal and fall back to the other source or the not-set sentinel.
    pub fn load(&mut self, sim: &dyn SimRecords, subs: &dyn SubscriptionStore) {
        let from_sim = sim.tpmr().unwrap_or_else(|e| {
            tracing::warn!("TP-MR read from SIM failed: {e}");
            TPMR_NOT_SET
        });
        self.last = if from_sim >= 0 {
            from_sim
        } else {
            subs.last_tpmr(self.sub_id).unwrap_or_else(|e| {
                tracing::warn!("TP-MR read from subscription store failed: {e}");
                TPMR_NOT_SET
            })
        };
        tracing::debug!("TP-MR loaded for sub {}: {}", self.sub_id, self.last);
    }

    /// Allocate the next TP-MR: `(previous + 1) mod 256`, persisted to both
    /// stores. When framework-side numbering is disabled the radio owns the
    /// sequence and this always hands out the 0 sentinel without persisting.
    pub fn next(
        &mut self,
        config: &StackConfig,
        sim: &mut dyn SimRecords,
        subs: &mut dyn SubscriptionStore,
    ) -> u8 {
        if !config.message_ref_via_framework {
            return 0;
        }

        self.last = (self.last + 1).rem_euclid(256);
        if let Err(e) = sim.set_tpmr(self.last) {
            tracing::warn!("TP-MR write to SIM failed: {e}");
        }
        if let Err(e) = subs.set_last_tpmr(self.sub_id, self.last) {
            tracing::warn!("TP-MR write to subscription store failed: {e}");
        }
        self.last as u8
    }

    pub fn last(&self) -> i32 {
        self.last
    }
}
