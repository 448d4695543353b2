//! Confirmation gating: short-code destination checks, per-caller volume
//! limiting, and resolution of user consent decisions.
//!
//! The state machine per batch is
//! `Unconfirmed -> {Admitted | QueueRejected | SetupRejected | NeverAllowed}`
//! and, when a prompt was raised,
//! `Prompted -> {Allowed | Denied | Dismissed}`.

use super::SmsDispatchEntity;
use crate::common::anomaly::ANOMALY_ORPHAN_COMPLETION;
use crate::common::messagerouter::MessageQueue;
use crate::common::result::SendResult;
use crate::common::send_log::{self, SendPartStatus};
use crate::common::stack_time::StackTime;
use crate::common::tracker::SmsTracker;
use crate::config::PremiumRule;
use crate::gateway::StackEvent;
use crate::platform::usage::{PremiumPermission, ShortCodeCategory};
use crate::saps::tnsms::{ConsentChoice, ConsentDecisionInd, PromptKind};

/// Outcome of the destination check for a batch.
pub(super) enum Gate {
    /// Not a gated destination (or pre-approved); continue to the volume
    /// check.
    Approved(Vec<SmsTracker>),
    /// The batch was rejected or parked; nothing left to do here.
    Handled,
}

/// A batch of sibling units awaiting one consent decision.
pub(super) struct PendingConfirmation {
    pub trackers: Vec<SmsTracker>,
    pub kind: PromptKind,
    pub package: String,
}

enum CountrySource {
    SimFirst,
    NetworkFirst,
}

impl SmsDispatchEntity {
    /// Classify the batch destination and decide whether it may proceed,
    /// must be confirmed by the user, or is rejected.
    pub(super) fn check_destination(
        &mut self,
        now: StackTime,
        trackers: Vec<SmsTracker>,
    ) -> Gate {
        {
            let first = &trackers[0];
            if self.deps.platform.has_unconfirmed_send_privilege(&first.app.package)
                || first.is_for_vvm
                || first.skip_short_code_check
            {
                // caller is pre-approved to send to short codes
                return Gate::Approved(trackers);
            }
        }

        let dest_addr = trackers[0].dest_addr.clone();
        let rule = self.config.premium_rule;
        let mut category = ShortCodeCategory::NotShortCode;
        if matches!(rule, PremiumRule::Sim | PremiumRule::Both) {
            if let Some(iso) = self.country_iso(CountrySource::SimFirst) {
                category = self.deps.usage.check_destination(&dest_addr, &iso);
            }
        }
        if matches!(rule, PremiumRule::Network | PremiumRule::Both) {
            if let Some(iso) = self.country_iso(CountrySource::NetworkFirst) {
                category = ShortCodeCategory::merge(
                    category,
                    self.deps.usage.check_destination(&dest_addr, &iso),
                );
            }
        }

        if !category.needs_confirmation() {
            return Gate::Approved(trackers);
        }

        // No premium prompt is permitted while the device is still in
        // initial setup.
        if !self.deps.platform.device_provisioned() {
            tracing::error!("premium short-code send refused during device setup");
            self.fail_trackers(now, trackers, SendResult::ShortCodeNotAllowed, None);
            return Gate::Handled;
        }

        let package = trackers[0].app.package.clone();
        match self.deps.usage.premium_permission(&package) {
            PremiumPermission::AlwaysAllow => {
                tracing::debug!("{package} approved to send to premium short codes");
                Gate::Approved(trackers)
            }
            PremiumPermission::NeverAllow => {
                tracing::warn!("{package} permanently denied from premium short codes");
                self.fail_trackers(now, trackers, SendResult::ShortCodeNeverAllowed, None);
                Gate::Handled
            }
            PremiumPermission::Ask => {
                let premium = category == ShortCodeCategory::Premium;
                self.enqueue_confirmation(now, trackers, PromptKind::ShortCode { premium });
                Gate::Handled
            }
        }
    }

    fn country_iso(&self, source: CountrySource) -> Option<String> {
        let valid = |s: &String| s.len() == 2;
        let sim = self.deps.platform.sim_country_iso().filter(valid);
        let network = self.deps.platform.network_country_iso().filter(valid);
        match source {
            CountrySource::SimFirst => {
                if sim.is_none() {
                    tracing::debug!("no SIM country, trying network country");
                }
                sim.or(network)
            }
            CountrySource::NetworkFirst => {
                if network.is_none() {
                    tracing::debug!("no network country, trying SIM country");
                }
                network.or(sim)
            }
        }
    }

    /// Park a batch for interactive confirmation, subject to the pending
    /// queue limit. At or over the limit the batch is rejected immediately;
    /// this is back-pressure, not a wait.
    pub(super) fn enqueue_confirmation(
        &mut self,
        now: StackTime,
        trackers: Vec<SmsTracker>,
        kind: PromptKind,
    ) {
        if self.pending_confirmations.len() >= self.config.mo_queue_limit {
            tracing::error!(
                "confirmation queue limit ({}) reached, rejecting batch",
                self.config.mo_queue_limit
            );
            self.fail_trackers(now, trackers, SendResult::LimitExceeded, None);
            return;
        }

        let confirmation_id = self.next_confirmation_id;
        self.next_confirmation_id += 1;

        let package = trackers[0].app.package.clone();
        let dest_addr = trackers[0].dest_addr.clone();
        for tracker in &trackers {
            if let Some(tr) = &tracker.trace {
                send_log::update_part_status(
                    tr.job_id,
                    tr.part_index,
                    SendPartStatus::AwaitingConfirmation,
                );
            }
        }
        self.pending_confirmations
            .insert(confirmation_id, PendingConfirmation { trackers, kind, package: package.clone() });

        tracing::info!(
            "confirmation required (id {confirmation_id}, {kind:?}) for {package} -> {dest_addr}"
        );
        let _ = self.events.send(StackEvent::ConfirmationRequired {
            confirmation_id,
            kind,
            package,
            dest_addr,
        });
    }

    /// Apply an interactive consent decision to its parked batch.
    pub(super) fn resolve_consent(
        &mut self,
        queue: &mut MessageQueue,
        now: StackTime,
        ind: ConsentDecisionInd,
    ) {
        let Some(pending) = self.pending_confirmations.remove(&ind.confirmation_id) else {
            tracing::warn!("consent decision for unknown batch {}", ind.confirmation_id);
            self.deps.anomalies.report(
                ANOMALY_ORPHAN_COMPLETION,
                &format!("consent decision for unknown batch {}", ind.confirmation_id),
            );
            return;
        };

        match ind.choice {
            ConsentChoice::Allow => {
                tracing::debug!("user confirmed send (id {})", ind.confirmation_id);
                if let PromptKind::ShortCode { .. } = pending.kind {
                    let permission = if ind.remember {
                        PremiumPermission::AlwaysAllow
                    } else {
                        PremiumPermission::Ask
                    };
                    self.deps.usage.set_premium_permission(&pending.package, permission);
                }
                for tracker in pending.trackers {
                    self.send_sms_by_radio(queue, now, Box::new(tracker));
                }
            }
            ConsentChoice::Deny => {
                tracing::debug!("user denied send (id {})", ind.confirmation_id);
                let error = match pending.kind {
                    PromptKind::ShortCode { .. } if ind.remember => {
                        SendResult::ShortCodeNeverAllowed
                    }
                    PromptKind::ShortCode { .. } => SendResult::ShortCodeNotAllowed,
                    PromptKind::RateLimit => SendResult::LimitExceeded,
                };
                if let PromptKind::ShortCode { .. } = pending.kind {
                    let permission = if ind.remember {
                        PremiumPermission::NeverAllow
                    } else {
                        PremiumPermission::Ask
                    };
                    self.deps.usage.set_premium_permission(&pending.package, permission);
                }
                self.fail_trackers(now, pending.trackers, error, None);
            }
            ConsentChoice::Dismiss => {
                tracing::debug!("confirmation dismissed (id {}), not sending", ind.confirmation_id);
                let error = match pending.kind {
                    PromptKind::ShortCode { .. } => SendResult::ShortCodeNotAllowed,
                    PromptKind::RateLimit => SendResult::LimitExceeded,
                };
                self.fail_trackers(now, pending.trackers, error, None);
            }
        }
    }
}
