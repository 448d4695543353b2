//! Carrier messaging service bridge: bind, forward one batch, await the
//! result under a watchdog, and always disconnect on completion.
//!
//! One [`CarrierSmsSender`] per batch, states
//! `Binding -> AwaitingResult -> completed` where completion happens by
//! exactly one of {result callback, timeout}. A second callback for the
//! same batch is a protocol violation: it is logged, reported as an
//! anomaly, and otherwise ignored.

use super::SmsDispatchEntity;
use crate::common::anomaly::{ANOMALY_CARRIER_NO_RESPONSE, ANOMALY_DUPLICATE_CALLBACK};
use crate::common::messagerouter::MessageQueue;
use crate::common::result::{CarrierSendStatus, RadioError, RadioFailure};
use crate::common::send_log::{self, SendPartStatus};
use crate::common::stack_time::StackTime;
use crate::common::tracker::SmsTracker;
use crate::platform::carrier::CarrierMessagingService;
use crate::saps::rsub::SmsAck;
use crate::saps::sapmsg::{Sap, SapMsg, SapMsgInner, StackEntity};

/// What gets forwarded once the service connection is ready.
#[derive(Debug, Clone)]
pub enum CarrierPayload {
    Text { text: String },
    Data { data: Vec<u8>, port: u16 },
    Multipart { parts: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BridgeState {
    Binding,
    AwaitingResult,
}

/// One outstanding batch on the carrier messaging service.
pub(super) struct CarrierSmsSender {
    state: BridgeState,
    service: Box<dyn CarrierMessagingService>,
    payload: CarrierPayload,
    trackers: Vec<SmsTracker>,
    dest_addr: String,
    sub_id: i32,
    status_report: bool,
}

impl SmsDispatchEntity {
    /// Try to hand a batch to the carrier messaging service. Returns the
    /// trackers when no service is installed or binding failed outright, in
    /// which case the caller routes them to the radio path.
    pub(super) fn try_carrier(
        &mut self,
        queue: &mut MessageQueue,
        now: StackTime,
        payload: CarrierPayload,
        trackers: Vec<SmsTracker>,
    ) -> Option<Vec<SmsTracker>> {
        let Some(mut service) = self.deps.carrier.service_for_send() else {
            tracing::trace!("no carrier messaging service installed");
            return Some(trackers);
        };

        let bridge_id = self.next_bridge_id;
        self.next_bridge_id += 1;

        if !service.bind(self.handle.carrier_events(bridge_id)) {
            // Same as an explicit retry-on-carrier-network result.
            tracing::error!("carrier messaging service bind failed, using radio path");
            service.disconnect();
            return Some(trackers);
        }
        tracing::debug!("carrier messaging service binding (bridge {bridge_id})");

        // The watchdog cannot be cancelled once queued; a completed bridge
        // simply ignores its stale firing.
        queue.push_back(SapMsg::new(
            Sap::Carrier,
            StackEntity::Dispatch,
            StackEntity::Dispatch,
            now.add_ms(self.config.carrier_timeout_ms),
            SapMsgInner::CarrierTimeoutInd { bridge_id },
        ));

        for tracker in &trackers {
            if let Some(tr) = &tracker.trace {
                send_log::update_part_status(
                    tr.job_id,
                    tr.part_index,
                    SendPartStatus::CarrierSubmitted,
                );
            }
        }
        let status_report = trackers.iter().any(|t| t.delivery_cb.is_some());
        let dest_addr = trackers[0].dest_addr.clone();
        self.bridges.insert(
            bridge_id,
            CarrierSmsSender {
                state: BridgeState::Binding,
                service,
                payload,
                trackers,
                dest_addr,
                sub_id: self.sub_id,
                status_report,
            },
        );
        None
    }

    /// Service connection ready: forward the batch.
    pub(super) fn on_carrier_bound(&mut self, bridge_id: u64) {
        match self.bridges.get_mut(&bridge_id) {
            None => {
                tracing::warn!("service-ready for unknown bridge {bridge_id}");
                self.deps.anomalies.report(
                    ANOMALY_DUPLICATE_CALLBACK,
                    &format!("service-ready for unknown bridge {bridge_id}"),
                );
            }
            Some(bridge) if bridge.state != BridgeState::Binding => {
                tracing::warn!("repeated service-ready on bridge {bridge_id}");
                self.deps.anomalies.report(
                    ANOMALY_DUPLICATE_CALLBACK,
                    &format!("repeated service-ready on bridge {bridge_id}"),
                );
            }
            Some(bridge) => {
                bridge.state = BridgeState::AwaitingResult;
                for tracker in &mut bridge.trackers {
                    tracker.carrier_attempts += 1;
                }
                let events = self.handle.carrier_events(bridge_id);
                match &bridge.payload {
                    CarrierPayload::Text { text } => bridge.service.send_text_sms(
                        text,
                        bridge.sub_id,
                        &bridge.dest_addr,
                        bridge.status_report,
                        events,
                    ),
                    CarrierPayload::Data { data, port } => bridge.service.send_data_sms(
                        data,
                        bridge.sub_id,
                        &bridge.dest_addr,
                        *port,
                        bridge.status_report,
                        events,
                    ),
                    CarrierPayload::Multipart { parts } => bridge.service.send_multipart_text_sms(
                        parts,
                        bridge.sub_id,
                        &bridge.dest_addr,
                        bridge.status_report,
                        events,
                    ),
                }
                tracing::debug!("carrier send forwarded (bridge {bridge_id})");
            }
        }
    }

    /// Result callback from the service. First completion wins; the service
    /// is disconnected before the result is acted on.
    pub(super) fn on_carrier_result(
        &mut self,
        queue: &mut MessageQueue,
        now: StackTime,
        bridge_id: u64,
        status_raw: i32,
        message_refs: Vec<u32>,
    ) {
        let Some(mut bridge) = self.bridges.remove(&bridge_id) else {
            tracing::warn!("carrier completion for finished bridge {bridge_id}");
            self.deps.anomalies.report(
                ANOMALY_DUPLICATE_CALLBACK,
                &format!("unexpected carrier completion for bridge {bridge_id}"),
            );
            return;
        };
        bridge.service.disconnect();

        let status = CarrierSendStatus::from_raw(status_raw);
        tracing::debug!("carrier send result {:?} (bridge {bridge_id})", status);

        if status == CarrierSendStatus::Ok {
            for (i, mut tracker) in bridge.trackers.into_iter().enumerate() {
                tracker.carrier_status = Some(CarrierSendStatus::Ok);
                let message_ref = message_refs.get(i).copied().unwrap_or(0);
                self.handle_send_complete(
                    queue,
                    now,
                    Box::new(tracker),
                    Ok(SmsAck { message_ref, ack_pdu: None, error_code: None }),
                    true,
                );
            }
        } else if status.wants_radio_fallback() {
            tracing::info!("carrier requested radio fallback (bridge {bridge_id})");
            self.send_submit_pdu(queue, now, bridge.trackers);
        } else {
            for mut tracker in bridge.trackers {
                tracker.carrier_status = Some(status);
                self.handle_send_complete(
                    queue,
                    now,
                    Box::new(tracker),
                    Err(RadioError::new(RadioFailure::GenericFailure)),
                    true,
                );
            }
        }
    }

    /// Watchdog fired. Only a still-live bridge counts; a stale firing
    /// after normal completion is expected and silent.
    pub(super) fn on_carrier_timeout(
        &mut self,
        queue: &mut MessageQueue,
        now: StackTime,
        bridge_id: u64,
    ) {
        let Some(mut bridge) = self.bridges.remove(&bridge_id) else {
            return;
        };
        tracing::error!(
            "no response from carrier messaging service within {}ms (bridge {bridge_id})",
            self.config.carrier_timeout_ms
        );
        self.deps.anomalies.report(
            ANOMALY_CARRIER_NO_RESPONSE,
            &format!(
                "no response from carrier messaging service within {}ms",
                self.config.carrier_timeout_ms
            ),
        );
        bridge.service.disconnect();
        self.send_submit_pdu(queue, now, bridge.trackers);
    }
}
