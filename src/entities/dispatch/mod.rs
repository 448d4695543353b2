//! The dispatch core: builds tracked units from send requests, gates them
//! behind confirmation, routes them to the carrier messaging service or the
//! radio channel, and drives retry and completion.

use std::collections::{HashMap, VecDeque};

use tokio::sync::broadcast;

use crate::common::anomaly::AnomalyReporter;
use crate::common::concat_ref;
use crate::common::message_ref::MessageRefAllocator;
use crate::common::messagerouter::MessageQueue;
use crate::common::result::{
    not_in_service_error, CarrierSendStatus, RadioError, SendResult, ServiceState,
};
use crate::common::send_log::{self, SendJob, SendPartInfo, SendPartStatus, SendTraceMeta};
use crate::common::stack_time::StackTime;
use crate::common::stats::{OutgoingSmsReport, SmsStatsSink};
use crate::common::tracker::{
    next_unique_message_id, DeliveryCallback, DeliveryNotice, MultipartState, SentCallback,
    SentNotice, SmsFormat, SmsTracker,
};
use crate::config::SharedConfig;
use crate::entities::StackEntityTrait;
use crate::gateway::{StackEvent, StackHandle};
use crate::platform::carrier::CarrierServiceLookup;
use crate::platform::encoder::{ConcatHeader, SmsEncoder};
use crate::platform::info::PlatformInfo;
use crate::platform::stores::{MessageStore, SimRecords, StoreHandle, SubscriptionStore};
use crate::platform::usage::UsageMonitor;
use crate::saps::rsub::{RsubSubmitReq, SmsAck, StatusReportInd};
use crate::saps::sapmsg::{Sap, SapMsg, SapMsgInner, StackEntity};
use crate::saps::tnsms::{DataSendReq, MultipartSendReq, SubmitReq, TextSendReq};

mod carrier;
mod confirm;

pub use carrier::CarrierPayload;

/// Everything the dispatcher consumes from the platform.
pub struct DispatchDeps {
    pub encoder: Box<dyn SmsEncoder>,
    pub message_store: Box<dyn MessageStore>,
    pub sim: Box<dyn SimRecords>,
    pub subs: Box<dyn SubscriptionStore>,
    pub usage: Box<dyn UsageMonitor>,
    pub platform: Box<dyn PlatformInfo>,
    pub carrier: Box<dyn CarrierServiceLookup>,
    pub stats: Box<dyn SmsStatsSink>,
    pub anomalies: Box<dyn AnomalyReporter>,
}

/// A successfully sent unit waiting for its delivery report.
struct DeliveryPending {
    cb: DeliveryCallback,
    store_handle: Option<StoreHandle>,
    format: SmsFormat,
}

pub struct SmsDispatchEntity {
    config: SharedConfig,
    deps: DispatchDeps,
    events: broadcast::Sender<StackEvent>,
    handle: StackHandle,

    sub_id: i32,
    format: SmsFormat,
    msg_ref: MessageRefAllocator,

    pending_confirmations: HashMap<u64, confirm::PendingConfirmation>,
    next_confirmation_id: u64,

    bridges: HashMap<u64, carrier::CarrierSmsSender>,
    next_bridge_id: u64,

    delivery_pending: HashMap<u32, DeliveryPending>,
}

impl SmsDispatchEntity {
    pub fn new(
        config: SharedConfig,
        sub_id: i32,
        format: SmsFormat,
        deps: DispatchDeps,
        events: broadcast::Sender<StackEvent>,
        handle: StackHandle,
    ) -> Self {
        tracing::debug!(
            "SmsDispatchEntity: sub={} format={} sms_capable={} send_disabled={}",
            sub_id,
            format.as_str(),
            config.sms_capable,
            config.sms_send_disabled
        );
        Self {
            config,
            deps,
            events,
            handle,
            sub_id,
            format,
            msg_ref: MessageRefAllocator::new(sub_id),
            pending_confirmations: HashMap::new(),
            next_confirmation_id: 1,
            bridges: HashMap::new(),
            next_bridge_id: 1,
            delivery_pending: HashMap::new(),
        }
    }

    // ---- Dispatch pipeline --------------------------------------------

    fn send_text(&mut self, queue: &mut MessageQueue, now: StackTime, req: TextSendReq) {
        tracing::debug!("send_text: dest={} message_id={}", req.dest_addr, req.message_id);
        let message_ref = self.next_message_ref();
        let pdu = self.deps.encoder.text_submit_pdu(
            req.sc_addr.as_deref(),
            &req.dest_addr,
            &req.text,
            req.delivery_cb.is_some(),
            None,
            req.priority,
            req.validity_period_mins,
            message_ref,
        );
        let Some(pdu) = pdu else {
            tracing::error!(
                "send_text: encoder produced no PDU, message_id={}",
                req.message_id
            );
            fire_failure_now(req.sent_cb, self.format, req.message_id);
            return;
        };

        let payload = CarrierPayload::Text { text: req.text.clone() };
        let mut tracker = SmsTracker {
            dest_addr: req.dest_addr,
            sc_addr: req.sc_addr,
            pdu: pdu.pdu,
            smsc: pdu.smsc,
            sent_cb: req.sent_cb,
            delivery_cb: req.delivery_cb,
            retry_count: 0,
            max_retry_count: self.config.max_send_retries,
            message_ref,
            priority: req.priority,
            validity_period_mins: req.validity_period_mins,
            format: self.format,
            message_id: req.message_id,
            unique_message_id: next_unique_message_id(),
            multipart: None,
            store_handle: None,
            skip_short_code_check: req.skip_short_code_check,
            is_for_vvm: req.is_for_vvm,
            from_default_app: None,
            carrier_attempts: 0,
            carrier_status: None,
            submitted_at: now,
            expect_more: req.expect_more,
            is_text: true,
            full_text: Some(req.text),
            persist: req.persist,
            app: req.app,
            sub_id: self.sub_id,
            trace: None,
        };
        let job_id = self.new_job(&tracker, 1);
        tracker.trace = Some(SendTraceMeta { job_id, part_index: 0, part_total: 1 });

        self.route(queue, now, payload, vec![tracker]);
    }

    fn send_data(&mut self, queue: &mut MessageQueue, now: StackTime, req: DataSendReq) {
        tracing::debug!(
            "send_data: dest={} port={} message_id={}",
            req.dest_addr,
            req.dest_port,
            req.message_id
        );
        let message_ref = self.next_message_ref();
        let pdu = self.deps.encoder.data_submit_pdu(
            req.sc_addr.as_deref(),
            &req.dest_addr,
            req.dest_port,
            &req.data,
            req.delivery_cb.is_some(),
            message_ref,
        );
        let Some(pdu) = pdu else {
            tracing::error!(
                "send_data: encoder produced no PDU, message_id={}",
                req.message_id
            );
            fire_failure_now(req.sent_cb, self.format, req.message_id);
            return;
        };

        let payload = CarrierPayload::Data { data: req.data, port: req.dest_port };
        let mut tracker = SmsTracker {
            dest_addr: req.dest_addr,
            sc_addr: req.sc_addr,
            pdu: pdu.pdu,
            smsc: pdu.smsc,
            sent_cb: req.sent_cb,
            delivery_cb: req.delivery_cb,
            retry_count: 0,
            max_retry_count: self.config.max_send_retries,
            message_ref,
            priority: None,
            validity_period_mins: None,
            format: self.format,
            message_id: req.message_id,
            unique_message_id: next_unique_message_id(),
            multipart: None,
            store_handle: None,
            skip_short_code_check: false,
            is_for_vvm: req.is_for_vvm,
            from_default_app: None,
            carrier_attempts: 0,
            carrier_status: None,
            submitted_at: now,
            expect_more: false,
            is_text: false,
            full_text: None,
            persist: false,
            app: req.app,
            sub_id: self.sub_id,
            trace: None,
        };
        let job_id = self.new_job(&tracker, 1);
        tracker.trace = Some(SendTraceMeta { job_id, part_index: 0, part_total: 1 });

        self.route(queue, now, payload, vec![tracker]);
    }

    fn send_multipart_text(
        &mut self,
        queue: &mut MessageQueue,
        now: StackTime,
        req: MultipartSendReq,
    ) {
        let msg_count = req.parts.len();
        tracing::debug!(
            "send_multipart_text: dest={} parts={} message_id={}",
            req.dest_addr,
            msg_count,
            req.message_id
        );
        if msg_count == 0 {
            tracing::error!("send_multipart_text: no parts, message_id={}", req.message_id);
            for cb in req.sent_cbs {
                fire_failure_now(cb, self.format, req.message_id);
            }
            return;
        }

        let ref_number = concat_ref::next_concatenated_ref();
        let shared = MultipartState::new(msg_count);
        let full_text: String = req.parts.concat();
        let unique_message_id = next_unique_message_id();

        let mut sent_cbs: VecDeque<SentCallback> = req.sent_cbs.into();
        let mut delivery_cbs: VecDeque<Option<DeliveryCallback>> = req.delivery_cbs.into();

        let mut trackers: Vec<SmsTracker> = Vec::with_capacity(msg_count);
        for (i, part) in req.parts.iter().enumerate() {
            let message_ref = self.next_message_ref();
            let concat = ConcatHeader {
                ref_number,
                seq_number: (i + 1) as u8, // 1-based sequence
                msg_count: msg_count as u8,
            };
            let sent_cb = sent_cbs.pop_front().unwrap_or_else(SentCallback::none);
            let delivery_cb = delivery_cbs.pop_front().flatten();

            let pdu = self.deps.encoder.text_submit_pdu(
                req.sc_addr.as_deref(),
                &req.dest_addr,
                part,
                delivery_cb.is_some(),
                Some(&concat),
                req.priority,
                req.validity_period_mins,
                message_ref,
            );
            let Some(pdu) = pdu else {
                tracing::error!(
                    "send_multipart_text: encoder produced no PDU for part {}, message_id={}",
                    i,
                    req.message_id
                );
                // fail the whole message: parts already built and the rest
                for tracker in &mut trackers {
                    let notice = failure_notice(self.format, req.message_id);
                    tracker.sent_cb.fire(notice);
                }
                fire_failure_now(sent_cb, self.format, req.message_id);
                for cb in sent_cbs {
                    fire_failure_now(cb, self.format, req.message_id);
                }
                return;
            };

            let last_part = i == msg_count - 1;
            trackers.push(SmsTracker {
                dest_addr: req.dest_addr.clone(),
                sc_addr: req.sc_addr.clone(),
                pdu: pdu.pdu,
                smsc: pdu.smsc,
                sent_cb,
                delivery_cb,
                retry_count: 0,
                max_retry_count: self.config.max_send_retries,
                message_ref,
                priority: req.priority,
                validity_period_mins: req.validity_period_mins,
                format: self.format,
                message_id: req.message_id,
                unique_message_id,
                multipart: Some(shared.clone()),
                store_handle: None,
                skip_short_code_check: false,
                is_for_vvm: false,
                from_default_app: None,
                carrier_attempts: 0,
                carrier_status: None,
                submitted_at: now,
                expect_more: !last_part || req.expect_more,
                is_text: true,
                full_text: Some(full_text.clone()),
                persist: req.persist,
                app: req.app.clone(),
                sub_id: self.sub_id,
                trace: None,
            });
        }

        let job_id = self.new_job(&trackers[0], msg_count);
        for (i, tracker) in trackers.iter_mut().enumerate() {
            tracker.trace = Some(SendTraceMeta { job_id, part_index: i, part_total: msg_count });
        }

        // All sibling parts always travel as one batch so the carrier
        // service sees them correlated and in order.
        self.route(queue, now, CarrierPayload::Multipart { parts: req.parts }, trackers);
    }

    /// Choose a transport: the carrier messaging service when one is
    /// installed, the radio path otherwise.
    fn route(
        &mut self,
        queue: &mut MessageQueue,
        now: StackTime,
        payload: CarrierPayload,
        trackers: Vec<SmsTracker>,
    ) {
        if let Some(trackers) = self.try_carrier(queue, now, payload, trackers) {
            self.send_submit_pdu(queue, now, trackers);
        }
    }

    /// Radio-path entry for a batch: emergency-callback-mode gate, then
    /// validation and confirmation gating.
    fn send_submit_pdu(
        &mut self,
        queue: &mut MessageQueue,
        now: StackTime,
        trackers: Vec<SmsTracker>,
    ) {
        if self.deps.platform.in_emergency_callback_mode() {
            tracing::debug!("blocking outbound SMS in emergency callback mode");
            self.fail_trackers(now, trackers, SendResult::BlockedDuringEmergency, None);
            return;
        }
        self.send_raw_pdu(queue, now, trackers);
    }

    fn send_raw_pdu(&mut self, queue: &mut MessageQueue, now: StackTime, trackers: Vec<SmsTracker>) {
        let mut error = None;
        if !self.config.sms_capable || self.config.sms_send_disabled {
            tracing::error!("device does not support sending sms");
            error = Some(SendResult::NoService);
        } else if trackers.iter().any(|t| t.pdu.is_empty()) {
            tracing::error!("empty PDU");
            error = Some(SendResult::NullPdu);
        } else if !self.deps.platform.app_known(&trackers[0].app.package, trackers[0].app.user_id)
        {
            tracing::error!(
                "can't resolve calling app package {}: refusing to send",
                trackers[0].app.package
            );
            error = Some(SendResult::GenericFailure);
        }
        if let Some(error) = error {
            self.fail_trackers(now, trackers, error, None);
            return;
        }

        if self.deps.platform.is_emergency_number(&trackers[0].dest_addr) {
            tracing::info!("outbound SMS to an emergency number");
        }

        match self.check_destination(now, trackers) {
            confirm::Gate::Handled => {}
            confirm::Gate::Approved(trackers) => self.gate_volume(queue, now, trackers),
        }
    }

    /// Per-caller volume check; the last gate before the radio.
    fn gate_volume(&mut self, queue: &mut MessageQueue, now: StackTime, trackers: Vec<SmsTracker>) {
        let package = trackers[0].app.package.clone();
        if !self.deps.usage.check_volume(&package, trackers.len()) {
            tracing::debug!("outgoing volume limit reached for {package}");
            self.enqueue_confirmation(now, trackers, crate::saps::tnsms::PromptKind::RateLimit);
            return;
        }
        for tracker in trackers {
            self.send_sms_by_radio(queue, now, Box::new(tracker));
        }
    }

    /// Hand one unit to the radio channel. Retries re-enter here.
    fn send_sms_by_radio(&mut self, queue: &mut MessageQueue, now: StackTime, tracker: Box<SmsTracker>) {
        if let Some(tr) = &tracker.trace {
            send_log::update_part_status(tr.job_id, tr.part_index, SendPartStatus::RadioSubmitted);
        }
        tracing::info!(
            "radio submit: dest={} mr={} retry={}/{} message_id={}",
            tracker.dest_addr,
            tracker.message_ref,
            tracker.retry_count,
            tracker.max_retry_count,
            tracker.message_id
        );
        queue.push_back(SapMsg::new(
            Sap::Rsub,
            StackEntity::Dispatch,
            StackEntity::Radio,
            now,
            SapMsgInner::RsubSubmitReq(RsubSubmitReq { tracker }),
        ));
    }

    // ---- Completion handling ------------------------------------------

    /// The single serialization point for every asynchronous send result,
    /// whatever transport produced it.
    fn handle_send_complete(
        &mut self,
        queue: &mut MessageQueue,
        now: StackTime,
        mut tracker: Box<SmsTracker>,
        result: Result<SmsAck, RadioError>,
        from_carrier: bool,
    ) {
        match result {
            Ok(ack) => {
                if ack.message_ref != 0 {
                    tracker.message_ref = (ack.message_ref & 0xff) as u8;
                }
                self.finish_sent(now, tracker);
            }
            Err(err) => {
                let ss = self.deps.platform.service_state();

                // A unit that already travelled the carrier service while
                // voice service is gone gets no further attempt: force the
                // ceiling and report a generic failure below.
                let mut suppressed = false;
                if tracker.carrier_attempts > 0 && ss != ServiceState::InService {
                    tracker.retry_count = tracker.max_retry_count;
                    suppressed = true;
                    tracing::debug!(
                        "suppressing retry after carrier attempt without service, message_id={}",
                        tracker.message_id
                    );
                }

                let carrier_error = tracker
                    .carrier_status
                    .filter(|s| *s != CarrierSendStatus::Ok)
                    .map(|s| s.to_send_result());
                let transient = carrier_error.is_none() && err.failure.is_transient();

                if tracker.carrier_attempts == 0 && !from_carrier && ss != ServiceState::InService
                {
                    // No service and the failure is radio-borne: fail with
                    // the service-specific outcome right away.
                    let error = not_in_service_error(ss);
                    self.finish_failed(now, tracker, error, err.error_code);
                } else if transient && tracker.retry_count < tracker.max_retry_count {
                    tracker.retry_count += 1;
                    tracing::debug!(
                        "scheduling retry {}/{} in {}ms, message_id={}",
                        tracker.retry_count,
                        tracker.max_retry_count,
                        self.config.send_retry_delay_ms,
                        tracker.message_id
                    );
                    queue.push_back(SapMsg::new(
                        Sap::Local,
                        StackEntity::Dispatch,
                        StackEntity::Dispatch,
                        now.add_ms(self.config.send_retry_delay_ms),
                        SapMsgInner::SendRetry { tracker },
                    ));
                } else {
                    // Exhausted transient retries surface as a generic
                    // failure; permanent errors keep their specific code.
                    let error = if suppressed || transient {
                        SendResult::GenericFailure
                    } else {
                        carrier_error.unwrap_or_else(|| err.failure.to_send_result())
                    };
                    self.finish_failed(now, tracker, error, err.error_code);
                }
            }
        }
    }

    fn finish_sent(&mut self, now: StackTime, mut tracker: Box<SmsTracker>) {
        let report = self.report_for(&mut tracker, now, SendResult::Ok, None);
        tracker.on_sent(&mut *self.deps.message_store, &*self.deps.platform);
        if let Some(cb) = tracker.delivery_cb.take() {
            // Expecting a status report for this reference.
            self.delivery_pending.insert(
                tracker.message_ref as u32,
                DeliveryPending {
                    cb,
                    store_handle: tracker.store_handle,
                    format: tracker.format,
                },
            );
        }
        let _ = self.events.send(StackEvent::SmsSent { dest_addr: tracker.dest_addr.clone() });
        self.deps.stats.on_outgoing_sms(&report);
    }

    fn finish_failed(
        &mut self,
        now: StackTime,
        mut tracker: Box<SmsTracker>,
        error: SendResult,
        error_code: Option<i32>,
    ) {
        let report = self.report_for(&mut tracker, now, error, error_code);
        tracker.on_failed(
            &mut *self.deps.message_store,
            &*self.deps.platform,
            &mut *self.deps.anomalies,
            error,
            error_code,
        );
        self.deps.stats.on_outgoing_sms(&report);
    }

    /// Terminally fail a whole batch before (or instead of) transmission.
    fn fail_trackers(
        &mut self,
        now: StackTime,
        trackers: Vec<SmsTracker>,
        error: SendResult,
        error_code: Option<i32>,
    ) {
        for tracker in trackers {
            self.finish_failed(now, Box::new(tracker), error, error_code);
        }
    }

    fn report_for(
        &mut self,
        tracker: &mut SmsTracker,
        now: StackTime,
        result: SendResult,
        error_code: Option<i32>,
    ) -> OutgoingSmsReport {
        OutgoingSmsReport {
            over_carrier: tracker.carrier_attempts > 0,
            format: tracker.format,
            result,
            error_code,
            message_id: tracker.message_id,
            from_default_app: tracker.from_default_app(&*self.deps.platform),
            interval_ms: tracker.interval_ms(now),
            dest_is_emergency: self.deps.platform.is_emergency_number(&tracker.dest_addr),
        }
    }

    fn handle_status_report(&mut self, ind: StatusReportInd) {
        match self.delivery_pending.remove(&ind.message_ref) {
            Some(mut pending) => {
                if let Some(handle) = pending.store_handle {
                    self.deps.message_store.set_delivery_status(handle, ind.status);
                }
                pending.cb.fire(DeliveryNotice {
                    message_ref: ind.message_ref,
                    status_pdu: ind.pdu,
                    format: pending.format,
                });
            }
            None => {
                tracing::warn!("status report with no pending unit, mr={}", ind.message_ref);
            }
        }
    }

    // ---- Small helpers -------------------------------------------------

    fn next_message_ref(&mut self) -> u8 {
        self.msg_ref
            .next(&self.config, &mut *self.deps.sim, &mut *self.deps.subs)
    }

    fn new_job(&self, first: &SmsTracker, part_total: usize) -> u64 {
        let preview: String = first
            .full_text
            .as_deref()
            .unwrap_or("")
            .chars()
            .take(32)
            .collect();
        send_log::new_job(SendJob {
            job_id: 0,
            created_ms: 0,
            dest_addr: first.dest_addr.clone(),
            package: first.app.package.clone(),
            format: first.format.as_str().to_string(),
            text_preview: preview,
            parts: (0..part_total)
                .map(|i| SendPartInfo {
                    part_index: i,
                    part_total,
                    status: SendPartStatus::Queued,
                    message_ref: 0,
                    error: None,
                })
                .collect(),
        })
    }

    #[cfg(test)]
    pub(crate) fn pending_confirmation_count(&self) -> usize {
        self.pending_confirmations.len()
    }
}

fn failure_notice(format: SmsFormat, message_id: u64) -> SentNotice {
    SentNotice {
        result: SendResult::GenericFailure,
        error_code: None,
        store_handle: None,
        last_part: true,
        message_id,
        format,
        over_carrier: false,
    }
}

/// Synchronous failure before any tracked unit exists.
fn fire_failure_now(mut cb: SentCallback, format: SmsFormat, message_id: u64) {
    cb.fire(failure_notice(format, message_id));
}

impl StackEntityTrait for SmsDispatchEntity {
    fn entity(&self) -> StackEntity {
        StackEntity::Dispatch
    }

    fn rx_prim(&mut self, queue: &mut MessageQueue, message: SapMsg) {
        let now = message.dltime;
        match message.msg {
            SapMsgInner::TnSmsSubmitReq(req) => match req {
                SubmitReq::Text(req) => self.send_text(queue, now, req),
                SubmitReq::Data(req) => self.send_data(queue, now, req),
                SubmitReq::MultipartText(req) => self.send_multipart_text(queue, now, req),
            },
            SapMsgInner::ConsentDecisionInd(ind) => self.resolve_consent(queue, now, ind),
            SapMsgInner::SimLoadedInd { sub_id } => {
                if sub_id == self.sub_id {
                    self.msg_ref.load(&*self.deps.sim, &*self.deps.subs);
                }
            }
            SapMsgInner::RsubSubmitCnf(cnf) => {
                self.handle_send_complete(queue, now, cnf.tracker, cnf.result, false)
            }
            SapMsgInner::RsubStatusReportInd(ind) => self.handle_status_report(ind),
            SapMsgInner::SendRetry { tracker } => {
                tracing::debug!("retry due, message_id={}", tracker.message_id);
                self.send_sms_by_radio(queue, now, tracker);
            }
            SapMsgInner::CarrierBoundInd { bridge_id } => self.on_carrier_bound(bridge_id),
            SapMsgInner::CarrierSendCnf { bridge_id, status, message_refs } => {
                self.on_carrier_result(queue, now, bridge_id, status, message_refs)
            }
            SapMsgInner::CarrierTimeoutInd { bridge_id } => {
                self.on_carrier_timeout(queue, now, bridge_id)
            }
            msg => crate::unhandled_log!(format!("{msg:?}")),
        }
    }
}
