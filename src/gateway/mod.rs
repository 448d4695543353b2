//! Cross-thread ingestion and outbound stack events.
//!
//! Application threads, the consent surface and the carrier messaging
//! service all talk to the loop through a [`StackHandle`]: every call turns
//! into a primitive on a channel that the [`GatewayEntity`] drains into the
//! router queue at the start of each loop iteration. Outbound notifications
//! (sent messages, pending confirmations) leave through a broadcast
//! channel.

use crossbeam_channel::{Receiver, Sender};
use tokio::sync::broadcast;

use crate::common::messagerouter::MessageQueue;
use crate::common::stack_time::StackTime;
use crate::entities::StackEntityTrait;
use crate::saps::rsub::StatusReportInd;
use crate::saps::sapmsg::{Sap, SapMsg, SapMsgInner, StackEntity};
use crate::saps::tnsms::{
    ConsentChoice, ConsentDecisionInd, DataSendReq, MultipartSendReq, PromptKind, SubmitReq,
    TextSendReq,
};
use crate::unhandled_log;

/// Events the stack raises for whoever is listening (UI, diagnostics).
#[derive(Debug, Clone)]
pub enum StackEvent {
    /// A unit was accepted by the network.
    SmsSent { dest_addr: String },
    /// A send batch is parked awaiting a consent decision. Resolve it with
    /// [`StackHandle::consent_decision`].
    ConfirmationRequired {
        confirmation_id: u64,
        kind: PromptKind,
        package: String,
        dest_addr: String,
    },
}

pub fn event_channel() -> (broadcast::Sender<StackEvent>, broadcast::Receiver<StackEvent>) {
    broadcast::channel(64)
}

/// Cloneable, thread-safe entry point into the loop.
#[derive(Clone)]
pub struct StackHandle {
    tx: Sender<SapMsg>,
}

impl StackHandle {
    /// Create a handle and the gateway entity that drains it. Register the
    /// entity with the router.
    pub fn channel() -> (StackHandle, GatewayEntity) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (StackHandle { tx }, GatewayEntity { rx })
    }

    pub fn send_text(&self, req: TextSendReq) {
        self.push(
            Sap::TnSms,
            StackEntity::Gateway,
            SapMsgInner::TnSmsSubmitReq(SubmitReq::Text(req)),
        );
    }

    pub fn send_data(&self, req: DataSendReq) {
        self.push(
            Sap::TnSms,
            StackEntity::Gateway,
            SapMsgInner::TnSmsSubmitReq(SubmitReq::Data(req)),
        );
    }

    pub fn send_multipart_text(&self, req: MultipartSendReq) {
        self.push(
            Sap::TnSms,
            StackEntity::Gateway,
            SapMsgInner::TnSmsSubmitReq(SubmitReq::MultipartText(req)),
        );
    }

    /// Resolve a pending confirmation previously announced through
    /// [`StackEvent::ConfirmationRequired`].
    pub fn consent_decision(&self, confirmation_id: u64, choice: ConsentChoice, remember: bool) {
        self.push(
            Sap::Consent,
            StackEntity::ConsentUi,
            SapMsgInner::ConsentDecisionInd(ConsentDecisionInd {
                confirmation_id,
                choice,
                remember,
            }),
        );
    }

    pub fn sim_loaded(&self, sub_id: i32) {
        self.push(Sap::TnSms, StackEntity::Gateway, SapMsgInner::SimLoadedInd { sub_id });
    }

    /// Inject a delivery status report received from the radio glue.
    pub fn status_report(&self, ind: StatusReportInd) {
        self.push(Sap::Rsub, StackEntity::Radio, SapMsgInner::RsubStatusReportInd(ind));
    }

    /// Callback handle for one carrier-service send batch.
    pub fn carrier_events(&self, bridge_id: u64) -> CarrierEvents {
        CarrierEvents { bridge_id, tx: self.tx.clone() }
    }

    fn push(&self, sap: Sap, src: StackEntity, msg: SapMsgInner) {
        // The gateway re-stamps the due time on drain; the loop may be far
        // ahead of this thread's view of time.
        let message = SapMsg::new(sap, src, StackEntity::Dispatch, StackTime::default(), msg);
        if self.tx.send(message).is_err() {
            tracing::warn!("stack handle: loop is gone, dropping primitive");
        }
    }
}

/// Result/readiness callbacks handed to the carrier messaging service for
/// one batch. May be invoked from any thread; each call becomes a primitive
/// on the loop.
#[derive(Clone)]
pub struct CarrierEvents {
    bridge_id: u64,
    tx: Sender<SapMsg>,
}

impl CarrierEvents {
    pub fn bridge_id(&self) -> u64 {
        self.bridge_id
    }

    /// The service connection is ready; the pending batch will be forwarded.
    pub fn service_ready(&self) {
        self.push(SapMsgInner::CarrierBoundInd { bridge_id: self.bridge_id });
    }

    /// Single-part send result.
    pub fn send_complete(&self, status: i32, message_ref: u32) {
        self.push(SapMsgInner::CarrierSendCnf {
            bridge_id: self.bridge_id,
            status,
            message_refs: vec![message_ref],
        });
    }

    /// Multipart send result, one message reference per part (may be empty).
    pub fn multipart_send_complete(&self, status: i32, message_refs: Vec<u32>) {
        self.push(SapMsgInner::CarrierSendCnf {
            bridge_id: self.bridge_id,
            status,
            message_refs,
        });
    }

    fn push(&self, msg: SapMsgInner) {
        let message = SapMsg::new(
            Sap::Carrier,
            StackEntity::Gateway,
            StackEntity::Dispatch,
            StackTime::default(),
            msg,
        );
        if self.tx.send(message).is_err() {
            tracing::warn!("carrier events: loop is gone, dropping result");
        }
    }
}

/// Drains the handle's channel into the router queue each loop iteration.
pub struct GatewayEntity {
    rx: Receiver<SapMsg>,
}

impl StackEntityTrait for GatewayEntity {
    fn entity(&self) -> StackEntity {
        StackEntity::Gateway
    }

    fn rx_prim(&mut self, _queue: &mut MessageQueue, message: SapMsg) {
        unhandled_log!(format!("{:?}", message.get_sap()));
    }

    fn tick_start(&mut self, queue: &mut MessageQueue, now: StackTime) {
        while let Ok(mut message) = self.rx.try_recv() {
            message.dltime = now;
            queue.push_back(message);
        }
    }
}
