use crate::common::stack_time::StackTime;
use crate::common::tracker::SmsTracker;
use crate::saps::rsub::{RsubSubmitCnf, RsubSubmitReq, StatusReportInd};
use crate::saps::tnsms::{ConsentDecisionInd, SubmitReq};

/// Entities addressable on the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackEntity {
    /// Cross-thread ingestion point for application requests.
    Gateway,
    /// The dispatch core.
    Dispatch,
    /// External radio submission channel.
    Radio,
    /// External consent surface.
    ConsentUi,
}

/// Service access point a primitive belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sap {
    TnSms,
    Rsub,
    Carrier,
    Consent,
    /// Dispatch-internal, self-addressed primitives (retry due).
    Local,
}

#[derive(Debug)]
pub enum SapMsgInner {
    TnSmsSubmitReq(SubmitReq),
    ConsentDecisionInd(ConsentDecisionInd),
    /// A subscription finished loading; TP-MR state can be recovered.
    SimLoadedInd { sub_id: i32 },

    RsubSubmitReq(RsubSubmitReq),
    RsubSubmitCnf(RsubSubmitCnf),
    RsubStatusReportInd(StatusReportInd),

    /// Carrier messaging service connection is ready.
    CarrierBoundInd { bridge_id: u64 },
    /// Carrier messaging service send result. One message reference per
    /// part for multipart sends; may be empty.
    CarrierSendCnf { bridge_id: u64, status: i32, message_refs: Vec<u32> },
    /// Scheduled watchdog for an outstanding carrier send.
    CarrierTimeoutInd { bridge_id: u64 },

    /// A previously failed unit is due for re-submission.
    SendRetry { tracker: Box<SmsTracker> },
}

#[derive(Debug)]
pub struct SapMsg {
    pub sap: Sap,
    pub src: StackEntity,
    pub dest: StackEntity,
    /// Due time; the router rotates the message until this is reached.
    pub dltime: StackTime,
    pub msg: SapMsgInner,
}

impl SapMsg {
    pub fn new(
        sap: Sap,
        src: StackEntity,
        dest: StackEntity,
        dltime: StackTime,
        msg: SapMsgInner,
    ) -> Self {
        Self { sap, src, dest, dltime, msg }
    }

    pub fn get_sap(&self) -> Sap {
        self.sap
    }

    pub fn get_source(&self) -> StackEntity {
        self.src
    }

    pub fn get_dest(&self) -> StackEntity {
        self.dest
    }
}
