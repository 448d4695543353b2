//! RSUB-SAP (dispatch <-> radio submission channel).

use crate::common::result::RadioError;
use crate::common::tracker::{SmsFormat, SmsTracker};

/// Acknowledgement of a successful radio submission.
#[derive(Debug, Clone)]
pub struct SmsAck {
    /// Message reference assigned by the network/radio; 0 when unknown.
    pub message_ref: u32,
    pub ack_pdu: Option<Vec<u8>>,
    pub error_code: Option<i32>,
}

/// Hand one tracked unit to the radio channel. The tracker rides along and
/// must come back unchanged in the confirmation.
#[derive(Debug)]
pub struct RsubSubmitReq {
    pub tracker: Box<SmsTracker>,
}

/// Radio submission result: the tracker plus success or a classified error.
#[derive(Debug)]
pub struct RsubSubmitCnf {
    pub tracker: Box<SmsTracker>,
    pub result: Result<SmsAck, RadioError>,
}

/// An incoming delivery status report for a previously sent unit.
#[derive(Debug, Clone)]
pub struct StatusReportInd {
    pub message_ref: u32,
    /// Raw delivery status octet, stored with the message record.
    pub status: u8,
    /// Raw status report PDU, handed to the caller's delivery callback.
    pub pdu: Vec<u8>,
    pub format: SmsFormat,
}
