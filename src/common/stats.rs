//! Outgoing-message telemetry seam.

use crate::common::result::SendResult;
use crate::common::tracker::SmsFormat;

/// One completed (or terminally failed) outbound submission.
#[derive(Debug, Clone)]
pub struct OutgoingSmsReport {
    pub over_carrier: bool,
    pub format: SmsFormat,
    pub result: SendResult,
    pub error_code: Option<i32>,
    pub message_id: u64,
    pub from_default_app: bool,
    /// Milliseconds between submission and completion.
    pub interval_ms: u64,
    pub dest_is_emergency: bool,
}

pub trait SmsStatsSink: Send {
    fn on_outgoing_sms(&mut self, report: &OutgoingSmsReport);
}

/// Discards reports. The default when the host wires no telemetry.
pub struct NoopStats;

impl SmsStatsSink for NoopStats {
    fn on_outgoing_sms(&mut self, _report: &OutgoingSmsReport) {}
}
