/// One encoded submission: the PDU proper and, when the request named a
/// specific service center, its encoded address. Both are opaque here.
#[derive(Debug, Clone)]
pub struct SubmitPdu {
    pub smsc: Option<Vec<u8>>,
    pub pdu: Vec<u8>,
}

/// Concatenation header for one part of a multi-part message.
/// `seq_number` is 1-based; `ref_number` is shared by all sibling parts.
#[derive(Debug, Clone, Copy)]
pub struct ConcatHeader {
    pub ref_number: u8,
    pub seq_number: u8,
    pub msg_count: u8,
}

/// External PDU encoder and text segmenter.
///
/// Returning `None` from either encode operation means the payload cannot
/// be represented; the pipeline treats that as an immediate, terminal
/// failure and never constructs a tracked unit for it.
pub trait SmsEncoder: Send {
    #[allow(clippy::too_many_arguments)]
    fn text_submit_pdu(
        &self,
        sc_addr: Option<&str>,
        dest_addr: &str,
        text: &str,
        status_report: bool,
        concat: Option<&ConcatHeader>,
        priority: Option<u8>,
        validity_period_mins: Option<u32>,
        message_ref: u8,
    ) -> Option<SubmitPdu>;

    fn data_submit_pdu(
        &self,
        sc_addr: Option<&str>,
        dest_addr: &str,
        dest_port: u16,
        data: &[u8],
        status_report: bool,
        message_ref: u8,
    ) -> Option<SubmitPdu>;

    /// Split a long text into transmittable parts, in order.
    fn segment_text(&self, text: &str) -> Vec<String>;
}
