//! TN-SMS-SAP (application/consent surface <-> dispatch).
//!
//! External interfaces (the public stack handle, the consent surface) use
//! these primitives to request transmissions and resolve confirmations.

use crate::common::tracker::{AppIdentity, DeliveryCallback, SentCallback};

#[derive(Debug)]
pub struct TextSendReq {
    /// Destination identity.
    pub dest_addr: String,
    /// Service-center address, or none for the subscription default.
    pub sc_addr: Option<String>,
    pub text: String,
    pub sent_cb: SentCallback,
    pub delivery_cb: Option<DeliveryCallback>,
    pub app: AppIdentity,
    /// Persist into the sent-message store on completion.
    pub persist: bool,
    pub priority: Option<u8>,
    pub validity_period_mins: Option<u32>,
    /// More messages for the same destination follow on this link.
    pub expect_more: bool,
    /// Voicemail-class message; exempt from short-code gating.
    pub is_for_vvm: bool,
    /// Cross-process correlation id; 0 when the caller supplied none.
    pub message_id: u64,
    pub skip_short_code_check: bool,
}

impl TextSendReq {
    /// A plain text send with default flags.
    pub fn new(dest_addr: &str, text: &str, app: AppIdentity) -> Self {
        Self {
            dest_addr: dest_addr.to_string(),
            sc_addr: None,
            text: text.to_string(),
            sent_cb: SentCallback::none(),
            delivery_cb: None,
            app,
            persist: true,
            priority: None,
            validity_period_mins: None,
            expect_more: false,
            is_for_vvm: false,
            message_id: 0,
            skip_short_code_check: false,
        }
    }
}

#[derive(Debug)]
pub struct DataSendReq {
    pub dest_addr: String,
    pub sc_addr: Option<String>,
    /// Application port the payload is addressed to.
    pub dest_port: u16,
    pub data: Vec<u8>,
    pub sent_cb: SentCallback,
    pub delivery_cb: Option<DeliveryCallback>,
    pub app: AppIdentity,
    pub is_for_vvm: bool,
    pub message_id: u64,
}

#[derive(Debug)]
pub struct MultipartSendReq {
    pub dest_addr: String,
    pub sc_addr: Option<String>,
    /// Message parts in order, pre-segmented by the encoder.
    pub parts: Vec<String>,
    /// Per-part completion callbacks; may be shorter than `parts`.
    pub sent_cbs: Vec<SentCallback>,
    /// Per-part delivery callbacks; may be shorter than `parts`.
    pub delivery_cbs: Vec<Option<DeliveryCallback>>,
    pub app: AppIdentity,
    pub persist: bool,
    pub priority: Option<u8>,
    pub validity_period_mins: Option<u32>,
    pub expect_more: bool,
    pub message_id: u64,
}

impl MultipartSendReq {
    pub fn new(dest_addr: &str, parts: Vec<String>, app: AppIdentity) -> Self {
        Self {
            dest_addr: dest_addr.to_string(),
            sc_addr: None,
            parts,
            sent_cbs: Vec::new(),
            delivery_cbs: Vec::new(),
            app,
            persist: true,
            priority: None,
            validity_period_mins: None,
            expect_more: false,
            message_id: 0,
        }
    }
}

#[derive(Debug)]
pub enum SubmitReq {
    Text(TextSendReq),
    Data(DataSendReq),
    MultipartText(MultipartSendReq),
}

/// Which confirmation the user is (or would be) looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Excessive outgoing volume from one caller.
    RateLimit,
    /// Destination classified as a (possible) premium short code.
    ShortCode { premium: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentChoice {
    Allow,
    Deny,
    /// Prompt dismissed without an explicit choice.
    Dismiss,
}

/// Resolution of a pending confirmation, from the consent surface.
#[derive(Debug, Clone, Copy)]
pub struct ConsentDecisionInd {
    pub confirmation_id: u64,
    pub choice: ConsentChoice,
    /// Persist the choice for future batches from the same caller.
    pub remember: bool,
}
