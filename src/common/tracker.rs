//! The tracked-unit model: one [`SmsTracker`] per PDU segment, from
//! construction in the dispatch pipeline until its terminal callback fires.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::common::anomaly::{AnomalyReporter, ANOMALY_UNEXPECTED_SEND_ERROR};
use crate::common::result::SendResult;
use crate::common::send_log::{self, SendPartStatus, SendTraceMeta};
use crate::common::stack_time::StackTime;
use crate::platform::info::PlatformInfo;
use crate::platform::stores::{MessageStore, MessageType, SentRecord, StoreHandle};

/// Protocol family of an encoded PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsFormat {
    ThreeGpp,
    ThreeGpp2,
}

impl SmsFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmsFormat::ThreeGpp => "3gpp",
            SmsFormat::ThreeGpp2 => "3gpp2",
        }
    }
}

/// Identity of the requesting application.
#[derive(Debug, Clone)]
pub struct AppIdentity {
    pub package: String,
    pub user_id: i32,
}

/// What the caller learns when a unit reaches its terminal state.
#[derive(Debug, Clone)]
pub struct SentNotice {
    pub result: SendResult,
    /// Technology-specific sub-code, when the radio or carrier supplied one.
    pub error_code: Option<i32>,
    /// Where the message was persisted, when it was.
    pub store_handle: Option<StoreHandle>,
    /// True for a single-part unit, or for the sibling whose completion
    /// finalized a multi-part message.
    pub last_part: bool,
    pub message_id: u64,
    pub format: SmsFormat,
    pub over_carrier: bool,
}

/// A delivery report for a previously sent unit.
#[derive(Debug, Clone)]
pub struct DeliveryNotice {
    pub message_ref: u32,
    pub status_pdu: Vec<u8>,
    pub format: SmsFormat,
}

/// Caller-supplied completion sink, invoked at most once.
pub struct SentCallback(Option<Box<dyn FnOnce(SentNotice) + Send>>);

impl SentCallback {
    pub fn new(f: impl FnOnce(SentNotice) + Send + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    /// Caller did not ask to be told.
    pub fn none() -> Self {
        Self(None)
    }

    /// Callback delivering into a channel; handy for callers that poll.
    pub fn channel() -> (Self, crossbeam_channel::Receiver<SentNotice>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (
            Self::new(move |notice| {
                let _ = tx.send(notice);
            }),
            rx,
        )
    }

    /// Fire the callback. Returns false when it already fired (or was never
    /// armed); the completion handler logs that case.
    pub fn fire(&mut self, notice: SentNotice) -> bool {
        match self.0.take() {
            Some(f) => {
                f(notice);
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.0.is_some()
    }
}

impl fmt::Debug for SentCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SentCallback({})", if self.is_armed() { "armed" } else { "spent" })
    }
}

/// Caller-supplied delivery-report sink, invoked at most once.
pub struct DeliveryCallback(Option<Box<dyn FnOnce(DeliveryNotice) + Send>>);

impl DeliveryCallback {
    pub fn new(f: impl FnOnce(DeliveryNotice) + Send + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    pub fn channel() -> (Self, crossbeam_channel::Receiver<DeliveryNotice>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (
            Self::new(move |notice| {
                let _ = tx.send(notice);
            }),
            rx,
        )
    }

    pub fn fire(&mut self, notice: DeliveryNotice) -> bool {
        match self.0.take() {
            Some(f) => {
                f(notice);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for DeliveryCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeliveryCallback({})", if self.0.is_some() { "armed" } else { "spent" })
    }
}

/// Message-level state shared by all sibling parts of one multi-part
/// message. Shared by reference; the counter decrement is the only place
/// where sibling completions meet, and carrier callbacks may touch it from
/// another execution context, hence the atomics.
#[derive(Debug, Clone)]
pub struct MultipartState {
    pub unsent_parts: Arc<AtomicUsize>,
    pub any_failed: Arc<AtomicBool>,
}

impl MultipartState {
    pub fn new(part_count: usize) -> Self {
        Self {
            unsent_parts: Arc::new(AtomicUsize::new(part_count)),
            any_failed: Arc::new(AtomicBool::new(false)),
        }
    }
}

static NEXT_UNIQUE_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-locally unique id for request de-duplication.
pub fn next_unique_message_id() -> u64 {
    NEXT_UNIQUE_MESSAGE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Tracks one PDU segment handed to a transport until it has been sent
/// successfully or we are done trying.
pub struct SmsTracker {
    pub dest_addr: String,
    pub sc_addr: Option<String>,
    /// Encoded PDU, opaque to this crate.
    pub pdu: Vec<u8>,
    /// Encoded service-center address, when one was given.
    pub smsc: Option<Vec<u8>>,

    pub sent_cb: SentCallback,
    pub delivery_cb: Option<DeliveryCallback>,

    pub retry_count: u32,
    pub max_retry_count: u32,

    /// TP message reference of this segment.
    pub message_ref: u8,
    pub priority: Option<u8>,
    pub validity_period_mins: Option<u32>,
    pub format: SmsFormat,

    /// Cross-process correlation id supplied by the caller; 0 when absent.
    pub message_id: u64,
    pub unique_message_id: u64,

    /// Present only for parts of a multi-part message.
    pub multipart: Option<MultipartState>,

    /// Set on first persist; all later state changes update this record.
    pub store_handle: Option<StoreHandle>,

    pub skip_short_code_check: bool,
    /// Voicemail-class message; exempt from short-code gating.
    pub is_for_vvm: bool,
    /// Lazily resolved and cached; `None` until first queried.
    pub from_default_app: Option<bool>,

    /// Number of times this unit was handed to the carrier service.
    pub carrier_attempts: u32,
    /// Raw status of the last carrier-service attempt, when there was one.
    pub carrier_status: Option<crate::common::result::CarrierSendStatus>,

    pub submitted_at: StackTime,
    /// More messages for the same destination follow on this link.
    pub expect_more: bool,
    pub is_text: bool,
    /// Full text of the (possibly multi-part) message, for persistence.
    pub full_text: Option<String>,
    /// Persist into the sent-message store on completion.
    pub persist: bool,

    pub app: AppIdentity,
    pub sub_id: i32,

    pub trace: Option<SendTraceMeta>,
}

impl fmt::Debug for SmsTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmsTracker")
            .field("dest_addr", &self.dest_addr)
            .field("message_ref", &self.message_ref)
            .field("retry_count", &self.retry_count)
            .field("message_id", &self.message_id)
            .field("unique_message_id", &self.unique_message_id)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl SmsTracker {
    /// Whether the caller app is the default messaging app. Resolved once
    /// and cached; the lookup is not cheap on real platforms.
    pub fn from_default_app(&mut self, platform: &dyn PlatformInfo) -> bool {
        *self
            .from_default_app
            .get_or_insert_with(|| platform.is_default_sms_app(&self.app.package))
    }

    pub fn interval_ms(&self, now: StackTime) -> u64 {
        now.diff(self.submitted_at).max(0) as u64
    }

    pub fn any_part_failed(&self) -> bool {
        self.multipart
            .as_ref()
            .map(|m| m.any_failed.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Count this part as completed. True when this was the single part or
    /// the last outstanding sibling; only that completion may finalize the
    /// persisted state of the whole message.
    fn complete_one_part(&self) -> bool {
        match &self.multipart {
            Some(m) => m.unsent_parts.fetch_sub(1, Ordering::SeqCst) == 1,
            None => true,
        }
    }

    fn should_persist(&mut self, platform: &dyn PlatformInfo) -> bool {
        self.is_text && self.persist && !self.from_default_app(platform)
    }

    /// Persist a new record or update the one we already wrote.
    fn persist_or_update(
        &mut self,
        store: &mut dyn MessageStore,
        platform: &dyn PlatformInfo,
        msg_type: MessageType,
        error_code: Option<i32>,
    ) {
        if let Some(handle) = self.store_handle {
            store.update(handle, msg_type, error_code);
        } else if self.should_persist(platform) {
            self.store_handle = store.insert(SentRecord {
                sub_id: self.sub_id,
                dest_addr: self.dest_addr.clone(),
                body: self.full_text.clone(),
                creator: Some(self.app.package.clone()),
                msg_type,
                error_code,
                delivery_pending: self.delivery_cb.is_some(),
            });
        }
    }

    /// Terminal success of this part. The last sibling finalizes the
    /// persisted message, classified by the shared any-failed flag.
    pub fn on_sent(&mut self, store: &mut dyn MessageStore, platform: &dyn PlatformInfo) {
        let last = self.complete_one_part();
        if last {
            let msg_type = if self.any_part_failed() {
                MessageType::Failed
            } else {
                MessageType::Sent
            };
            self.persist_or_update(store, platform, msg_type, None);
        }
        if let Some(tr) = &self.trace {
            send_log::update_part_status(tr.job_id, tr.part_index, SendPartStatus::Sent);
        }
        let notice = self.notice(SendResult::Ok, None, last);
        if !self.sent_cb.fire(notice) && self.message_id != 0 {
            tracing::debug!("sent callback already spent, message_id={}", self.message_id);
        }
    }

    /// Terminal failure of this part.
    pub fn on_failed(
        &mut self,
        store: &mut dyn MessageStore,
        platform: &dyn PlatformInfo,
        reporter: &mut dyn AnomalyReporter,
        error: SendResult,
        error_code: Option<i32>,
    ) {
        if let Some(m) = &self.multipart {
            m.any_failed.store(true, Ordering::SeqCst);
        }
        let last = self.complete_one_part();
        if last {
            self.persist_or_update(store, platform, MessageType::Failed, error_code);
        }
        if let Some(tr) = &self.trace {
            send_log::set_part_error(tr.job_id, tr.part_index, format!("{error:?}"));
        }
        let notice = self.notice(error, error_code, last);
        if !self.sent_cb.fire(notice) && self.message_id != 0 {
            tracing::debug!("sent callback already spent, message_id={}", self.message_id);
        }
        if !error.is_expected_failure() {
            reporter.report(
                ANOMALY_UNEXPECTED_SEND_ERROR,
                &format!("send failed with {error:?}, error_code {error_code:?}"),
            );
        }
    }

    fn notice(&self, result: SendResult, error_code: Option<i32>, last: bool) -> SentNotice {
        SentNotice {
            result,
            error_code,
            store_handle: self.store_handle,
            last_part: match &self.multipart {
                Some(_) => last,
                None => true,
            },
            message_id: self.message_id,
            format: self.format,
            over_carrier: self.carrier_attempts > 0,
        }
    }
}
