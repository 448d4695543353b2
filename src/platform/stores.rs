use std::fmt;

/// Opaque key of a persisted message record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreHandle(pub u64);

/// Final folder of a persisted outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Sent,
    Failed,
}

#[derive(Debug, Clone)]
pub struct SentRecord {
    pub sub_id: i32,
    pub dest_addr: String,
    pub body: Option<String>,
    pub creator: Option<String>,
    pub msg_type: MessageType,
    pub error_code: Option<i32>,
    /// A delivery report was requested; the record starts in pending state.
    pub delivery_pending: bool,
}

/// Keyed store for sent/failed message records.
pub trait MessageStore: Send {
    /// Persist a new record. `None` means the store refused the write; the
    /// send itself is unaffected.
    fn insert(&mut self, record: SentRecord) -> Option<StoreHandle>;
    fn update(&mut self, handle: StoreHandle, msg_type: MessageType, error_code: Option<i32>);
    fn set_delivery_status(&mut self, handle: StoreHandle, status: u8);
}

#[derive(Debug, Clone)]
pub struct StoreError(pub String);

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store error: {}", self.0)
    }
}

impl std::error::Error for StoreError {}

/// Sentinel for "no TP-MR recorded".
pub const TPMR_NOT_SET: i32 = -1;

/// SIM-resident record of the last used TP message reference.
pub trait SimRecords: Send {
    fn tpmr(&self) -> Result<i32, StoreError>;
    fn set_tpmr(&mut self, value: i32) -> Result<(), StoreError>;
}

/// Subscription database copy of the last used TP message reference.
pub trait SubscriptionStore: Send {
    fn last_tpmr(&self, sub_id: i32) -> Result<i32, StoreError>;
    fn set_last_tpmr(&mut self, sub_id: i32, value: i32) -> Result<(), StoreError>;
}
