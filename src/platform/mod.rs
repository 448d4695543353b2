//! Consumed platform interfaces.
//!
//! Everything the dispatch core needs from the rest of the device is behind
//! a trait here: PDU encoding, the persistent message store, the SIM and
//! subscription stores, the usage monitor and the carrier messaging
//! service. Production wires real backends; tests wire fakes.

pub mod carrier;
pub mod encoder;
pub mod info;
pub mod stores;
pub mod usage;

pub use carrier::{CarrierMessagingService, CarrierServiceLookup};
pub use encoder::{ConcatHeader, SmsEncoder, SubmitPdu};
pub use info::PlatformInfo;
pub use stores::{
    MessageStore, MessageType, SentRecord, SimRecords, StoreError, StoreHandle,
    SubscriptionStore, TPMR_NOT_SET,
};
pub use usage::{PremiumPermission, ShortCodeCategory, UsageMonitor};
