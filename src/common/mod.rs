pub mod anomaly;
pub mod concat_ref;
pub mod message_ref;
pub mod messagerouter;
pub mod result;
pub mod send_log;
pub mod stack_time;
pub mod stats;
pub mod tracker;
