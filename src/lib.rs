//! Outbound short-message dispatch stack.
//!
//! The stack is organized as a set of entities exchanging typed primitives
//! over a single-threaded, message-ordered router:
//!
//! - `Gateway` ingests application send requests (and consent decisions)
//!   from other threads into the loop,
//! - `Dispatch` owns the tracked-unit model: it encodes requests into one or
//!   more submissions, gates them behind short-code / volume confirmation,
//!   routes them to a carrier messaging service or to the radio channel, and
//!   drives retry and completion,
//! - `Radio` is the external radio submission channel (consumed interface),
//! - `ConsentUi` is the external confirmation surface (consumed interface).
//!
//! All deferred work (retry delays, carrier-service timeouts) is expressed
//! as future-dated primitives on the same queue, so per-unit state never
//! needs locking.

pub mod common;
pub mod config;
pub mod entities;
pub mod gateway;
pub mod platform;
pub mod saps;

#[cfg(test)]
pub(crate) mod testutil;

/// Log-and-ignore for primitives an entity receives but does not handle.
#[macro_export]
macro_rules! unhandled_log {
    ($what:expr) => {
        tracing::warn!("unhandled primitive: {}", $what)
    };
}
