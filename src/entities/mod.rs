use crate::common::messagerouter::MessageQueue;
use crate::common::stack_time::StackTime;
use crate::saps::sapmsg::{SapMsg, StackEntity};

pub mod dispatch;

/// An active component registered with the router.
pub trait StackEntityTrait {
    fn entity(&self) -> StackEntity;

    /// Handle one primitive addressed to this entity. Outgoing primitives
    /// go onto `queue`.
    fn rx_prim(&mut self, queue: &mut MessageQueue, message: SapMsg);

    /// Called once per loop iteration before delivery; entities that pump
    /// external inputs (channels) drain them here.
    fn tick_start(&mut self, _queue: &mut MessageQueue, _now: StackTime) {}
}
