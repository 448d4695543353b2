use std::collections::{HashMap, VecDeque};

use crate::common::stack_time::StackTime;
use crate::config::stack_config::SharedConfig;
use crate::entities::StackEntityTrait;
use crate::saps::sapmsg::{SapMsg, StackEntity};

pub struct MessageQueue {
    messages: VecDeque<SapMsg>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self {
            messages: VecDeque::new(),
        }
    }

    pub fn push_back(&mut self, message: SapMsg) {
        self.messages.push_back(message);
    }

    pub fn pop_front(&mut self) -> Option<SapMsg> {
        self.messages.pop_front()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-threaded router delivering primitives between entities in strict
/// arrival order. A primitive stamped with a future due time is rotated to
/// the back of the queue until it is due; that one mechanism carries the
/// retry delay and the carrier-service timeout without any timer thread.
pub struct MessageRouter {
    /// While currently unused by the MessageRouter itself, entities are
    /// constructed from the same config; we keep a copy for symmetry.
    config: SharedConfig,
    entities: HashMap<StackEntity, Box<dyn StackEntityTrait>>,
    msg_queue: MessageQueue,
    now: StackTime,
}

impl MessageRouter {
    pub fn new(config: SharedConfig) -> Self {
        Self {
            config,
            entities: HashMap::new(),
            msg_queue: MessageQueue::new(),
            now: StackTime::default(),
        }
    }

    pub fn now(&self) -> StackTime {
        self.now
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    pub fn register_entity(&mut self, entity: Box<dyn StackEntityTrait>) {
        let entity_id = entity.entity();
        tracing::debug!("register_entity {:?}", entity_id);
        self.entities.insert(entity_id, entity);
    }

    pub fn get_entity(&mut self, entity_id: StackEntity) -> Option<&mut (dyn StackEntityTrait + '_)> {
        self.entities.get_mut(&entity_id).map(|entity| &mut **entity as &mut dyn StackEntityTrait)
    }

    pub fn submit_message(&mut self, message: SapMsg) {
        tracing::debug!(
            "submit_message {:?}: {:?} -> {:?}",
            message.get_sap(),
            message.get_source(),
            message.get_dest()
        );
        self.msg_queue.push_back(message);
    }

    fn deliver_one_due_or_rotate(&mut self) -> bool {
        let Some(message) = self.msg_queue.pop_front() else {
            return false;
        };

        // If the message is in the future, rotate it to the back and do NOT
        // deliver.
        if message.dltime.diff(self.now) > 0 {
            self.msg_queue.push_back(message);
            return false;
        }

        tracing::debug!(
            "deliver_message: got {:?}: {:?} -> {:?} (dltime={}, now={})",
            message.get_sap(),
            message.get_source(),
            message.get_dest(),
            message.dltime,
            self.now
        );

        let dest = message.get_dest();
        if let Some(entity) = self.entities.get_mut(&dest) {
            entity.rx_prim(&mut self.msg_queue, message);
        } else {
            tracing::warn!(
                "deliver_message: entity {:?} not found for {:?}: {:?} -> {:?}",
                dest,
                message.get_sap(),
                message.get_source(),
                message.get_dest()
            );
        }

        true
    }

    /// Deliver every due message. Multiple passes, because delivering one
    /// message may enqueue more "due now" messages; stop once a whole pass
    /// delivered nothing (everything remaining is in the future).
    pub fn deliver_all_messages(&mut self) {
        loop {
            let n = self.msg_queue.len();
            if n == 0 {
                break;
            }

            let mut progressed = false;

            for _ in 0..n {
                // Either delivers a due message, or rotates a future one.
                if self.deliver_one_due_or_rotate() {
                    progressed = true;
                }
            }

            if !progressed {
                break;
            }
        }
    }

    /// One loop iteration at the current time: let every entity pump its
    /// external inputs, then drain the queue.
    pub fn tick(&mut self) {
        for entity in self.entities.values_mut() {
            entity.tick_start(&mut self.msg_queue, self.now);
        }
        self.deliver_all_messages();
    }

    /// Move time forward and run a tick at the new instant.
    pub fn advance(&mut self, ms: u64) {
        self.now = self.now.add_ms(ms);
        self.tick();
    }

    /// Advance in fixed steps until `total_ms` has elapsed. Useful when a
    /// test needs intermediate deadlines (retries, timeouts) to fire in
    /// order.
    pub fn run_for(&mut self, total_ms: u64, step_ms: u64) {
        let step = step_ms.max(1);
        let mut elapsed = 0;
        while elapsed < total_ms {
            let d = step.min(total_ms - elapsed);
            self.advance(d);
            elapsed += d;
        }
    }

    pub fn get_msgqueue_len(&self) -> usize {
        self.msg_queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::stack_time::StackTime;
    use crate::config;
    use crate::saps::sapmsg::{Sap, SapMsgInner};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder {
        seen: Rc<RefCell<Vec<u64>>>,
    }

    impl StackEntityTrait for Recorder {
        fn entity(&self) -> StackEntity {
            StackEntity::Radio
        }

        fn rx_prim(&mut self, _queue: &mut MessageQueue, message: SapMsg) {
            self.seen.borrow_mut().push(message.dltime.as_ms());
        }
    }

    fn probe(dltime: StackTime) -> SapMsg {
        SapMsg::new(
            Sap::Local,
            StackEntity::Dispatch,
            StackEntity::Radio,
            dltime,
            SapMsgInner::CarrierTimeoutInd { bridge_id: 0 },
        )
    }

    #[test]
    fn future_messages_wait_until_due() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut router = MessageRouter::new(config::shared(Default::default()));
        router.register_entity(Box::new(Recorder { seen: seen.clone() }));

        router.submit_message(probe(StackTime::from_ms(500)));
        router.submit_message(probe(StackTime::from_ms(0)));

        router.tick();
        assert_eq!(*seen.borrow(), vec![0]);

        router.advance(499);
        assert_eq!(*seen.borrow(), vec![0]);

        router.advance(1);
        assert_eq!(*seen.borrow(), vec![0, 500]);
        assert_eq!(router.get_msgqueue_len(), 0);
    }
}
