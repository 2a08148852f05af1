//! Owned per-context event accumulator.
//!
//! Producers append under a short mutex hold; the flush cycle takes the
//! whole accumulation in one swap, so producers are never blocked waiting
//! for a flush to finish.

use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug)]
pub struct EventBuffer<E> {
    inner: Mutex<HashMap<Uuid, Vec<E>>>,
}

impl<E> EventBuffer<E> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn push(&self, exec_context_id: Uuid, event: E) {
        self.inner
            .lock()
            .entry(exec_context_id)
            .or_default()
            .push(event);
    }

    /// Atomically take everything accumulated so far, leaving the buffer
    /// empty.
    pub fn drain(&self) -> HashMap<Uuid, Vec<E>> {
        std::mem::take(&mut *self.inner.lock())
    }

    /// Put events back at the front of a context's accumulation, keeping
    /// their original order ahead of anything that arrived since. Used
    /// when a flush fails and must be retried.
    pub fn restore(&self, exec_context_id: Uuid, events: Vec<E>) {
        if events.is_empty() {
            return;
        }
        let mut inner = self.inner.lock();
        let slot = inner.entry(exec_context_id).or_default();
        let newer = std::mem::replace(slot, events);
        slot.extend(newer);
    }

    /// Discard everything accumulated for a context. Used on context
    /// deletion.
    pub fn drop_context(&self, exec_context_id: Uuid) {
        self.inner.lock().remove(&exec_context_id);
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn pending_contexts(&self) -> usize {
        self.inner.lock().len()
    }
}

impl<E> Default for EventBuffer<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_empties_buffer() {
        let buffer = EventBuffer::new();
        let ctx = Uuid::new_v4();
        buffer.push(ctx, 1);
        buffer.push(ctx, 2);

        let drained = buffer.drain();
        assert_eq!(drained[&ctx], vec![1, 2]);
        assert!(buffer.is_empty());
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn test_restore_keeps_order_ahead_of_new_events() {
        let buffer = EventBuffer::new();
        let ctx = Uuid::new_v4();
        buffer.push(ctx, 1);
        let drained = buffer.drain();

        buffer.push(ctx, 2);
        buffer.restore(ctx, drained[&ctx].clone());

        let again = buffer.drain();
        assert_eq!(again[&ctx], vec![1, 2]);
    }

    #[test]
    fn test_drop_context_is_scoped() {
        let buffer = EventBuffer::new();
        let keep = Uuid::new_v4();
        let drop = Uuid::new_v4();
        buffer.push(keep, 1);
        buffer.push(drop, 2);

        buffer.drop_context(drop);
        let drained = buffer.drain();
        assert!(drained.contains_key(&keep));
        assert!(!drained.contains_key(&drop));
    }
}
