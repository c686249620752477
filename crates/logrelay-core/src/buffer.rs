//! Sequenced ring buffer with delta tracking.
//!
//! [`MessageBuffer`] stores items under a dense, ever-increasing `u64`
//! key and remembers how far the last delivery got. Three cursors drive
//! everything:
//!
//! - `oldest_index` -- smallest key that has not been evicted
//! - `current_index` -- next key to assign, never reused
//! - `last_output_index` -- boundary of what has already been drained
//!
//! When more than `capacity` entries are live the oldest is evicted. If
//! delivery falls behind eviction the evicted entries are skipped by the
//! next drain rather than reported as an error; buffered observability
//! data is allowed to be lost under sustained overload.
//!
//! [`SharedBuffer`] wraps a buffer in a coarse mutex so any number of
//! producer threads can append while the broadcast loop drains.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use logrelay_types::MessageBlock;

/// Fixed-capacity, insertion-ordered store keyed by sequence number.
#[derive(Debug, Clone)]
pub struct MessageBuffer<T> {
    /// Live entries keyed by sequence number.
    entries: BTreeMap<u64, T>,
    /// Maximum number of live entries.
    capacity: usize,
    /// Smallest key not yet evicted.
    oldest_index: u64,
    /// Next key to assign.
    current_index: u64,
    /// Keys below this have already been drained.
    last_output_index: u64,
}

impl<T: Clone> MessageBuffer<T> {
    /// Create an empty buffer holding at most `capacity` entries.
    pub const fn new(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            capacity,
            oldest_index: 0,
            current_index: 0,
            last_output_index: 0,
        }
    }

    /// Append an item, evicting the oldest entries while over capacity.
    ///
    /// Returns the key assigned to the item. With a capacity of zero the
    /// item is evicted immediately but its key is still consumed.
    pub fn append(&mut self, item: T) -> u64 {
        let key = self.current_index;
        self.current_index = self.current_index.saturating_add(1);
        self.entries.insert(key, item);

        while self.entries.len() > self.capacity {
            self.entries.remove(&self.oldest_index);
            self.oldest_index = self.oldest_index.saturating_add(1);
        }

        key
    }

    /// Number of keys assigned since the last drain.
    ///
    /// Counts keys, not surviving entries: evicted keys in the pending
    /// range are included here and skipped by [`drain_pending`](Self::drain_pending).
    pub const fn pending_count(&self) -> u64 {
        self.current_index.saturating_sub(self.last_output_index)
    }

    /// Collect every still-live entry appended since the last drain and
    /// mark them delivered.
    ///
    /// Not idempotent: an immediate second call returns an empty block.
    pub fn drain_pending(&mut self) -> MessageBlock<T> {
        let block = self
            .entries
            .range(self.last_output_index..self.current_index)
            .map(|(_, item)| item.clone())
            .collect();
        self.last_output_index = self.current_index;
        block
    }

    /// All live entries in key order. Does not move any cursor.
    pub fn snapshot(&self) -> MessageBlock<T> {
        self.entries.values().cloned().collect()
    }

    /// Remove the lowest-key entry matching `predicate`.
    ///
    /// Returns `true` if an entry was removed. Cursors are untouched, so
    /// the retracted key simply becomes a gap.
    pub fn remove_first<F>(&mut self, mut predicate: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        let key = self
            .entries
            .iter()
            .find(|(_, item)| predicate(item))
            .map(|(key, _)| *key);

        key.is_some_and(|key| self.entries.remove(&key).is_some())
    }

    /// Drop every entry and reset all cursors to zero.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.oldest_index = 0;
        self.current_index = 0;
        self.last_output_index = 0;
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the buffer holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of live entries.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Smallest key not yet evicted.
    pub const fn oldest_index(&self) -> u64 {
        self.oldest_index
    }

    /// Next key to be assigned.
    pub const fn current_index(&self) -> u64 {
        self.current_index
    }

    /// Boundary up to which entries have been drained.
    pub const fn last_output_index(&self) -> u64 {
        self.last_output_index
    }

    /// Keys of all live entries, ascending.
    pub fn keys(&self) -> Vec<u64> {
        self.entries.keys().copied().collect()
    }
}

/// A [`MessageBuffer`] behind a mutex, shared between producers and the
/// broadcast loop.
///
/// Every method takes the lock for its whole duration, so an append can
/// never interleave with a drain or snapshot. A poisoned lock is
/// recovered: the buffer is consistent between method calls, so the
/// panic that poisoned it cannot have left it half-updated.
#[derive(Debug)]
pub struct SharedBuffer<T> {
    inner: Mutex<MessageBuffer<T>>,
}

impl<T: Clone> SharedBuffer<T> {
    /// Create a shared buffer with the given capacity.
    pub const fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(MessageBuffer::new(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MessageBuffer<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// See [`MessageBuffer::append`].
    pub fn append(&self, item: T) -> u64 {
        self.lock().append(item)
    }

    /// See [`MessageBuffer::pending_count`].
    pub fn pending_count(&self) -> u64 {
        self.lock().pending_count()
    }

    /// See [`MessageBuffer::drain_pending`].
    pub fn drain_pending(&self) -> MessageBlock<T> {
        self.lock().drain_pending()
    }

    /// See [`MessageBuffer::snapshot`].
    pub fn snapshot(&self) -> MessageBlock<T> {
        self.lock().snapshot()
    }

    /// See [`MessageBuffer::remove_first`].
    pub fn remove_first<F>(&self, predicate: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        self.lock().remove_first(predicate)
    }

    /// See [`MessageBuffer::clear`].
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// See [`MessageBuffer::len`].
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// See [`MessageBuffer::is_empty`].
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// See [`MessageBuffer::capacity`].
    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Arc;

    use logrelay_types::{NotificationMessage, SimpleMessage};

    use super::*;

    fn texts(block: &MessageBlock<SimpleMessage>) -> Vec<&str> {
        block.messages.iter().map(|m| m.message.as_str()).collect()
    }

    fn filled(capacity: usize, items: &[&str]) -> MessageBuffer<SimpleMessage> {
        let mut buffer = MessageBuffer::new(capacity);
        for item in items {
            buffer.append(SimpleMessage::new(*item));
        }
        buffer
    }

    #[test]
    fn capacity_invariant_holds_after_every_append() {
        for capacity in 0..6_usize {
            let mut buffer = MessageBuffer::new(capacity);
            for n in 0..20_u64 {
                buffer.append(n);
                assert!(buffer.len() <= capacity);

                // Live keys are exactly the most recent `capacity` keys.
                let total = n + 1;
                let live = total.min(capacity as u64);
                let expected: Vec<u64> = (total - live..total).collect();
                assert_eq!(buffer.keys(), expected, "capacity {capacity}");
            }
        }
    }

    #[test]
    fn eviction_before_drain_skips_evicted_entries() {
        let mut buffer = filled(3, &["A", "B", "C", "D"]);

        assert_eq!(buffer.keys(), vec![1, 2, 3]);
        assert_eq!(buffer.oldest_index(), 1);
        assert_eq!(buffer.last_output_index(), 0);
        assert_eq!(buffer.pending_count(), 4);

        let block = buffer.drain_pending();
        assert_eq!(texts(&block), vec!["B", "C", "D"]);
        assert_eq!(buffer.last_output_index(), 4);
        assert_eq!(buffer.pending_count(), 0);
    }

    #[test]
    fn append_after_drain_yields_only_the_increment() {
        let mut buffer = filled(3, &["A", "B", "C", "D"]);
        buffer.drain_pending();

        let key = buffer.append(SimpleMessage::new("E"));
        assert_eq!(key, 4);
        assert_eq!(buffer.pending_count(), 1);
        assert_eq!(texts(&buffer.drain_pending()), vec!["E"]);
    }

    #[test]
    fn second_drain_is_empty() {
        let mut buffer = filled(10, &["x", "y"]);
        assert_eq!(buffer.drain_pending().len(), 2);
        assert!(buffer.drain_pending().is_empty());
        assert_eq!(buffer.pending_count(), 0);
    }

    #[test]
    fn no_duplicate_no_loss_across_drains() {
        let mut buffer = MessageBuffer::new(100);
        let mut delivered = Vec::new();

        for round in 0..5_u32 {
            for i in 0..7_u32 {
                buffer.append(round * 100 + i);
            }
            delivered.extend(buffer.drain_pending().messages);
        }

        let expected: Vec<u32> = (0..5_u32)
            .flat_map(|round| (0..7_u32).map(move |i| round * 100 + i))
            .collect();
        assert_eq!(delivered, expected);
    }

    #[test]
    fn snapshot_returns_everything_without_moving_cursors() {
        let mut buffer = filled(3, &["A", "B", "C", "D"]);
        buffer.drain_pending();
        buffer.append(SimpleMessage::new("E"));

        let snapshot = buffer.snapshot();
        assert_eq!(texts(&snapshot), vec!["C", "D", "E"]);
        assert_eq!(buffer.pending_count(), 1);
        assert_eq!(buffer.last_output_index(), 4);
    }

    #[test]
    fn zero_capacity_evicts_immediately() {
        let mut buffer = filled(0, &["A", "B"]);
        assert!(buffer.is_empty());
        assert_eq!(buffer.current_index(), 2);
        assert_eq!(buffer.pending_count(), 2);
        assert!(buffer.drain_pending().is_empty());
        assert_eq!(buffer.pending_count(), 0);
    }

    #[test]
    fn remove_first_retracts_lowest_matching_key() {
        let mut buffer = filled(10, &["keep", "drop", "keep", "drop"]);

        assert!(buffer.remove_first(|m| m.message == "drop"));
        assert_eq!(buffer.keys(), vec![0, 2, 3]);
        assert_eq!(buffer.current_index(), 4);

        assert!(!buffer.remove_first(|m| m.message == "missing"));
        assert_eq!(texts(&buffer.drain_pending()), vec!["keep", "keep", "drop"]);
    }

    #[test]
    fn eviction_steps_over_retracted_gaps() {
        let mut buffer = filled(3, &["A", "B", "C"]);
        assert!(buffer.remove_first(|m| m.message == "A"));

        // Room for one more without eviction.
        buffer.append(SimpleMessage::new("D"));
        assert_eq!(buffer.keys(), vec![1, 2, 3]);

        // Next append must walk past the retracted key 0 to evict B.
        buffer.append(SimpleMessage::new("E"));
        assert_eq!(texts(&buffer.snapshot()), vec!["C", "D", "E"]);
        assert_eq!(buffer.oldest_index(), 2);
    }

    #[test]
    fn clear_resets_cursors() {
        let mut buffer = filled(2, &["A", "B", "C"]);
        buffer.drain_pending();
        buffer.clear();

        assert!(buffer.is_empty());
        assert_eq!(buffer.oldest_index(), 0);
        assert_eq!(buffer.current_index(), 0);
        assert_eq!(buffer.last_output_index(), 0);
        assert_eq!(buffer.append(SimpleMessage::new("fresh")), 0);
    }

    #[test]
    fn buffer_is_generic_over_message_type() {
        let mut buffer = MessageBuffer::new(2);
        buffer.append(NotificationMessage::new(7, "raid"));
        buffer.append(NotificationMessage::new(8, "follow"));
        buffer.append(NotificationMessage::new(9, "sub"));

        let ids: Vec<i64> = buffer.drain_pending().messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![8, 9]);
    }

    #[test]
    fn shared_buffer_accepts_concurrent_producers() {
        let shared = Arc::new(SharedBuffer::new(10_000));

        let handles: Vec<_> = (0..4_u32)
            .map(|producer| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || {
                    for i in 0..250_u32 {
                        shared.append((producer, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(shared.pending_count(), 1000);
        let block = shared.drain_pending();
        assert_eq!(block.len(), 1000);

        // Each producer's own appends stay in order.
        for producer in 0..4_u32 {
            let seen: Vec<u32> = block
                .messages
                .iter()
                .filter(|(p, _)| *p == producer)
                .map(|(_, i)| *i)
                .collect();
            assert_eq!(seen, (0..250).collect::<Vec<_>>());
        }
        assert!(shared.drain_pending().is_empty());
    }
}
