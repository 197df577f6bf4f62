//! Keyed storage that lends values with a promise to give them back.
//!
//! The first borrower of a key gets the value immediately. Everyone after
//! them is queued and resumed in the exact order they called [`Storage::borrow`],
//! each seeing the value the previous holder passed to [`Storage::give_back`].
//! Unrelated keys never contend with each other beyond the brief top-level
//! map lock.

use std::collections::{HashMap, VecDeque};
use std::collections::hash_map::Entry;
use std::hash::Hash;
use std::sync::Mutex;

use tokio::sync::oneshot;

pub struct Storage<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
}

struct Slot<V> {
    /// `Some` while the value sits on the shelf, `None` while a borrower
    /// holds it. A `Some` value implies an empty waiter queue.
    value: Option<V>,
    waiters: VecDeque<oneshot::Sender<V>>,
}

impl<K, V> Storage<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Initializes the slot for `key`.
    ///
    /// # Panics
    ///
    /// Panics if the key already exists. Updating an existing slot goes
    /// through `borrow` + `give_back`.
    pub fn set(&self, key: K, value: V) {
        let mut slots = self.slots.lock().expect("borrowonce map lock poisoned");

        match slots.entry(key) {
            Entry::Occupied(_) => {
                panic!("tried to set an existing key in borrowonce::Storage; use give_back instead")
            }
            Entry::Vacant(entry) => {
                entry.insert(Slot {
                    value: Some(value),
                    waiters: VecDeque::new(),
                });
            }
        }
    }

    /// Requests a turn to hold the value under `key`. Returns `None` if the
    /// key is unknown, otherwise a [`Future`] that resolves immediately when
    /// the slot is idle, or once every earlier borrower has given the value
    /// back.
    pub fn borrow(&self, key: &K) -> Option<Future<V>> {
        let mut slots = self.slots.lock().expect("borrowonce map lock poisoned");
        let slot = slots.get_mut(key)?;

        if slot.waiters.is_empty() {
            if let Some(value) = slot.value.take() {
                return Some(Future::ready(value));
            }
        }

        let (sender, receiver) = oneshot::channel();
        slot.waiters.push_back(sender);

        Some(Future {
            inner: Inner::Pending(receiver),
        })
    }

    /// Stores `value` under `key` and hands it to the next waiter, if any.
    ///
    /// # Panics
    ///
    /// Panics if the key is unknown; a slot must be created with `set` first.
    pub fn give_back(&self, key: &K, value: V) {
        let mut slots = self.slots.lock().expect("borrowonce map lock poisoned");
        let Some(slot) = slots.get_mut(key) else {
            panic!("tried to give back a key that is not in borrowonce::Storage; use set instead")
        };

        let mut value = value;

        while let Some(waiter) = slot.waiters.pop_front() {
            match waiter.send(value) {
                Ok(()) => return,
                // The waiter is gone; the next one in line inherits its turn.
                Err(returned) => value = returned,
            }
        }

        slot.value = Some(value);
    }
}

impl<K, V> Default for Storage<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

/// A position in the borrow queue of one key. [`Future::wait`] consumes the
/// future, so each position yields the value exactly once; the holder is then
/// expected to call [`Storage::give_back`].
pub struct Future<V> {
    inner: Inner<V>,
}

enum Inner<V> {
    Ready(V),
    Pending(oneshot::Receiver<V>),
}

impl<V> Future<V> {
    /// A future that is already resolved. Used for values that never entered
    /// a store and therefore have no predecessors to wait for.
    pub fn ready(value: V) -> Self {
        Self {
            inner: Inner::Ready(value),
        }
    }

    /// Resolves to the value once it is this holder's turn.
    pub async fn wait(self) -> V {
        match self.inner {
            Inner::Ready(value) => value,
            Inner::Pending(receiver) => receiver
                .await
                .expect("borrow-once slot dropped while a borrower was waiting"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    #[test]
    fn borrow_of_unknown_key_returns_none() {
        let store: Storage<&str, &str> = Storage::new();

        assert!(store.borrow(&"missing").is_none());
    }

    #[tokio::test]
    async fn set_then_borrow_resolves_immediately() {
        let store = Storage::new();
        store.set("key", "value");

        let future = store.borrow(&"key").expect("slot was just set");
        assert_eq!(future.wait().await, "value");
    }

    #[tokio::test]
    async fn second_borrower_sees_the_updated_value() {
        let store = Storage::new();
        store.set("key", "v0");

        let first = store.borrow(&"key").expect("slot exists");
        let second = store.borrow(&"key").expect("slot exists");

        assert_eq!(first.wait().await, "v0");
        store.give_back(&"key", "v1");
        assert_eq!(second.wait().await, "v1");
    }

    #[tokio::test]
    async fn waiters_resume_in_borrow_order() {
        let store = Arc::new(Storage::new());
        store.set("key", 0u32);

        let first = store.borrow(&"key").expect("slot exists");
        let second = store.borrow(&"key").expect("slot exists");
        let third = store.borrow(&"key").expect("slot exists");

        assert_eq!(first.wait().await, 0, "the idle slot resolves immediately");

        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        for (position, future) in [(2u32, second), (3u32, third)] {
            let done_tx = done_tx.clone();
            tokio::spawn(async move {
                let value = future.wait().await;
                done_tx.send((position, value)).expect("test channel open");
            });
        }

        store.give_back(&"key", 1);
        assert_eq!(done_rx.recv().await, Some((2, 1)));
        assert!(
            done_rx.try_recv().is_err(),
            "the third borrower must not resume before the second gives back"
        );

        store.give_back(&"key", 2);
        assert_eq!(done_rx.recv().await, Some((3, 2)));
    }

    #[tokio::test]
    async fn give_back_skips_dropped_waiters() {
        let store = Storage::new();
        store.set("key", "v0");

        let first = store.borrow(&"key").expect("slot exists");
        let abandoned = store.borrow(&"key").expect("slot exists");
        let survivor = store.borrow(&"key").expect("slot exists");

        assert_eq!(first.wait().await, "v0");
        drop(abandoned);

        store.give_back(&"key", "v1");
        assert_eq!(survivor.wait().await, "v1");
    }

    #[test]
    #[should_panic(expected = "tried to set an existing key")]
    fn set_twice_panics() {
        let store = Storage::new();
        store.set("key", "value");
        store.set("key", "value");
    }

    #[test]
    #[should_panic(expected = "tried to give back a key")]
    fn give_back_of_unknown_key_panics() {
        let store: Storage<&str, &str> = Storage::new();
        store.give_back(&"missing", "value");
    }
}
