//! The state-binding queue between the fetcher and the worker pool.
//!
//! Each update is paired with a future for its conversation state and a
//! future for the sender's shared data before any worker sees it.

use crate::dispatch::UserSharedData;
use crate::state::State;
use crate::update::{Update, UserId};
use standup_core::borrowonce::{Future, Storage};
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::mpsc;

/// One unit of work for the pool: the update plus this job's turn at the
/// conversation state and the user-shared data.
pub(crate) struct Job {
    pub(crate) update: Update,
    pub(crate) state: Future<State>,
    pub(crate) user_data: Future<UserSharedData>,
}

pub(crate) struct Binder {
    pub(crate) conversations: Arc<Storage<String, State>>,
    pub(crate) users: Arc<Storage<UserId, UserSharedData>>,
    pub(crate) updates_rx: mpsc::Receiver<Update>,
    pub(crate) jobs_tx: mpsc::Sender<Job>,
}

impl Binder {
    /// Because `borrow` is synchronous and FIFO, the order in which this
    /// loop creates futures for a key equals the order in which they
    /// resolve: two updates of the same conversation are handled strictly
    /// in arrival order, no matter which workers pick them up or how the
    /// workers interleave otherwise.
    pub(crate) async fn run(mut self) {
        while let Some(update) = self.updates_rx.recv().await {
            let state = match update.state_key() {
                Some(key) => take_slot(&self.conversations, key, State::default),
                None => Future::ready(State::default()),
            };
            let user_data = match update.user_key() {
                Some(key) => take_slot(&self.users, key, UserSharedData::default),
                None => Future::ready(UserSharedData::default()),
            };

            let job = Job {
                update,
                state,
                user_data,
            };
            if self.jobs_tx.send(job).await.is_err() {
                // The workers are gone; drain no further.
                return;
            }
        }
    }
}

/// Borrows `key` from the store, initializing the slot first when the store
/// has never seen it. Each slot gets its own freshly constructed initial
/// value; sharing one instance would leak state between conversations.
fn take_slot<K, V>(store: &Storage<K, V>, key: K, initial: impl FnOnce() -> V) -> Future<V>
where
    K: Eq + Hash + Clone,
{
    if let Some(future) = store.borrow(&key) {
        return future;
    }

    store.set(key.clone(), initial());

    store
        .borrow(&key)
        .expect("borrow-once store did not lend a value right after it was set")
}
