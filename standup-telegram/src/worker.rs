//! The pool of update processors.

use crate::api::ApiRequester;
use crate::binder::Job;
use crate::dispatch::{dispatch, UserSharedData};
use crate::state::{Responses, State};
use crate::update::{User, UserId};
use standup_core::borrowonce::Storage;
use std::sync::Arc;
use tokio::sync::mpsc;

pub(crate) struct Worker {
    pub(crate) bot: User,
    pub(crate) requester: Arc<ApiRequester>,
    pub(crate) responses: Arc<Responses>,
    pub(crate) conversations: Arc<Storage<String, State>>,
    pub(crate) users: Arc<Storage<UserId, UserSharedData>>,
    /// Shared by the whole pool; whichever worker is free takes the next job.
    pub(crate) jobs_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
}

impl Worker {
    /// Runs until the job channel closes. A panicking handler unwinds
    /// through here into the task guard, which reports it as fatal; the
    /// conversation slot is deliberately not returned in that case, since
    /// the process is going down anyway and a successor must not observe a
    /// half-applied state.
    pub(crate) async fn run(self) {
        loop {
            let job = {
                let mut jobs_rx = self.jobs_rx.lock().await;
                jobs_rx.recv().await
            };
            let Some(job) = job else {
                return;
            };

            self.process(job).await;
        }
    }

    async fn process(&self, job: Job) {
        let state_key = job.update.state_key();
        let user_key = job.update.user_key();

        // Blocks until it is this job's turn in the conversation's queue.
        let state = job.state.wait().await;
        let user_data = job.user_data.wait().await;

        let handler = state.into_handler(user_data, Arc::clone(&self.responses));
        let transition = dispatch(&self.bot, job.update, handler).await;

        // Actions go out one at a time in list order. Failures are logged
        // and the rest of the list still runs; outbound sends are
        // best-effort by contract.
        for action in &transition.actions {
            let (endpoint, body) = action.encode();
            if let Err(error) = self
                .requester
                .request_json::<serde_json::Value>(endpoint, &body)
                .await
            {
                tracing::warn!(%error, endpoint, "outbound action failed");
            }
        }

        // Returning the values is what unblocks the next update of this
        // conversation.
        if let Some(key) = state_key {
            self.conversations.give_back(&key, transition.next_state);
        }
        if let Some(key) = user_key {
            self.users.give_back(&key, transition.next_user_data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::Binder;
    use crate::state::test_support::responses;
    use crate::update::{Chat, ChatId, ChatType, Message, MessageId, Update, UpdateId};

    fn bot() -> User {
        User {
            id: UserId(1),
            is_bot: true,
            first_name: "Standup".to_string(),
            last_name: None,
            username: Some("standup_bot".to_string()),
            language_code: None,
        }
    }

    fn text_update(id: i64, chat_id: i64, user_id: i64, text: &str) -> Update {
        Update {
            id: UpdateId(id),
            message: Some(Message {
                id: MessageId(id * 10),
                from: Some(User {
                    id: UserId(user_id),
                    is_bot: false,
                    first_name: "Alice".to_string(),
                    last_name: None,
                    username: None,
                    language_code: None,
                }),
                date: 0,
                chat: Chat {
                    id: ChatId(chat_id),
                    kind: ChatType::Private,
                },
                text: Some(text.to_string()),
            }),
            callback_query: None,
        }
    }

    /// Two commands in one conversation processed by two parallel workers:
    /// the second update must observe the state the first one produced, so
    /// `/addApiKey` followed by `/cancel` lands back at root. If the
    /// ordering broke, `/cancel` would hit the root handler (where it is an
    /// unknown command) and the add-api-key state would leak into the final
    /// value.
    ///
    /// The requester points at a closed local port, so outbound actions
    /// fail fast and are logged, which is exactly the best-effort contract.
    #[tokio::test]
    async fn parallel_workers_keep_per_conversation_order() {
        let requester = Arc::new(
            ApiRequester::new("127.0.0.1:9", "TEST_TOKEN").expect("requester builds"),
        );
        let conversations = Arc::new(Storage::new());
        let users = Arc::new(Storage::new());
        let (updates_tx, updates_rx) = tokio::sync::mpsc::channel(1);
        let (jobs_tx, jobs_rx) = tokio::sync::mpsc::channel(2);
        let jobs_rx = Arc::new(tokio::sync::Mutex::new(jobs_rx));

        let binder = Binder {
            conversations: Arc::clone(&conversations),
            users: Arc::clone(&users),
            updates_rx,
            jobs_tx,
        };
        let binder_task = tokio::spawn(binder.run());

        let mut worker_tasks = Vec::new();
        for _ in 0..2 {
            let worker = Worker {
                bot: bot(),
                requester: Arc::clone(&requester),
                responses: responses(),
                conversations: Arc::clone(&conversations),
                users: Arc::clone(&users),
                jobs_rx: Arc::clone(&jobs_rx),
            };
            worker_tasks.push(tokio::spawn(worker.run()));
        }

        updates_tx
            .send(text_update(1, 100, 7, "/addApiKey"))
            .await
            .expect("binder alive");
        updates_tx
            .send(text_update(2, 100, 7, "/cancel"))
            .await
            .expect("binder alive");
        drop(updates_tx);

        binder_task.await.expect("binder exits cleanly");
        for task in worker_tasks {
            task.await.expect("worker exits cleanly");
        }

        let final_state = conversations
            .borrow(&"100:7".to_string())
            .expect("the conversation slot exists")
            .wait()
            .await;
        assert_eq!(
            final_state,
            State::default(),
            "/cancel must run against the add-api-key state and land back at root"
        );
    }

    #[tokio::test]
    async fn user_data_flows_between_chats_of_the_same_user() {
        let requester = Arc::new(
            ApiRequester::new("127.0.0.1:9", "TEST_TOKEN").expect("requester builds"),
        );
        let conversations = Arc::new(Storage::new());
        let users = Arc::new(Storage::new());
        let (updates_tx, updates_rx) = tokio::sync::mpsc::channel(1);
        let (jobs_tx, jobs_rx) = tokio::sync::mpsc::channel(1);

        let binder = Binder {
            conversations: Arc::clone(&conversations),
            users: Arc::clone(&users),
            updates_rx,
            jobs_tx,
        };
        let binder_task = tokio::spawn(binder.run());

        let worker = Worker {
            bot: bot(),
            requester,
            responses: responses(),
            conversations: Arc::clone(&conversations),
            users: Arc::clone(&users),
            jobs_rx: Arc::new(tokio::sync::Mutex::new(jobs_rx)),
        };
        let worker_task = tokio::spawn(worker.run());

        // Same user in two different chats: two conversation slots, one
        // shared-data slot.
        updates_tx
            .send(text_update(1, 100, 7, "/help"))
            .await
            .expect("binder alive");
        updates_tx
            .send(text_update(2, 200, 7, "/help"))
            .await
            .expect("binder alive");
        drop(updates_tx);

        binder_task.await.expect("binder exits cleanly");
        worker_task.await.expect("worker exits cleanly");

        assert!(conversations.borrow(&"100:7".to_string()).is_some());
        assert!(conversations.borrow(&"200:7".to_string()).is_some());
        let shared = users
            .borrow(&UserId(7))
            .expect("one shared slot for the user")
            .wait()
            .await;
        assert_eq!(shared, UserSharedData::default());
    }
}
