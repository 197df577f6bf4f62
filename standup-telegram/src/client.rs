//! Lifecycle controller: starts the pipeline, stops it gracefully, and
//! surfaces fatal errors through a one-shot channel.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() {
//! use standup_telegram::state::Responses;
//! use standup_telegram::Client;
//!
//! # let responses: Responses = todo!();
//! let client = Client::new("api.telegram.org", "TOKEN", responses).unwrap();
//! let mut errors = client.start(10).await;
//!
//! tokio::select! {
//!     _ = tokio::signal::ctrl_c() => client.stop().await,
//!     Some(error) = errors.recv() => {
//!         client.stop().await;
//!         eprintln!("bot crashed: {error}");
//!     }
//! }
//! # }
//! ```

use crate::api::{ApiRequester, RequestError};
use crate::binder::Binder;
use crate::error::ClientError;
use crate::fetcher::Fetcher;
use crate::state::Responses;
use crate::worker::Worker;
use futures_util::FutureExt;
use standup_core::borrowonce::Storage;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// The binder keeps up with the fetcher easily, so the hand-off between
/// them stays tight and bounds memory under bursts.
const UPDATE_CHANNEL_CAPACITY: usize = 1;

/// Cancels the pipeline and parks the fatal error for whoever listens on
/// the channel `start` returned. Cloned into every background task.
#[derive(Clone)]
pub(crate) struct LifecycleHandle {
    cancel: CancellationToken,
    err_tx: mpsc::Sender<ClientError>,
}

impl LifecycleHandle {
    /// The replacement for panicking. The buffer of one means the first
    /// fatal error wins and the send never blocks; later errors only log.
    pub(crate) fn fail(&self, error: ClientError) {
        tracing::error!(%error, "fatal bot error");
        self.cancel.cancel();
        if self.err_tx.try_send(error).is_err() {
            tracing::debug!("lifecycle error channel already carries an error");
        }
    }
}

/// The Telegram client. Create it, [`Client::start`] it, and keep it around
/// to [`Client::stop`] it on shutdown.
pub struct Client {
    requester: Arc<ApiRequester>,
    responses: Arc<Responses>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl Client {
    /// `host` is the API server without a scheme, e.g. `api.telegram.org`.
    /// `responses` is the eagerly-resolved template bundle.
    pub fn new(host: &str, token: &str, responses: Responses) -> Result<Self, RequestError> {
        let tracker = TaskTracker::new();
        // Tasks may still be spawned on a closed tracker; closing up front
        // lets `stop` complete even when `start` bailed out early.
        tracker.close();

        Ok(Self {
            requester: Arc::new(ApiRequester::new(host, token)?),
            responses: Arc::new(responses),
            cancel: CancellationToken::new(),
            tracker,
        })
    }

    /// Starts the pipeline in the background: one long-poll fetcher, one
    /// state binder, and `threads` update processors, connected by bounded
    /// channels (update channel of one, job channel of one slot per
    /// worker).
    ///
    /// Returns the lifecycle error channel. At most one error is ever sent;
    /// receiving it means the bot has stopped working and [`Client::stop`]
    /// should be awaited to let the tasks drain.
    ///
    /// Call it once. Starting requires the bot's own identity, so this
    /// fails fast (through the returned channel) on bad credentials.
    pub async fn start(&self, threads: usize) -> mpsc::Receiver<ClientError> {
        let (err_tx, err_rx) = mpsc::channel(1);
        let lifecycle = LifecycleHandle {
            cancel: self.cancel.clone(),
            err_tx,
        };

        if threads == 0 {
            lifecycle.fail(ClientError::ZeroThreads);
            return err_rx;
        }

        let bot = match self.requester.get_me().await {
            Ok(bot) => bot,
            Err(error) => {
                let error = match &error {
                    RequestError::Api(api) if api.is_unauthorized() => {
                        ClientError::BadCredentials(error)
                    }
                    _ => ClientError::Identity(error),
                };
                lifecycle.fail(error);
                return err_rx;
            }
        };

        tracing::info!(
            bot_id = %bot.id,
            bot_username = ?bot.username,
            threads,
            "telegram client starting"
        );

        // The two stores are the only shared mutable state in the pipeline;
        // they live and die with this start/stop cycle.
        let conversations = Arc::new(Storage::new());
        let users = Arc::new(Storage::new());

        let (updates_tx, updates_rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let (jobs_tx, jobs_rx) = mpsc::channel(threads);
        let jobs_rx = Arc::new(tokio::sync::Mutex::new(jobs_rx));

        let fetcher = Fetcher {
            requester: Arc::clone(&self.requester),
            updates_tx,
            cancel: self.cancel.clone(),
            lifecycle: lifecycle.clone(),
        };
        self.spawn_guarded("update fetcher", lifecycle.clone(), fetcher.run());

        let binder = Binder {
            conversations: Arc::clone(&conversations),
            users: Arc::clone(&users),
            updates_rx,
            jobs_tx,
        };
        self.spawn_guarded("state binder", lifecycle.clone(), binder.run());

        for _ in 0..threads {
            let worker = Worker {
                bot: bot.clone(),
                requester: Arc::clone(&self.requester),
                responses: Arc::clone(&self.responses),
                conversations: Arc::clone(&conversations),
                users: Arc::clone(&users),
                jobs_rx: Arc::clone(&jobs_rx),
            };
            self.spawn_guarded("update processor", lifecycle.clone(), worker.run());
        }

        err_rx
    }

    /// Cancels the pipeline and waits for every background task. The
    /// fetcher notices after its current long poll; the channels close in
    /// cascade behind it and in-flight handlers run to completion. After
    /// this returns the bot is quiescent.
    pub async fn stop(&self) {
        self.cancel.cancel();
        self.tracker.wait().await;
    }

    /// Every background task is guarded: a panic anywhere in the pipeline
    /// becomes a lifecycle error instead of a silent dead task, and the
    /// unwind drops the task's channel ends so its successors drain.
    fn spawn_guarded(
        &self,
        context: &'static str,
        lifecycle: LifecycleHandle,
        task: impl std::future::Future<Output = ()> + Send + 'static,
    ) {
        self.tracker.spawn(async move {
            if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
                lifecycle.fail(ClientError::Panic {
                    context,
                    message: panic_message(panic.as_ref()),
                });
            }
        });
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }

    "non-string panic payload".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support;

    fn unreachable_client() -> Client {
        // Port 9 is closed, so every request fails fast with a transport
        // error instead of touching the network.
        Client::new(
            "127.0.0.1:9",
            "TEST_TOKEN",
            Arc::try_unwrap(test_support::responses()).expect("sole owner"),
        )
        .expect("client builds")
    }

    #[tokio::test]
    async fn zero_threads_is_refused_through_the_error_channel() {
        let client = unreachable_client();

        let mut errors = client.start(0).await;

        let error = errors.recv().await.expect("an error is parked");
        assert!(matches!(error, ClientError::ZeroThreads));

        client.stop().await;
    }

    #[tokio::test]
    async fn failing_identity_check_stops_the_start() {
        let client = unreachable_client();

        let mut errors = client.start(2).await;

        let error = errors.recv().await.expect("an error is parked");
        assert!(
            matches!(error, ClientError::Identity(_)),
            "expected an identity failure, got {error}"
        );

        client.stop().await;
    }

    #[tokio::test]
    async fn the_error_channel_keeps_only_the_first_error() {
        let (err_tx, mut err_rx) = mpsc::channel(1);
        let lifecycle = LifecycleHandle {
            cancel: CancellationToken::new(),
            err_tx,
        };

        lifecycle.fail(ClientError::ZeroThreads);
        lifecycle.fail(ClientError::Panic {
            context: "test",
            message: "late".to_string(),
        });

        assert!(matches!(
            err_rx.recv().await,
            Some(ClientError::ZeroThreads)
        ));
        assert!(err_rx.try_recv().is_err(), "the second error was dropped");
        assert!(lifecycle.cancel.is_cancelled());
    }

    #[test]
    fn panic_messages_are_extracted_from_common_payloads() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&"boom".to_string()), "boom");
        assert_eq!(panic_message(&42_u32), "non-string panic payload");
    }
}
