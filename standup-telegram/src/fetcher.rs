//! The long-poll loop that pulls updates from the API and feeds the binder.

use crate::api::{ApiRequester, RequestError};
use crate::client::LifecycleHandle;
use crate::error::ClientError;
use crate::update::Update;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// How many updates one `getUpdates` call may return.
const GET_UPDATES_LIMIT: u32 = 20;
/// How long the server holds the request open when there is nothing to send.
const GET_UPDATES_LONG_POLL_TIMEOUT_SECS: u32 = 5;
/// Consecutive failures after which the bot gives up.
const GET_UPDATES_RETRY_LIMIT: u32 = 10;

pub(crate) struct Fetcher {
    pub(crate) requester: Arc<ApiRequester>,
    pub(crate) updates_tx: mpsc::Sender<Update>,
    pub(crate) cancel: CancellationToken,
    pub(crate) lifecycle: LifecycleHandle,
}

impl Fetcher {
    /// Runs until cancellation or a fatal error. Dropping `updates_tx` on
    /// the way out closes the channel, which stops the binder, which stops
    /// the workers.
    pub(crate) async fn run(self) {
        let mut offset: i64 = 0;
        let mut failures: u32 = 0;

        tracing::info!("telegram update fetcher started");

        // Cancellation is observed between requests; a poll that is already
        // in flight runs to completion.
        while !self.cancel.is_cancelled() {
            let batch = self
                .requester
                .request_form::<Vec<Update>>(
                    "getUpdates",
                    &[
                        ("offset", offset.to_string()),
                        ("limit", GET_UPDATES_LIMIT.to_string()),
                        ("timeout", GET_UPDATES_LONG_POLL_TIMEOUT_SECS.to_string()),
                    ],
                )
                .await;

            match batch {
                Ok(batch) => {
                    if failures != 0 {
                        tracing::info!(failures, "getUpdates failure count reset to 0");
                        failures = 0;
                    }

                    offset = next_offset(offset, &batch);

                    for update in batch {
                        tracing::debug!(update_id = %update.id, "queueing update");
                        if self.updates_tx.send(update).await.is_err() {
                            // The binder is gone; nobody wants updates anymore.
                            return;
                        }
                    }
                }
                Err(error) => match classify(&error) {
                    FetchFailure::BadCredentials => {
                        self.lifecycle.fail(ClientError::BadCredentials(error));
                        return;
                    }
                    FetchFailure::ChatMigrated => {
                        self.lifecycle.fail(ClientError::ChatMigrated(error));
                        return;
                    }
                    FetchFailure::RetryAfter(delay) => {
                        tracing::warn!(
                            delay_secs = delay.as_secs(),
                            "rate limited; sleeping exactly as long as the server asked"
                        );
                        tokio::select! {
                            _ = self.cancel.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    FetchFailure::Transient => {
                        failures += 1;
                        tracing::warn!(%error, failures, "getUpdates failed");
                        if failures >= GET_UPDATES_RETRY_LIMIT {
                            self.lifecycle.fail(ClientError::TooManyErrors {
                                limit: GET_UPDATES_RETRY_LIMIT,
                                last: error,
                            });
                            return;
                        }
                    }
                },
            }
        }

        tracing::info!("telegram update fetcher stopped");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchFailure {
    /// The token is wrong; retrying cannot help.
    BadCredentials,
    /// The chat moved to a new id; unsupported.
    ChatMigrated,
    /// The server said how long to back off; not counted as a failure.
    RetryAfter(Duration),
    /// Transport, parse, or generic API trouble; counted against the ceiling.
    Transient,
}

fn classify(error: &RequestError) -> FetchFailure {
    let RequestError::Api(api) = error else {
        return FetchFailure::Transient;
    };

    if api.is_unauthorized() {
        return FetchFailure::BadCredentials;
    }
    if api.parameters.migrate_to_chat_id.is_some() {
        return FetchFailure::ChatMigrated;
    }
    if let Some(seconds) = api.parameters.retry_after {
        return FetchFailure::RetryAfter(Duration::from_secs(seconds));
    }

    FetchFailure::Transient
}

/// The offset for the next poll: one past the highest id seen so far. Taking
/// the max over the whole batch tolerates batches the server did not return
/// in order.
fn next_offset(current: i64, batch: &[Update]) -> i64 {
    batch
        .iter()
        .map(|update| update.id.0 + 1)
        .fold(current, i64::max)
}
