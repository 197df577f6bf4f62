use crate::api::RequestError;
use thiserror::Error;

/// Fatal errors surfaced through the lifecycle error channel. Receiving one
/// means the bot has stopped (or is stopping) and the process should exit
/// non-zero.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("should never start the bot with less than 1 processor task")]
    ZeroThreads,

    #[error("bot token is likely invalid: {0}")]
    BadCredentials(RequestError),

    #[error("failed to fetch the bot's own profile: {0}")]
    Identity(RequestError),

    #[error("chat migrated to a new id, which this bot does not support: {0}")]
    ChatMigrated(RequestError),

    #[error("too many consecutive errors ({limit}) while talking to the Telegram API; last: {last}")]
    TooManyErrors { limit: u32, last: RequestError },

    #[error("{context} panicked: {message}")]
    Panic {
        context: &'static str,
        message: String,
    },
}
