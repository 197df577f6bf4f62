//! Conversation states and their handlers.
//!
//! States are plain values forming a small graph around [`RootState`]: the
//! multi-step commands each get a state that remembers where the
//! conversation is, and every path eventually leads back to root. The
//! concurrency core only ever sees the [`State`] enum and the handler it
//! materializes per update.

mod add_api_key;
mod daily_status;
mod responses;
mod root;
mod set_default_project;

pub use add_api_key::AddApiKeyState;
pub use daily_status::{DailyStatusStage, DailyStatusState};
pub use responses::{
    AddApiKeyResponses, DailyStatusResponses, Responses, RootResponses,
    SetDefaultProjectResponses,
};
pub use root::RootState;
pub use set_default_project::SetDefaultProjectState;

use crate::dispatch::{UpdateHandler, UserSharedData};
use standup_github as github;
use std::sync::Arc;

pub(crate) const CANCEL_COMMAND: &str = "cancel";
pub(crate) const NONE_COMMAND: &str = "none";

pub(crate) const CANCELED_REPLY: &str = "Canceled.";
pub(crate) const DEAD_BUTTON_REPLY: &str = "This button doesnt work.";

/// The state of one conversation. Stored in the borrow-once conversation
/// store under the `"<chat>:<user>"` key.
#[derive(Debug, Clone, PartialEq)]
pub enum State {
    Root(RootState),
    AddApiKey(AddApiKeyState),
    SetDefaultProject(SetDefaultProjectState),
    DailyStatus(DailyStatusState),
}

impl State {
    /// Builds the handler that processes the next update of this
    /// conversation. The handler owns the state, the user's shared data, and
    /// a reference to the resolved response bundle.
    pub fn into_handler(
        self,
        user_data: UserSharedData,
        responses: Arc<Responses>,
    ) -> Box<dyn UpdateHandler> {
        match self {
            Self::Root(state) => Box::new(root::RootHandler {
                state,
                user_data,
                responses,
            }),
            Self::AddApiKey(state) => Box::new(add_api_key::AddApiKeyHandler {
                state,
                user_data,
                responses,
            }),
            Self::SetDefaultProject(state) => {
                Box::new(set_default_project::SetDefaultProjectHandler {
                    state,
                    user_data,
                    responses,
                })
            }
            Self::DailyStatus(state) => Box::new(daily_status::DailyStatusHandler {
                state,
                user_data,
                responses,
            }),
        }
    }
}

impl Default for State {
    fn default() -> Self {
        Self::Root(RootState::default())
    }
}

impl From<RootState> for State {
    fn from(state: RootState) -> Self {
        Self::Root(state)
    }
}

impl From<AddApiKeyState> for State {
    fn from(state: AddApiKeyState) -> Self {
        Self::AddApiKey(state)
    }
}

impl From<SetDefaultProjectState> for State {
    fn from(state: SetDefaultProjectState) -> Self {
        Self::SetDefaultProject(state)
    }
}

impl From<DailyStatusState> for State {
    fn from(state: DailyStatusState) -> Self {
        Self::DailyStatus(state)
    }
}

/// The user-visible text for a GitHub failure: the server's GraphQL message
/// when there is one, a generic template string otherwise.
pub(crate) fn github_error_text(error: &github::GithubError, generic: &str) -> String {
    match error.graphql_message() {
        Some(message) => format!("GitHub API error: {message}"),
        None => generic.to_string(),
    }
}

pub(crate) async fn validate_token(token: &str) -> github::Result<String> {
    github::Client::new(token)?.login().await
}

pub(crate) async fn viewer_projects(
    token: &str,
    first: u32,
    after: Option<&github::ProjectCursor>,
) -> github::Result<Vec<github::Project>> {
    github::Client::new(token)?
        .list_viewer_projects(first, after)
        .await
}

pub(crate) async fn project_by_id(
    token: &str,
    id: &github::ProjectId,
) -> github::Result<github::Project> {
    github::Client::new(token)?.project_by_id(id).await
}
