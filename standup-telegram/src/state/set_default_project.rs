//! The state entered by `/setdefaultproject` without arguments: the next
//! message is taken to be a project id.

use crate::action::SendMessage;
use crate::dispatch::{Transition, UpdateHandler, UserSharedData};
use crate::state::{
    github_error_text, project_by_id, Responses, RootState, State, CANCELED_REPLY, CANCEL_COMMAND,
    NONE_COMMAND,
};
use crate::update::{CallbackQuery, ChatId, GroupTextMessage, PrivateTextMessage};
use async_trait::async_trait;
use standup_core::slashcmd;
use standup_github as github;
use std::sync::Arc;

const DEFAULT_PROJECT_RESET_REPLY: &str = "Default project reset for this chat.";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetDefaultProjectState {
    pub root: RootState,
}

pub(crate) struct SetDefaultProjectHandler {
    pub(crate) state: SetDefaultProjectState,
    pub(crate) user_data: UserSharedData,
    pub(crate) responses: Arc<Responses>,
}

#[async_trait]
impl UpdateHandler for SetDefaultProjectHandler {
    async fn private_text_message(self: Box<Self>, message: PrivateTextMessage) -> Transition {
        self.save_default_project(message.chat.id, message.text).await
    }

    async fn group_text_message(self: Box<Self>, message: GroupTextMessage) -> Transition {
        self.save_default_project(message.chat.id, message.text).await
    }

    async fn callback_query(self: Box<Self>, _query: CallbackQuery) -> Transition {
        self.ignore().await
    }

    async fn ignore(self: Box<Self>) -> Transition {
        Transition::new(self.state, self.user_data, Vec::new())
    }
}

impl SetDefaultProjectHandler {
    async fn save_default_project(
        mut self: Box<Self>,
        chat_id: ChatId,
        text: String,
    ) -> Transition {
        if let Some(cmd) = slashcmd::parse(&text) {
            match cmd.method.to_lowercase().as_str() {
                NONE_COMMAND => {
                    self.state.root.default_project = None;
                    self.state.root.use_only_project_no_save_default = false;
                    return self.to_root(chat_id, DEFAULT_PROJECT_RESET_REPLY.to_string());
                }
                CANCEL_COMMAND => {
                    return self.to_root(chat_id, CANCELED_REPLY.to_string());
                }
                _ => {}
            }
        }

        let Some(token) = self.user_data.github_api_key.clone() else {
            let reply = self.responses.set_default_project.no_api_key_added.clone();
            return self.stay(chat_id, reply);
        };

        match project_by_id(&token, &github::ProjectId(text)).await {
            Err(error) => {
                tracing::warn!(%error, "could not look up the project to save as default");
                let reply = github_error_text(
                    &error,
                    &self.responses.set_default_project.github_error_generic,
                );
                self.stay(chat_id, reply)
            }
            Ok(project) => {
                self.state.root.default_project = Some(project.id);
                self.state.root.use_only_project_no_save_default = false;
                let reply = self
                    .responses
                    .set_default_project
                    .success
                    .replace("%s", &project.title);
                self.to_root(chat_id, reply)
            }
        }
    }

    fn to_root(self, chat_id: ChatId, text: String) -> Transition {
        Transition::new(
            State::Root(self.state.root),
            self.user_data,
            vec![SendMessage::new(chat_id, text).into()],
        )
    }

    fn stay(self, chat_id: ChatId, text: String) -> Transition {
        Transition::new(
            self.state,
            self.user_data,
            vec![SendMessage::new(chat_id, text).into()],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::BotAction;
    use crate::state::test_support::{private_text, responses};

    fn handler(state: SetDefaultProjectState, user_data: UserSharedData) -> Box<SetDefaultProjectHandler> {
        Box::new(SetDefaultProjectHandler {
            state,
            user_data,
            responses: responses(),
        })
    }

    fn sent_text(transition: &Transition) -> &str {
        match transition.actions.as_slice() {
            [BotAction::SendMessage(message)] => &message.text,
            other => panic!("expected exactly one sendMessage, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn none_clears_the_saved_default() {
        let state = SetDefaultProjectState {
            root: RootState {
                default_project: Some(github::ProjectId("PVT_1".to_string())),
                use_only_project_no_save_default: true,
            },
        };

        let transition = handler(state, UserSharedData::default())
            .private_text_message(private_text(100, 7, "/none"))
            .await;

        assert_eq!(sent_text(&transition), DEFAULT_PROJECT_RESET_REPLY);
        assert_eq!(
            transition.next_state,
            State::Root(RootState::default()),
            "both the default and the don't-save flag are reset"
        );
    }

    #[tokio::test]
    async fn cancel_returns_to_root_unchanged() {
        let root = RootState {
            default_project: Some(github::ProjectId("PVT_1".to_string())),
            use_only_project_no_save_default: false,
        };
        let state = SetDefaultProjectState { root: root.clone() };

        let transition = handler(state, UserSharedData::default())
            .private_text_message(private_text(100, 7, "/cancel"))
            .await;

        assert_eq!(sent_text(&transition), CANCELED_REPLY);
        assert_eq!(transition.next_state, State::Root(root));
    }

    #[tokio::test]
    async fn a_project_id_without_an_api_key_is_refused() {
        let transition = handler(SetDefaultProjectState::default(), UserSharedData::default())
            .private_text_message(private_text(100, 7, "PVT_1"))
            .await;

        assert_eq!(sent_text(&transition), "setDefaultProject.noApiKeyAdded");
        assert!(
            matches!(transition.next_state, State::SetDefaultProject(_)),
            "the user can paste the id again after adding a key"
        );
    }
}
