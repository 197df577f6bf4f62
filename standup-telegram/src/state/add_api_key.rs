//! The state entered by `/addapikey`: the next private message is treated as
//! a GitHub API token.

use crate::action::{AnswerCallbackQuery, SendMessage};
use crate::dispatch::{Transition, UpdateHandler, UserSharedData};
use crate::state::{
    validate_token, Responses, RootState, State, CANCEL_COMMAND, DEAD_BUTTON_REPLY, NONE_COMMAND,
};
use crate::update::{CallbackQuery, ChatId, GroupTextMessage, PrivateTextMessage};
use async_trait::async_trait;
use standup_core::slashcmd;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddApiKeyState {
    pub root: RootState,
}

pub(crate) struct AddApiKeyHandler {
    pub(crate) state: AddApiKeyState,
    pub(crate) user_data: UserSharedData,
    pub(crate) responses: Arc<Responses>,
}

#[async_trait]
impl UpdateHandler for AddApiKeyHandler {
    async fn private_text_message(mut self: Box<Self>, message: PrivateTextMessage) -> Transition {
        let chat_id = message.chat.id;

        if let Some(cmd) = slashcmd::parse(&message.text) {
            match cmd.method.to_lowercase().as_str() {
                CANCEL_COMMAND => {
                    tracing::debug!(
                        update_id = %message.update_id,
                        user_id = %message.from.id,
                        "add-api-key canceled"
                    );
                    let text = self.responses.add_api_key.cancel.clone();
                    return self.to_root(chat_id, text);
                }
                NONE_COMMAND => {
                    self.user_data.github_api_key = None;
                    tracing::info!(user_id = %message.from.id, "API key deleted");
                    let text = self.responses.add_api_key.deleted.clone();
                    return self.to_root(chat_id, text);
                }
                _ => {}
            }
        }

        match validate_token(&message.text).await {
            Err(error) => {
                tracing::error!(
                    update_id = %message.update_id,
                    user_id = %message.from.id,
                    %error,
                    "could not validate the GitHub API key"
                );
                let text = self.responses.add_api_key.bad_api_key.clone();
                self.stay(chat_id, text)
            }
            Ok(login) => {
                self.user_data.github_api_key = Some(message.text);
                tracing::info!(user_id = %message.from.id, "API key saved");
                let text = self.responses.add_api_key.success.replace("%s", &login);
                Transition::new(
                    State::Root(self.state.root),
                    self.user_data,
                    // The preview renders the new owner's profile card.
                    vec![SendMessage::new(chat_id, text).enable_web_preview().into()],
                )
            }
        }
    }

    async fn group_text_message(self: Box<Self>, message: GroupTextMessage) -> Transition {
        tracing::error!(
            update_id = %message.update_id,
            chat_id = %message.chat.id,
            user_id = %message.from.id,
            "the add-api-key state should never see a group chat"
        );
        let text = self.responses.add_api_key.key_sent_in_public_chat.clone();
        self.to_root(message.chat.id, text)
    }

    async fn callback_query(self: Box<Self>, query: CallbackQuery) -> Transition {
        tracing::info!(callback_query_id = %query.id, "ignoring a callback query while collecting a key");
        Transition::new(
            self.state,
            self.user_data,
            vec![AnswerCallbackQuery::notification(query.id, DEAD_BUTTON_REPLY).into()],
        )
    }

    async fn ignore(self: Box<Self>) -> Transition {
        Transition::new(self.state, self.user_data, Vec::new())
    }
}

impl AddApiKeyHandler {
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
    use crate::state::test_support::{group_text, private_text, responses};

    fn handler(user_data: UserSharedData) -> Box<AddApiKeyHandler> {
        Box::new(AddApiKeyHandler {
            state: AddApiKeyState::default(),
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
    async fn cancel_returns_to_root_and_keeps_the_old_key() {
        let user_data = UserSharedData {
            github_api_key: Some("existing".to_string()),
        };

        let transition = handler(user_data.clone())
            .private_text_message(private_text(100, 7, "/cancel"))
            .await;

        assert_eq!(sent_text(&transition), "addApiKey.cancel");
        assert_eq!(transition.next_state, State::default());
        assert_eq!(transition.next_user_data, user_data);
    }

    #[tokio::test]
    async fn none_deletes_the_stored_key() {
        let transition = handler(UserSharedData {
            github_api_key: Some("existing".to_string()),
        })
        .private_text_message(private_text(100, 7, "/none"))
        .await;

        assert_eq!(sent_text(&transition), "addApiKey.deleted");
        assert_eq!(transition.next_user_data.github_api_key, None);
        assert_eq!(transition.next_state, State::default());
    }

    #[tokio::test]
    async fn a_key_pasted_into_a_group_chat_is_rejected() {
        let transition = handler(UserSharedData::default())
            .group_text_message(group_text(-100, 7, "ghp_oops"))
            .await;

        assert_eq!(sent_text(&transition), "addApiKey.keySentInPublicChat");
        assert_eq!(transition.next_state, State::default());
    }

    #[tokio::test]
    async fn other_updates_keep_the_state() {
        let transition = handler(UserSharedData::default()).ignore().await;

        assert!(transition.actions.is_empty());
        assert!(matches!(transition.next_state, State::AddApiKey(_)));
    }
}
