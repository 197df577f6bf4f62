//! The contract between the concurrency core and the conversation logic,
//! and the dispatcher that routes a raw update into it.

use crate::action::BotAction;
use crate::state::State;
use crate::update::{
    CallbackQuery, ChatType, GroupTextMessage, Message, PrivateTextMessage, Update, UpdateId, User,
};
use async_trait::async_trait;

/// One conversation step. Handlers consume themselves and report the state
/// and user data to use for the next update, plus the actions the bot should
/// perform now.
#[async_trait]
pub trait UpdateHandler: Send {
    async fn private_text_message(self: Box<Self>, message: PrivateTextMessage) -> Transition;
    async fn group_text_message(self: Box<Self>, message: GroupTextMessage) -> Transition;
    async fn callback_query(self: Box<Self>, query: CallbackQuery) -> Transition;
    /// Called for every update the bot does not know how to process.
    async fn ignore(self: Box<Self>) -> Transition;
}

/// What a handler decided: the conversation state and user-shared data to
/// store back, and the bot's outbound actions, emitted in list order.
#[derive(Debug)]
pub struct Transition {
    pub next_state: State,
    pub next_user_data: UserSharedData,
    pub actions: Vec<BotAction>,
}

impl Transition {
    pub fn new(
        next_state: impl Into<State>,
        next_user_data: UserSharedData,
        actions: Vec<BotAction>,
    ) -> Self {
        Self {
            next_state: next_state.into(),
            next_user_data,
            actions,
        }
    }
}

/// Data shared by all conversations of one user. Handlers own it for the
/// duration of a call and hand a (possibly updated) copy back in the
/// transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserSharedData {
    pub github_api_key: Option<String>,
}

/// Canonicalizes `update` into a typed message and calls the matching
/// handler operation. Messages without text or sender, and anything from a
/// supergroup or channel, fall through to [`UpdateHandler::ignore`].
pub async fn dispatch(bot: &User, update: Update, handler: Box<dyn UpdateHandler>) -> Transition {
    let update_id = update.id;

    if let Some(message) = update.message {
        match typed_message(bot, message, update_id) {
            Some(TypedMessage::Private(message)) => {
                return handler.private_text_message(message).await;
            }
            Some(TypedMessage::Group(message)) => {
                return handler.group_text_message(message).await;
            }
            None => {}
        }
    } else if let Some(query) = update.callback_query {
        return handler.callback_query(query).await;
    }

    tracing::debug!(%update_id, "ignoring update");
    handler.ignore().await
}

enum TypedMessage {
    Private(PrivateTextMessage),
    Group(GroupTextMessage),
}

fn typed_message(bot: &User, message: Message, update_id: UpdateId) -> Option<TypedMessage> {
    match message.chat.kind {
        ChatType::Private | ChatType::Group => {}
        ChatType::Supergroup | ChatType::Channel => return None,
    }

    let text = message.text.as_deref()?;
    let text = strip_bot_mention(text, bot.username.as_deref()).to_string();
    let from = message.from?;

    let typed = match message.chat.kind {
        ChatType::Private => TypedMessage::Private(PrivateTextMessage {
            update_id,
            id: message.id,
            text,
            chat: message.chat,
            from,
        }),
        _ => TypedMessage::Group(GroupTextMessage {
            update_id,
            id: message.id,
            text,
            chat: message.chat,
            from,
        }),
    };

    Some(typed)
}

/// Drops a leading `@<botname>` mention along with the whitespace around it.
fn strip_bot_mention<'a>(text: &'a str, bot_username: Option<&str>) -> &'a str {
    match bot_username {
        Some(username) if !username.is_empty() => text
            .strip_prefix('@')
            .and_then(|rest| rest.strip_prefix(username))
            .unwrap_or(text)
            .trim(),
        _ => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::{CallbackQueryId, Chat, ChatId, MessageId, UserId};

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

    fn sender() -> User {
        User {
            id: UserId(7),
            is_bot: false,
            first_name: "Alice".to_string(),
            last_name: None,
            username: None,
            language_code: None,
        }
    }

    fn message_update(chat_kind: ChatType, text: Option<&str>, from: Option<User>) -> Update {
        Update {
            id: UpdateId(1),
            message: Some(Message {
                id: MessageId(2),
                from,
                date: 0,
                chat: Chat {
                    id: ChatId(100),
                    kind: chat_kind,
                },
                text: text.map(str::to_string),
            }),
            callback_query: None,
        }
    }

    /// Reports which handler operation the dispatcher picked.
    struct Probe(tokio::sync::mpsc::UnboundedSender<Routed>);

    #[derive(Debug, PartialEq)]
    enum Routed {
        Private(String),
        Group(String),
        Callback(Option<String>),
        Ignored,
    }

    #[async_trait]
    impl UpdateHandler for Probe {
        async fn private_text_message(self: Box<Self>, message: PrivateTextMessage) -> Transition {
            self.report(Routed::Private(message.text))
        }

        async fn group_text_message(self: Box<Self>, message: GroupTextMessage) -> Transition {
            self.report(Routed::Group(message.text))
        }

        async fn callback_query(self: Box<Self>, query: CallbackQuery) -> Transition {
            self.report(Routed::Callback(query.data))
        }

        async fn ignore(self: Box<Self>) -> Transition {
            self.report(Routed::Ignored)
        }
    }

    impl Probe {
        fn report(&self, routed: Routed) -> Transition {
            self.0.send(routed).expect("probe channel open");
            Transition::new(State::default(), UserSharedData::default(), Vec::new())
        }
    }

    async fn routed(update: Update) -> Routed {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        dispatch(&bot(), update, Box::new(Probe(tx))).await;
        rx.recv().await.expect("the probe always reports")
    }

    #[tokio::test]
    async fn private_text_goes_to_the_private_operation() {
        let update = message_update(ChatType::Private, Some("hello"), Some(sender()));

        assert_eq!(routed(update).await, Routed::Private("hello".to_string()));
    }

    #[tokio::test]
    async fn group_text_goes_to_the_group_operation() {
        let update = message_update(ChatType::Group, Some("hello"), Some(sender()));

        assert_eq!(routed(update).await, Routed::Group("hello".to_string()));
    }

    #[tokio::test]
    async fn message_without_text_is_ignored() {
        let update = message_update(ChatType::Private, None, Some(sender()));

        assert_eq!(routed(update).await, Routed::Ignored);
    }

    #[tokio::test]
    async fn message_without_sender_is_ignored() {
        let update = message_update(ChatType::Private, Some("hello"), None);

        assert_eq!(routed(update).await, Routed::Ignored);
    }

    #[tokio::test]
    async fn supergroup_and_channel_messages_are_ignored() {
        for kind in [ChatType::Supergroup, ChatType::Channel] {
            let update = message_update(kind, Some("hello"), Some(sender()));

            assert_eq!(routed(update).await, Routed::Ignored);
        }
    }

    #[tokio::test]
    async fn callback_queries_are_routed_with_their_payload() {
        let update = Update {
            id: UpdateId(1),
            message: None,
            callback_query: Some(CallbackQuery {
                id: CallbackQueryId("cq1".to_string()),
                from: sender(),
                message: None,
                data: Some("payload".to_string()),
            }),
        };

        assert_eq!(
            routed(update).await,
            Routed::Callback(Some("payload".to_string()))
        );
    }

    #[tokio::test]
    async fn bot_mention_prefix_is_stripped() {
        let update = message_update(ChatType::Group, Some("@standup_bot /help"), Some(sender()));

        assert_eq!(routed(update).await, Routed::Group("/help".to_string()));
    }

    #[tokio::test]
    async fn bare_mention_leaves_empty_text() {
        let update = message_update(ChatType::Private, Some("@standup_bot"), Some(sender()));

        assert_eq!(routed(update).await, Routed::Private(String::new()));
    }

    #[test]
    fn mention_of_someone_else_is_kept() {
        assert_eq!(
            strip_bot_mention("@other_bot hi", Some("standup_bot")),
            "@other_bot hi"
        );
    }
}
