//! Typed model of the `getUpdates` payload and the routing keys derived
//! from it.
//!
//! An update carries exactly one populated variant (a message or a callback
//! query). The *state key* `"<chat>:<sender>"` names the conversation slot an
//! update must be serialized under; the *user key* names the sender's
//! cross-chat shared data. Updates that cannot produce a key are processed
//! without borrowing the corresponding slot.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! int_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

int_id!(
    /// Monotone per connection; duplicates only appear when a previous run
    /// crashed before acknowledging an offset.
    UpdateId
);
int_id!(MessageId);
int_id!(UserId);
int_id!(ChatId);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallbackQueryId(pub String);

impl fmt::Display for CallbackQueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    #[serde(rename = "update_id")]
    pub id: UpdateId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_query: Option<CallbackQuery>,
}

impl Update {
    /// The conversation slot this update belongs to, when it has one.
    pub fn state_key(&self) -> Option<String> {
        if let Some(message) = &self.message {
            if let Some(from) = &message.from {
                return Some(format!("{}:{}", message.chat.id, from.id));
            }
        }

        if let Some(query) = &self.callback_query {
            if let Some(message) = &query.message {
                return Some(format!("{}:{}", message.chat.id, query.from.id));
            }
        }

        None
    }

    /// The sender whose cross-chat shared data this update should see.
    pub fn user_key(&self) -> Option<UserId> {
        if let Some(message) = &self.message {
            if let Some(from) = &message.from {
                return Some(from.id);
            }
        }

        if let Some(query) = &self.callback_query {
            return Some(query.from.id);
        }

        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "message_id")]
    pub id: MessageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    #[serde(default)]
    pub date: i64,
    pub chat: Chat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: CallbackQueryId,
    pub from: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    #[serde(rename = "type")]
    pub kind: ChatType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Private,
    Group,
    Supergroup,
    Channel,
}

/// A text message from a private chat, canonicalized by the dispatcher: the
/// text has the bot mention stripped, the sender is known.
#[derive(Debug, Clone, PartialEq)]
pub struct PrivateTextMessage {
    pub update_id: UpdateId,
    pub id: MessageId,
    pub text: String,
    pub chat: Chat,
    pub from: User,
}

/// Same as [`PrivateTextMessage`] but from a group chat.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupTextMessage {
    pub update_id: UpdateId,
    pub id: MessageId,
    pub text: String,
    pub chat: Chat,
    pub from: User,
}
