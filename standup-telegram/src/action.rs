//! Outbound effects a handler can ask the bot to perform.
//!
//! The worker pool treats them uniformly: each action encodes to an
//! `(endpoint, JSON body)` pair for [`crate::api::ApiRequester::request_json`].

use crate::update::{CallbackQueryId, ChatId, Message, MessageId};
use serde::Serialize;

pub const PARSE_MODE_HTML: &str = "html";
pub const PARSE_MODE_MARKDOWN_V2: &str = "MarkdownV2";

#[derive(Debug, Clone, PartialEq)]
pub enum BotAction {
    SendMessage(SendMessage),
    AnswerCallbackQuery(AnswerCallbackQuery),
    EditMessageReplyMarkup(EditMessageReplyMarkup),
}

impl BotAction {
    /// The API endpoint and JSON body that perform this action.
    pub fn encode(&self) -> (&'static str, serde_json::Value) {
        match self {
            Self::SendMessage(action) => ("sendMessage", to_body(action)),
            Self::AnswerCallbackQuery(action) => ("answerCallbackQuery", to_body(action)),
            Self::EditMessageReplyMarkup(action) => ("editMessageReplyMarkup", to_body(action)),
        }
    }
}

impl From<SendMessage> for BotAction {
    fn from(action: SendMessage) -> Self {
        Self::SendMessage(action)
    }
}

impl From<AnswerCallbackQuery> for BotAction {
    fn from(action: AnswerCallbackQuery) -> Self {
        Self::AnswerCallbackQuery(action)
    }
}

impl From<EditMessageReplyMarkup> for BotAction {
    fn from(action: EditMessageReplyMarkup) -> Self {
        Self::EditMessageReplyMarkup(action)
    }
}

fn to_body<T: Serialize>(action: &T) -> serde_json::Value {
    serde_json::to_value(action).expect("bot actions always serialize to JSON")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendMessage {
    pub chat_id: ChatId,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<String>,
    pub disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

impl SendMessage {
    /// A message with the default HTML parse mode and the link preview off.
    pub fn new(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            parse_mode: Some(PARSE_MODE_HTML.to_string()),
            disable_web_page_preview: true,
            reply_markup: None,
        }
    }

    pub fn parse_mode(mut self, mode: impl Into<String>) -> Self {
        self.parse_mode = Some(mode.into());
        self
    }

    /// Shows the preview box below the message for the first link in it.
    pub fn enable_web_preview(mut self) -> Self {
        self.disable_web_page_preview = false;
        self
    }

    pub fn reply_markup(mut self, keyboard: Vec<Vec<InlineKeyboardButton>>) -> Self {
        self.reply_markup = Some(InlineKeyboardMarkup {
            inline_keyboard: keyboard,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerCallbackQuery {
    pub callback_query_id: CallbackQueryId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub show_alert: bool,
}

impl AnswerCallbackQuery {
    /// A small toast at the top of the chat.
    pub fn notification(id: CallbackQueryId, text: impl Into<String>) -> Self {
        Self {
            callback_query_id: id,
            text: Some(text.into()),
            show_alert: false,
        }
    }

    /// A dialog the user has to dismiss.
    pub fn alert(id: CallbackQueryId, text: impl Into<String>) -> Self {
        Self {
            callback_query_id: id,
            text: Some(text.into()),
            show_alert: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditMessageReplyMarkup {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub reply_markup: InlineKeyboardMarkup,
}

impl EditMessageReplyMarkup {
    /// Replaces the message's inline keyboard with an empty one, removing
    /// the buttons after one of them was pressed.
    pub fn remove_keyboard(message: &Message) -> Self {
        Self {
            chat_id: message.chat.id,
            message_id: message.id,
            reply_markup: InlineKeyboardMarkup {
                inline_keyboard: vec![Vec::new()],
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

/// At most one of the optional fields should be set; it decides what
/// pressing the button does. The text is always the visible label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub switch_inline_query_current_chat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
}

impl InlineKeyboardButton {
    /// Pressing the button makes the user type `@Bot <query>` in the chat.
    pub fn switch_query_current_chat(text: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            switch_inline_query_current_chat: Some(query.into()),
            callback_data: None,
        }
    }

    /// Pressing the button sends `data` back as a callback query.
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            switch_inline_query_current_chat: None,
            callback_data: Some(data.into()),
        }
    }
}
