//! The `/dailystatus` interview: an optional save-default question, then two
//! free-text questions, then the generated report.

use crate::action::{
    AnswerCallbackQuery, EditMessageReplyMarkup, InlineKeyboardButton, SendMessage,
};
use crate::dispatch::{Transition, UpdateHandler, UserSharedData};
use crate::state::{
    github_error_text, Responses, RootState, State, CANCELED_REPLY, CANCEL_COMMAND,
    DEAD_BUTTON_REPLY, NONE_COMMAND,
};
use crate::update::{CallbackQuery, ChatId, GroupTextMessage, Message, PrivateTextMessage};
use async_trait::async_trait;
use standup_core::slashcmd;
use standup_github as github;
use std::sync::Arc;

const DAILY_STATUS_ITEM_LIMIT: u32 = 100;
const LIST_SEP: &str = "\n• ";

// Opaque callback payloads for the save-default keyboard. Their only
// property is being unique among every callback encoding the bot will ever
// send, so stale buttons from old messages cannot be misread.
pub(crate) const CQ_SET_ONLY_PROJECT_AS_DEFAULT: &str = "gW2xVhT9qLm4cRzN7ePduw";
pub(crate) const CQ_ASK_DEFAULT_PROJECT_EVERY_TIME: &str = "zK8rBn3tYc0fUq6mHj1aSg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyStatusStage {
    /// Text is ignored until the save-default keyboard is answered.
    AwaitSaveDefaultChoice,
    DiscoveryOfTheDay,
    QuestionsAndBlockers,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyStatusState {
    pub stage: DailyStatusStage,
    pub discovery_of_the_day: Option<String>,
    pub questions_and_blockers: Option<String>,
    /// The project the report is generated from.
    pub use_project: github::ProjectId,
    /// Overrides today's date in the report header.
    pub date_override: Option<String>,
    pub root: RootState,
}

impl DailyStatusState {
    /// The next message answers the first question of the interview.
    pub fn for_project(
        root: RootState,
        project: github::ProjectId,
        date_override: Option<String>,
    ) -> Self {
        Self {
            stage: DailyStatusStage::DiscoveryOfTheDay,
            discovery_of_the_day: None,
            questions_and_blockers: None,
            use_project: project,
            date_override,
            root,
        }
    }

    /// Messages are ignored until the user decides whether their only
    /// project becomes the default for this chat.
    pub fn ask_save_default(
        root: RootState,
        project: github::ProjectId,
        date_override: Option<String>,
    ) -> Self {
        Self {
            stage: DailyStatusStage::AwaitSaveDefaultChoice,
            discovery_of_the_day: None,
            questions_and_blockers: None,
            use_project: project,
            date_override,
            root,
        }
    }

    /// The keyboard offered together with the save-default question.
    pub(crate) fn save_default_keyboard() -> Vec<Vec<InlineKeyboardButton>> {
        vec![vec![
            InlineKeyboardButton::callback("Save as default", CQ_SET_ONLY_PROJECT_AS_DEFAULT),
            InlineKeyboardButton::callback("Ask every time", CQ_ASK_DEFAULT_PROJECT_EVERY_TIME),
        ]]
    }
}

pub(crate) struct DailyStatusHandler {
    pub(crate) state: DailyStatusState,
    pub(crate) user_data: UserSharedData,
    pub(crate) responses: Arc<Responses>,
}

#[async_trait]
impl UpdateHandler for DailyStatusHandler {
    async fn private_text_message(self: Box<Self>, message: PrivateTextMessage) -> Transition {
        self.handle_answer(message.chat.id, message.text).await
    }

    async fn group_text_message(self: Box<Self>, message: GroupTextMessage) -> Transition {
        self.handle_answer(message.chat.id, message.text).await
    }

    async fn callback_query(mut self: Box<Self>, query: CallbackQuery) -> Transition {
        if let (Some(data), Some(message)) = (query.data.as_deref(), query.message.clone()) {
            match data {
                CQ_ASK_DEFAULT_PROJECT_EVERY_TIME => {
                    self.state.root.use_only_project_no_save_default = true;
                    return self.proceed_to_discovery(message);
                }
                CQ_SET_ONLY_PROJECT_AS_DEFAULT => {
                    self.state.root.default_project = Some(self.state.use_project.clone());
                    return self.proceed_to_discovery(message);
                }
                _ => {}
            }
        }

        // A button from some other life of this chat. Drop back to root so
        // the conversation is not stuck waiting on a keyboard nobody sees.
        Transition::new(
            State::Root(self.state.root),
            self.user_data,
            vec![AnswerCallbackQuery::notification(query.id, DEAD_BUTTON_REPLY).into()],
        )
    }

    async fn ignore(self: Box<Self>) -> Transition {
        Transition::new(self.state, self.user_data, Vec::new())
    }
}

impl DailyStatusHandler {
    async fn handle_answer(mut self: Box<Self>, chat_id: ChatId, text: String) -> Transition {
        let method = slashcmd::parse(&text).map(|cmd| cmd.method.to_lowercase());

        if method.as_deref() == Some(CANCEL_COMMAND) {
            return Transition::new(
                State::Root(self.state.root),
                self.user_data,
                vec![SendMessage::new(chat_id, CANCELED_REPLY).into()],
            );
        }

        let skipped = method.as_deref() == Some(NONE_COMMAND);

        match self.state.stage {
            DailyStatusStage::AwaitSaveDefaultChoice => {
                Transition::new(self.state, self.user_data, Vec::new())
            }
            DailyStatusStage::DiscoveryOfTheDay => {
                self.state.discovery_of_the_day = (!skipped).then_some(text);
                self.state.stage = DailyStatusStage::QuestionsAndBlockers;
                let prompt = self.responses.daily_status.questions_and_blockers.clone();

                Transition::new(
                    self.state,
                    self.user_data,
                    vec![SendMessage::new(chat_id, prompt).into()],
                )
            }
            DailyStatusStage::QuestionsAndBlockers => {
                self.state.questions_and_blockers = (!skipped).then_some(text);

                let report = match self.generate_report().await {
                    Ok(report) => report,
                    Err(error) => {
                        tracing::warn!(%error, "daily report generation failed");
                        github_error_text(
                            &error,
                            &self.responses.daily_status.github_error_generic,
                        )
                    }
                };

                Transition::new(
                    State::Root(self.state.root),
                    self.user_data,
                    vec![SendMessage::new(chat_id, report).into()],
                )
            }
        }
    }

    fn proceed_to_discovery(mut self: Box<Self>, message: Message) -> Transition {
        self.state.stage = DailyStatusStage::DiscoveryOfTheDay;
        let prompt = self.responses.daily_status.discovery_of_the_day.clone();

        Transition::new(
            self.state,
            self.user_data,
            vec![
                EditMessageReplyMarkup::remove_keyboard(&message).into(),
                SendMessage::new(message.chat.id, prompt).into(),
            ],
        )
    }

    async fn generate_report(&self) -> github::Result<String> {
        let token = self.user_data.github_api_key.as_deref().unwrap_or_default();
        let items = github::Client::new(token)?
            .list_project_items(&self.state.use_project, DAILY_STATUS_ITEM_LIMIT, None)
            .await?;

        let date = self
            .state
            .date_override
            .clone()
            .unwrap_or_else(|| chrono::Local::now().format("%m.%d").to_string());

        Ok(render_report(
            &date,
            &items,
            self.state.discovery_of_the_day.as_deref(),
            self.state.questions_and_blockers.as_deref(),
        ))
    }
}

fn render_report(
    date: &str,
    items: &github::ItemsByStatus,
    discovery: Option<&str>,
    blockers: Option<&str>,
) -> String {
    let join = |status: &str| -> String {
        items
            .get(status)
            .map(|titles| titles.join(LIST_SEP))
            .unwrap_or_default()
    };

    let mut report = format!(
        "#daily report {date}:\n<b>Today I worked on</b>{LIST_SEP}{}\n\n\
         <b>Tomorrow I will work on</b>{LIST_SEP}{}\n\n",
        join("Done"),
        join("In Progress"),
    );

    if let Some(discovery) = discovery {
        report.push_str(&format!("<b>Discovery of the day</b>\n\n{discovery}\n\n"));
    }

    if let Some(blockers) = blockers {
        report.push_str(&format!("<b>Questions/Blockers</b>\n\n{blockers}\n\n"));
    }

    if items.get("In Review").is_some_and(|titles| !titles.is_empty()) {
        report.push_str(&format!("<b>In review</b>{LIST_SEP}{}", join("In Review")));
    }

    report
}
