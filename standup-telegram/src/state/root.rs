//! The default conversation state. Every slash command starts here and every
//! multi-step flow returns here.

use crate::action::{AnswerCallbackQuery, InlineKeyboardButton, SendMessage};
use crate::dispatch::{Transition, UpdateHandler, UserSharedData};
use crate::state::daily_status::DailyStatusState;
use crate::state::{
    github_error_text, project_by_id, viewer_projects, AddApiKeyState, Responses,
    SetDefaultProjectState, State, DEAD_BUTTON_REPLY,
};
use crate::update::{CallbackQuery, ChatId, GroupTextMessage, PrivateTextMessage};
use async_trait::async_trait;
use standup_core::slashcmd;
use standup_github as github;
use std::sync::Arc;

const PROJECTS_PER_PAGE: u32 = 10;
const LIST_PROJECTS_COMMAND: &str = "listprojects";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RootState {
    /// The board `/dailystatus` reports on in this chat.
    pub default_project: Option<github::ProjectId>,
    /// Set when the user declined to save their only board as the default.
    pub use_only_project_no_save_default: bool,
}

pub(crate) struct RootHandler {
    pub(crate) state: RootState,
    pub(crate) user_data: UserSharedData,
    pub(crate) responses: Arc<Responses>,
}

#[async_trait]
impl UpdateHandler for RootHandler {
    async fn private_text_message(self: Box<Self>, message: PrivateTextMessage) -> Transition {
        let chat_id = message.chat.id;

        let Some(cmd) = slashcmd::parse(&message.text) else {
            let text = self.responses.root.unknown_message.clone();
            return self.reply(chat_id, text);
        };

        match cmd.method.to_lowercase().as_str() {
            "start" => {
                tracing::info!(user_id = %message.from.id, "used /start in private messages");
                let text = self.responses.root.start.clone();
                self.reply(chat_id, text)
            }
            "help" => {
                let text = self.responses.root.help.clone();
                self.reply(chat_id, text)
            }
            "dailystatus" => {
                let date_override = cmd.next_after("date").map(str::to_string);
                self.handle_daily_status(chat_id, date_override).await
            }
            "addapikey" => {
                tracing::info!(user_id = %message.from.id, "entering the add-api-key flow");
                let text = self.responses.root.add_api_key.clone();
                Transition::new(
                    AddApiKeyState { root: self.state },
                    self.user_data,
                    vec![SendMessage::new(chat_id, text).into()],
                )
            }
            LIST_PROJECTS_COMMAND => {
                let after = cmd
                    .next_after("after")
                    .filter(|cursor| !cursor.is_empty())
                    .map(|cursor| github::ProjectCursor(cursor.to_string()));
                self.handle_list_projects(chat_id, after).await
            }
            "setdefaultproject" => self.handle_set_default_project(chat_id, &cmd).await,
            _ => {
                let text = self.responses.root.unknown_message.clone();
                self.reply(chat_id, text)
            }
        }
    }

    async fn group_text_message(self: Box<Self>, message: GroupTextMessage) -> Transition {
        let chat_id = message.chat.id;

        let Some(cmd) = slashcmd::parse(&message.text) else {
            return self.stay();
        };

        match cmd.method.to_lowercase().as_str() {
            "start" => {
                tracing::info!(user_id = %message.from.id, "used /start in a group chat");
                let text = self.responses.root.start.clone();
                self.reply(chat_id, text)
            }
            "help" => {
                let text = self.responses.root.help.clone();
                self.reply(chat_id, text)
            }
            "dailystatus" => {
                let date_override = cmd.next_after("date").map(str::to_string);
                self.handle_daily_status(chat_id, date_override).await
            }
            // Keys must never travel through a group chat, and project lists
            // are nobody else's business either.
            "addapikey" | LIST_PROJECTS_COMMAND => {
                let text = self.responses.root.private_command_used.clone();
                self.reply(chat_id, text)
            }
            "setdefaultproject" => self.handle_set_default_project(chat_id, &cmd).await,
            _ => self.stay(),
        }
    }

    async fn callback_query(self: Box<Self>, query: CallbackQuery) -> Transition {
        Transition::new(
            State::Root(self.state),
            self.user_data,
            vec![AnswerCallbackQuery::notification(query.id, DEAD_BUTTON_REPLY).into()],
        )
    }

    async fn ignore(self: Box<Self>) -> Transition {
        self.stay()
    }
}

impl RootHandler {
    fn reply(self, chat_id: ChatId, text: String) -> Transition {
        Transition::new(
            State::Root(self.state),
            self.user_data,
            vec![SendMessage::new(chat_id, text).into()],
        )
    }

    fn stay(self) -> Transition {
        Transition::new(State::Root(self.state), self.user_data, Vec::new())
    }

    async fn handle_set_default_project(
        self: Box<Self>,
        chat_id: ChatId,
        cmd: &slashcmd::Command,
    ) -> Transition {
        if cmd.args.len() == 1 {
            let id = github::ProjectId(cmd.args[0].clone());
            return self.save_default_project(chat_id, id).await;
        }

        if self.user_data.github_api_key.is_some() {
            let text = self.responses.root.set_default_project.clone();
            return Transition::new(
                SetDefaultProjectState { root: self.state },
                self.user_data,
                vec![SendMessage::new(chat_id, text).into()],
            );
        }

        let text = self.responses.root.no_api_key_added.clone();
        self.reply(chat_id, text)
    }

    async fn save_default_project(
        mut self: Box<Self>,
        chat_id: ChatId,
        id: github::ProjectId,
    ) -> Transition {
        let Some(token) = self.user_data.github_api_key.clone() else {
            let text = self.responses.root.no_api_key_added.clone();
            return self.reply(chat_id, text);
        };

        match project_by_id(&token, &id).await {
            Err(error) => {
                tracing::warn!(%error, "could not look up the project to save as default");
                let text = github_error_text(&error, &self.responses.root.github_error_generic);
                self.reply(chat_id, text)
            }
            Ok(project) => {
                self.state.default_project = Some(project.id);
                let text = self
                    .responses
                    .root
                    .saved_default_project
                    .replace("%s", &project.title);
                self.reply(chat_id, text)
            }
        }
    }

    async fn handle_list_projects(
        self: Box<Self>,
        chat_id: ChatId,
        after: Option<github::ProjectCursor>,
    ) -> Transition {
        let Some(token) = self.user_data.github_api_key.clone() else {
            let text = self.responses.root.no_api_key_added.clone();
            return self.reply(chat_id, text);
        };

        let projects = match viewer_projects(&token, PROJECTS_PER_PAGE, after.as_ref()).await {
            Ok(projects) => projects,
            Err(error) => {
                tracing::warn!(%error, "listing the viewer's projects failed");
                let text = github_error_text(&error, &self.responses.root.github_error_generic);
                return self.reply(chat_id, text);
            }
        };

        if projects.is_empty() {
            let text = if after.is_none() {
                self.responses.root.user_has_zero_projects.clone()
            } else {
                self.responses.root.last_projects_page.clone()
            };
            return self.reply(chat_id, text);
        }

        let mut list = format!("Your projects ({PROJECTS_PER_PAGE}/page)");
        for project in &projects {
            let cursor = project
                .cursor
                .as_ref()
                .map(|cursor| cursor.0.as_str())
                .unwrap_or_default();
            list.push_str(&format!(
                "\n\n<code>{cursor}</code> <a href=\"{url}\"><b>{title}</b></a> \
                 (<a href=\"{creator_url}\">{creator}</a>/{number})\nID: <code>{id}</code>",
                url = project.url,
                title = project.title,
                creator_url = project.creator_url,
                creator = project.creator_login,
                number = project.number,
                id = project.id,
            ));
        }

        let mut message = SendMessage::new(chat_id, list);

        // A full page probably has a successor; a shorter one is the last.
        if projects.len() == PROJECTS_PER_PAGE as usize {
            if let Some(last_cursor) = projects.last().and_then(|project| project.cursor.as_ref())
            {
                message = message.reply_markup(vec![vec![
                    InlineKeyboardButton::switch_query_current_chat(
                        "Next page",
                        format!("/{LIST_PROJECTS_COMMAND} after {last_cursor}"),
                    ),
                ]]);
            }
        }

        Transition::new(State::Root(self.state), self.user_data, vec![message.into()])
    }

    async fn handle_daily_status(
        self: Box<Self>,
        chat_id: ChatId,
        date_override: Option<String>,
    ) -> Transition {
        let Some(token) = self.user_data.github_api_key.clone() else {
            let text = self.responses.root.no_api_key_added.clone();
            return self.reply(chat_id, text);
        };

        // A saved default wins no matter how many boards the user has.
        if let Some(project_id) = self.state.default_project.clone() {
            return match project_by_id(&token, &project_id).await {
                Ok(project) => self.enter_daily_status(chat_id, project, date_override),
                Err(error) => {
                    tracing::warn!(%error, "could not fetch the default project");
                    let text =
                        github_error_text(&error, &self.responses.root.github_error_generic);
                    self.reply(chat_id, text)
                }
            };
        }

        // Two is enough to tell "exactly one" from "several".
        let mut projects = match viewer_projects(&token, 2, None).await {
            Ok(projects) => projects,
            Err(error) => {
                tracing::warn!(%error, "listing the viewer's projects failed");
                let text = github_error_text(&error, &self.responses.root.github_error_generic);
                return self.reply(chat_id, text);
            }
        };

        match projects.len() {
            0 => {
                let text = self.responses.root.user_has_zero_projects.clone();
                self.reply(chat_id, text)
            }
            1 => {
                let project = projects.remove(0);
                if self.state.use_only_project_no_save_default {
                    return self.enter_daily_status(chat_id, project, date_override);
                }

                let text = self
                    .responses
                    .root
                    .save_only_project_as_default
                    .replace("%s", &project.title);
                let message = SendMessage::new(chat_id, text)
                    .reply_markup(DailyStatusState::save_default_keyboard());
                let state =
                    DailyStatusState::ask_save_default(self.state, project.id, date_override);
                Transition::new(state, self.user_data, vec![message.into()])
            }
            _ => {
                let text = self.responses.root.use_set_default_project.clone();
                self.reply(chat_id, text)
            }
        }
    }

    fn enter_daily_status(
        self: Box<Self>,
        chat_id: ChatId,
        project: github::Project,
        date_override: Option<String>,
    ) -> Transition {
        let text = self
            .responses
            .root
            .daily_status
            .replace("%s", &project.title);
        let state = DailyStatusState::for_project(self.state, project.id, date_override);

        Transition::new(
            state,
            self.user_data,
            vec![SendMessage::new(chat_id, text).into()],
        )
    }
}
