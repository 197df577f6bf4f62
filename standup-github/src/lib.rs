//! GitHub GraphQL client for the standup bot.
//!
//! Conversation handlers use it to validate tokens, browse the viewer's
//! ProjectV2 boards, and pull the item lists the daily report is built from.

mod client;
mod error;

pub use client::{Client, ItemsByStatus, Project, ProjectCursor, ProjectId};
pub use error::{GithubError, Result};
