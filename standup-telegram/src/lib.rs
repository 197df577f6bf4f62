//! Telegram client for the standup bot.
//!
//! The crate is built around a three-stage pipeline:
//!
//! 1. a long-poll **fetcher** pulls updates from the API,
//! 2. a **binder** pairs every update with futures for its conversation
//!    state and its sender's shared data, and
//! 3. a pool of **workers** resolves those futures, runs the conversation
//!    handler, and sends the resulting actions back to the API.
//!
//! Per-conversation exclusivity and ordering come from the borrow-once
//! store in `standup-core`: the binder hands out turns synchronously, so
//! updates of one conversation are processed strictly in arrival order
//! while unrelated conversations run in parallel across the pool.

pub mod action;
pub mod api;
pub mod client;
pub mod dispatch;
pub mod error;
pub mod state;
pub mod update;

mod binder;
mod fetcher;
mod worker;

pub use client::Client;
pub use error::ClientError;
