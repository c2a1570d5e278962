//! doubtdesk - REST backend for a student Q&A community
//!
//! Users ask questions, post answers, accept, like and rate them, follow
//! questions and climb a reputation leaderboard. Answer and author rating
//! averages are maintained incrementally: each rating event folds one value
//! into a stored `(count, average)` pair instead of rescanning the ledger.
//!
//! ## Layout
//!
//! - **stats**: running mean plus answer and author aggregates
//! - **ledger**: per-(rater, answer) like and rating entries
//! - **reputation**: point policy and the audited reputation ledger
//! - **actions**: `Desk`, one method per user action and read model
//! - **db**: `Store` trait with MongoDB and in-memory implementations
//! - **routes** / **server**: hyper HTTP/1 surface

pub mod actions;
pub mod auth;
pub mod config;
pub mod db;
pub mod ledger;
pub mod reputation;
pub mod routes;
pub mod server;
pub mod stats;
pub mod types;

pub use actions::Desk;
pub use config::Args;
pub use server::{run, AppState};
pub use types::{DeskError, Result};
