//! Action handlers
//!
//! `Desk` owns the services that mutate aggregates and exposes one method
//! per user action. Every method checks its preconditions before the first
//! write, so a rejected action leaves no partial change behind.
//!
//! Lock order is question, then answer, then author. No method takes them in
//! any other order.

mod accounts;
mod answers;
pub mod locks;
mod queries;
mod questions;

use bson::oid::ObjectId;
use std::sync::Arc;
use tracing::warn;

use crate::db::schemas::{NotificationDoc, UserDoc};
use crate::db::Store;
use crate::ledger::RatingLedger;
use crate::reputation::{ReputationLedger, ReputationPolicy};
use crate::stats::{AnswerStats, AuthorStats};
use crate::types::{DeskError, Result};

pub use accounts::NewUser;
pub use answers::{AcceptOutcome, RateOutcome};
pub use locks::KeyedLocks;
pub use queries::{
    AnswerView, AuthorSummary, LeaderboardEntry, NotificationView, QuestionDetail,
    QuestionSummary, QuestionView, UserProfile,
};
pub use questions::{normalize_tags, NewQuestion};

/// Maximum rows returned by list endpoints
pub const LIST_LIMIT: usize = 50;

pub struct Desk {
    store: Arc<dyn Store>,
    ledger: RatingLedger,
    answers: AnswerStats,
    authors: AuthorStats,
    question_locks: KeyedLocks,
    answer_locks: KeyedLocks,
    author_locks: KeyedLocks,
}

impl Desk {
    pub fn new(store: Arc<dyn Store>, policy: ReputationPolicy) -> Self {
        let reputation = ReputationLedger::new(store.clone(), policy);
        Self {
            ledger: RatingLedger::new(store.clone()),
            answers: AnswerStats::new(store.clone()),
            authors: AuthorStats::new(store.clone(), reputation),
            store,
            question_locks: KeyedLocks::new(),
            answer_locks: KeyedLocks::new(),
            author_locks: KeyedLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn policy(&self) -> &ReputationPolicy {
        self.authors.reputation().policy()
    }

    /// The acting user, who must exist
    async fn require_user(&self, actor: &ObjectId) -> Result<UserDoc> {
        self.store
            .find_user(actor)
            .await?
            .ok_or_else(|| DeskError::Unauthorized("User no longer exists".into()))
    }

    /// The acting user, who must also have joined the community
    async fn require_member(&self, actor: &ObjectId) -> Result<UserDoc> {
        let user = self.require_user(actor).await?;
        if !user.joined_community {
            return Err(DeskError::forbidden(
                "Join the community before posting, answering or liking",
            ));
        }
        Ok(user)
    }

    /// Store a notification. The action it follows has already succeeded,
    /// so a failure here is logged and not returned.
    async fn notify(&self, notification: NotificationDoc) {
        let recipient = notification.user_id;
        if let Err(e) = self.store.insert_notification(notification).await {
            warn!(user = %recipient, "Failed to store notification: {}", e);
        }
    }
}
