//! Storage seam for the action handlers
//!
//! Handlers only see `Store`. `MongoStore` backs it in production and
//! `MemoryStore` in dev mode and tests. Counter changes are atomic increments.
//! Running means are written with compare-and-set against the values the
//! caller read, so a lost update turns into a `false` return instead of a
//! silently wrong average.

use async_trait::async_trait;
use bson::oid::ObjectId;
use serde::Serialize;

use crate::db::schemas::{
    AnswerDoc, Category, NotificationDoc, QuestionDoc, RatingEntryDoc, UserDoc,
};
use crate::stats::{Rating, RunningMean};
use crate::types::Result;

/// Increments applied to a user's counters in one write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCounterDelta {
    pub reputation: i64,
    pub contributions: i64,
    pub accepted_answers: i64,
}

impl UserCounterDelta {
    pub fn reputation(points: i64) -> Self {
        Self {
            reputation: points,
            ..Default::default()
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// Listing filters for the question feed
#[derive(Debug, Clone, Default)]
pub struct QuestionFilter {
    /// Case-insensitive substring over title and description
    pub text: Option<String>,
    pub category: Option<Category>,
    pub unanswered: bool,
    /// Match questions carrying any of these tags
    pub tags: Vec<String>,
    pub limit: usize,
}

/// Result of a follow or unfollow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowChange {
    /// Whether the follower set actually changed
    pub changed: bool,
    pub follower_count: i64,
}

#[async_trait]
pub trait Store: Send + Sync {
    // Users

    async fn insert_user(&self, user: UserDoc) -> Result<ObjectId>;
    async fn find_user(&self, id: &ObjectId) -> Result<Option<UserDoc>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserDoc>>;
    async fn find_users(&self, ids: &[ObjectId]) -> Result<Vec<UserDoc>>;
    async fn set_joined_community(&self, id: &ObjectId) -> Result<()>;
    async fn increment_user(&self, id: &ObjectId, delta: UserCounterDelta) -> Result<()>;
    /// Write a new rating mean if the stored one still equals `expected`
    async fn compare_and_set_user_rating(
        &self,
        id: &ObjectId,
        expected: RunningMean,
        next: RunningMean,
    ) -> Result<bool>;
    /// Joined users ordered by reputation, accepted answers, average rating
    async fn leaderboard(&self, limit: usize) -> Result<Vec<UserDoc>>;

    // Questions

    async fn insert_question(&self, question: QuestionDoc) -> Result<ObjectId>;
    async fn find_question(&self, id: &ObjectId) -> Result<Option<QuestionDoc>>;
    /// Newest first
    async fn list_questions(&self, filter: &QuestionFilter) -> Result<Vec<QuestionDoc>>;
    async fn increment_answers_count(&self, id: &ObjectId) -> Result<()>;
    async fn set_accepted_answer(&self, id: &ObjectId, answer_id: &ObjectId) -> Result<()>;
    async fn add_follower(&self, id: &ObjectId, user_id: &ObjectId) -> Result<FollowChange>;
    async fn remove_follower(&self, id: &ObjectId, user_id: &ObjectId) -> Result<FollowChange>;
    /// Newest first
    async fn questions_followed_by(&self, user_id: &ObjectId, limit: usize)
        -> Result<Vec<QuestionDoc>>;
    /// Bump usage counters, creating tags on first use
    async fn bump_tags(&self, tags: &[String]) -> Result<()>;

    // Answers

    async fn insert_answer(&self, answer: AnswerDoc) -> Result<ObjectId>;
    async fn find_answer(&self, id: &ObjectId) -> Result<Option<AnswerDoc>>;
    /// Accepted first, then oldest first
    async fn answers_for_question(&self, question_id: &ObjectId) -> Result<Vec<AnswerDoc>>;
    async fn set_answer_accepted(&self, id: &ObjectId, accepted: bool) -> Result<()>;
    /// Add to `likes_count`; a decrement never takes it below zero
    async fn increment_answer_likes(&self, id: &ObjectId, delta: i64) -> Result<()>;
    async fn compare_and_set_answer_rating(
        &self,
        id: &ObjectId,
        expected: RunningMean,
        next: RunningMean,
    ) -> Result<bool>;

    // Rating ledger

    async fn find_rating_entry(
        &self,
        answer_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<Option<RatingEntryDoc>>;
    /// Fails with `Conflict` when the (answer, user) pair already has an entry
    async fn insert_rating_entry(&self, entry: RatingEntryDoc) -> Result<ObjectId>;
    async fn set_entry_liked(&self, id: &ObjectId, liked: bool) -> Result<()>;
    async fn set_entry_rating(&self, id: &ObjectId, rating: Rating) -> Result<()>;
    async fn delete_rating_entry(&self, id: &ObjectId) -> Result<bool>;

    // Notifications

    async fn insert_notification(&self, notification: NotificationDoc) -> Result<ObjectId>;
    /// Newest first
    async fn notifications_for(&self, user_id: &ObjectId, limit: usize)
        -> Result<Vec<NotificationDoc>>;
    async fn unread_count(&self, user_id: &ObjectId) -> Result<u64>;
    /// Returns the updated notification when it exists and belongs to the user
    async fn mark_notification_read(
        &self,
        id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<Option<NotificationDoc>>;
    async fn mark_all_read(&self, user_id: &ObjectId) -> Result<u64>;
    async fn delete_notification(&self, id: &ObjectId, user_id: &ObjectId) -> Result<bool>;
}
