//! MongoDB-backed `Store`
//!
//! Counter changes go through `$inc` so concurrent requests never lose an
//! increment. Rating means are replaced with a filter on their previous
//! values, which makes the write a compare-and-set.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use mongodb::options::FindOptions;
use tracing::info;

use crate::db::mongo::{MongoClient, MongoCollection};
use crate::db::schemas::{
    AnswerDoc, NotificationDoc, QuestionDoc, RatingEntryDoc, TagDoc, UserDoc, ANSWER_COLLECTION,
    NOTIFICATION_COLLECTION, QUESTION_COLLECTION, RATING_ENTRY_COLLECTION, TAG_COLLECTION,
    USER_COLLECTION,
};
use crate::db::store::{FollowChange, QuestionFilter, Store, UserCounterDelta};
use crate::stats::{Rating, RunningMean};
use crate::types::{DeskError, Result};

/// Store over the six doubtdesk collections
pub struct MongoStore {
    users: MongoCollection<UserDoc>,
    questions: MongoCollection<QuestionDoc>,
    answers: MongoCollection<AnswerDoc>,
    entries: MongoCollection<RatingEntryDoc>,
    tags: MongoCollection<TagDoc>,
    notifications: MongoCollection<NotificationDoc>,
}

impl MongoStore {
    /// Open every collection, creating indexes as needed
    pub async fn open(client: &MongoClient) -> Result<Self> {
        let store = Self {
            users: client.collection(USER_COLLECTION).await?,
            questions: client.collection(QUESTION_COLLECTION).await?,
            answers: client.collection(ANSWER_COLLECTION).await?,
            entries: client.collection(RATING_ENTRY_COLLECTION).await?,
            tags: client.collection(TAG_COLLECTION).await?,
            notifications: client.collection(NOTIFICATION_COLLECTION).await?,
        };
        info!("Opened collections and indexes in '{}'", client.db_name());
        Ok(store)
    }

    async fn follower_count(&self, id: &ObjectId) -> Result<i64> {
        Ok(self
            .questions
            .find_one(doc! { "_id": id })
            .await?
            .map(|q| q.follower_count.max(0))
            .unwrap_or(0))
    }
}

fn newest_first(limit: usize) -> FindOptions {
    FindOptions::builder()
        .sort(doc! { "metadata.created_at": -1, "_id": -1 })
        .limit(limit as i64)
        .build()
}

/// Regex-escape user input for a substring match
fn escape_regex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn question_filter_doc(filter: &QuestionFilter) -> Document {
    let mut query = Document::new();

    if let Some(category) = filter.category {
        query.insert("category", category.as_str());
    }
    if filter.unanswered {
        query.insert("answers_count", 0_i64);
    }
    if !filter.tags.is_empty() {
        query.insert("tags", doc! { "$in": filter.tags.clone() });
    }
    if let Some(ref text) = filter.text {
        let pattern = escape_regex(text);
        query.insert(
            "$or",
            vec![
                doc! { "title": { "$regex": pattern.clone(), "$options": "i" } },
                doc! { "description": { "$regex": pattern, "$options": "i" } },
            ],
        );
    }

    query
}

#[async_trait]
impl Store for MongoStore {
    async fn insert_user(&self, user: UserDoc) -> Result<ObjectId> {
        self.users.insert_one(user).await.map_err(|e| match e {
            DeskError::Conflict(_) => DeskError::Conflict("Email already registered".into()),
            other => other,
        })
    }

    async fn find_user(&self, id: &ObjectId) -> Result<Option<UserDoc>> {
        self.users.find_one(doc! { "_id": id }).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserDoc>> {
        self.users.find_one(doc! { "email": email }).await
    }

    async fn find_users(&self, ids: &[ObjectId]) -> Result<Vec<UserDoc>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.users
            .find_many(doc! { "_id": { "$in": ids.to_vec() } }, None)
            .await
    }

    async fn set_joined_community(&self, id: &ObjectId) -> Result<()> {
        self.users
            .update_one(doc! { "_id": id }, doc! { "$set": { "joined_community": true } })
            .await?;
        Ok(())
    }

    async fn increment_user(&self, id: &ObjectId, delta: UserCounterDelta) -> Result<()> {
        if delta.is_zero() {
            return Ok(());
        }
        self.users
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$inc": {
                        "reputation_score": delta.reputation,
                        "contribution_count": delta.contributions,
                        "accepted_answers_count": delta.accepted_answers,
                    }
                },
            )
            .await?;
        Ok(())
    }

    async fn compare_and_set_user_rating(
        &self,
        id: &ObjectId,
        expected: RunningMean,
        next: RunningMean,
    ) -> Result<bool> {
        let result = self
            .users
            .update_one(
                doc! {
                    "_id": id,
                    "total_ratings_received": expected.count,
                    "average_rating": expected.average,
                },
                doc! {
                    "$set": {
                        "total_ratings_received": next.count,
                        "average_rating": next.average,
                    }
                },
            )
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<UserDoc>> {
        let options = FindOptions::builder()
            .sort(doc! {
                "reputation_score": -1,
                "accepted_answers_count": -1,
                "average_rating": -1,
            })
            .limit(limit as i64)
            .build();
        self.users
            .find_many(doc! { "joined_community": true }, Some(options))
            .await
    }

    async fn insert_question(&self, question: QuestionDoc) -> Result<ObjectId> {
        self.questions.insert_one(question).await
    }

    async fn find_question(&self, id: &ObjectId) -> Result<Option<QuestionDoc>> {
        self.questions.find_one(doc! { "_id": id }).await
    }

    async fn list_questions(&self, filter: &QuestionFilter) -> Result<Vec<QuestionDoc>> {
        self.questions
            .find_many(question_filter_doc(filter), Some(newest_first(filter.limit)))
            .await
    }

    async fn increment_answers_count(&self, id: &ObjectId) -> Result<()> {
        self.questions
            .update_one(doc! { "_id": id }, doc! { "$inc": { "answers_count": 1_i64 } })
            .await?;
        Ok(())
    }

    async fn set_accepted_answer(&self, id: &ObjectId, answer_id: &ObjectId) -> Result<()> {
        self.questions
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "accepted_answer_id": answer_id } },
            )
            .await?;
        Ok(())
    }

    async fn add_follower(&self, id: &ObjectId, user_id: &ObjectId) -> Result<FollowChange> {
        let result = self
            .questions
            .update_one(
                doc! { "_id": id, "followers": { "$ne": user_id } },
                doc! {
                    "$addToSet": { "followers": user_id },
                    "$inc": { "follower_count": 1_i64 },
                },
            )
            .await?;
        Ok(FollowChange {
            changed: result.modified_count == 1,
            follower_count: self.follower_count(id).await?,
        })
    }

    async fn remove_follower(&self, id: &ObjectId, user_id: &ObjectId) -> Result<FollowChange> {
        let result = self
            .questions
            .update_one(
                doc! { "_id": id, "followers": user_id, "follower_count": { "$gt": 0_i64 } },
                doc! {
                    "$pull": { "followers": user_id },
                    "$inc": { "follower_count": -1_i64 },
                },
            )
            .await?;
        Ok(FollowChange {
            changed: result.modified_count == 1,
            follower_count: self.follower_count(id).await?,
        })
    }

    async fn questions_followed_by(
        &self,
        user_id: &ObjectId,
        limit: usize,
    ) -> Result<Vec<QuestionDoc>> {
        self.questions
            .find_many(doc! { "followers": user_id }, Some(newest_first(limit)))
            .await
    }

    async fn bump_tags(&self, tags: &[String]) -> Result<()> {
        for tag in tags {
            self.tags
                .upsert_one(
                    doc! { "name": tag },
                    doc! {
                        "$inc": { "usage_count": 1_i64 },
                        "$setOnInsert": {
                            "metadata.is_deleted": false,
                            "metadata.created_at": DateTime::now(),
                        },
                        "$set": { "metadata.updated_at": DateTime::now() },
                    },
                )
                .await?;
        }
        Ok(())
    }

    async fn insert_answer(&self, answer: AnswerDoc) -> Result<ObjectId> {
        self.answers.insert_one(answer).await
    }

    async fn find_answer(&self, id: &ObjectId) -> Result<Option<AnswerDoc>> {
        self.answers.find_one(doc! { "_id": id }).await
    }

    async fn answers_for_question(&self, question_id: &ObjectId) -> Result<Vec<AnswerDoc>> {
        let options = FindOptions::builder()
            .sort(doc! { "is_accepted": -1, "metadata.created_at": 1, "_id": 1 })
            .build();
        self.answers
            .find_many(doc! { "question_id": question_id }, Some(options))
            .await
    }

    async fn set_answer_accepted(&self, id: &ObjectId, accepted: bool) -> Result<()> {
        self.answers
            .update_one(doc! { "_id": id }, doc! { "$set": { "is_accepted": accepted } })
            .await?;
        Ok(())
    }

    async fn increment_answer_likes(&self, id: &ObjectId, delta: i64) -> Result<()> {
        let mut filter = doc! { "_id": id };
        if delta < 0 {
            filter.insert("likes_count", doc! { "$gte": -delta });
        }
        self.answers
            .update_one(filter, doc! { "$inc": { "likes_count": delta } })
            .await?;
        Ok(())
    }

    async fn compare_and_set_answer_rating(
        &self,
        id: &ObjectId,
        expected: RunningMean,
        next: RunningMean,
    ) -> Result<bool> {
        let result = self
            .answers
            .update_one(
                doc! {
                    "_id": id,
                    "total_ratings": expected.count,
                    "average_rating": expected.average,
                },
                doc! {
                    "$set": {
                        "total_ratings": next.count,
                        "average_rating": next.average,
                    }
                },
            )
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn find_rating_entry(
        &self,
        answer_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<Option<RatingEntryDoc>> {
        self.entries
            .find_one(doc! { "answer_id": answer_id, "user_id": user_id })
            .await
    }

    async fn insert_rating_entry(&self, entry: RatingEntryDoc) -> Result<ObjectId> {
        self.entries.insert_one(entry).await
    }

    async fn set_entry_liked(&self, id: &ObjectId, liked: bool) -> Result<()> {
        self.entries
            .update_one(doc! { "_id": id }, doc! { "$set": { "liked": liked } })
            .await?;
        Ok(())
    }

    async fn set_entry_rating(&self, id: &ObjectId, rating: Rating) -> Result<()> {
        self.entries
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "rating": Bson::Int32(rating.value()) } },
            )
            .await?;
        Ok(())
    }

    async fn delete_rating_entry(&self, id: &ObjectId) -> Result<bool> {
        self.entries.delete_one(doc! { "_id": id }).await
    }

    async fn insert_notification(&self, notification: NotificationDoc) -> Result<ObjectId> {
        self.notifications.insert_one(notification).await
    }

    async fn notifications_for(
        &self,
        user_id: &ObjectId,
        limit: usize,
    ) -> Result<Vec<NotificationDoc>> {
        self.notifications
            .find_many(doc! { "user_id": user_id }, Some(newest_first(limit)))
            .await
    }

    async fn unread_count(&self, user_id: &ObjectId) -> Result<u64> {
        self.notifications
            .count(doc! { "user_id": user_id, "read": false })
            .await
    }

    async fn mark_notification_read(
        &self,
        id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<Option<NotificationDoc>> {
        let filter = doc! { "_id": id, "user_id": user_id };
        let result = self
            .notifications
            .update_one(filter.clone(), doc! { "$set": { "read": true } })
            .await?;
        if result.matched_count == 0 {
            return Ok(None);
        }
        self.notifications.find_one(filter).await
    }

    async fn mark_all_read(&self, user_id: &ObjectId) -> Result<u64> {
        let result = self
            .notifications
            .update_many(
                doc! { "user_id": user_id, "read": false },
                doc! { "$set": { "read": true, "metadata.updated_at": DateTime::now() } },
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn delete_notification(&self, id: &ObjectId, user_id: &ObjectId) -> Result<bool> {
        let result = self
            .notifications
            .soft_delete(doc! {
                "_id": id,
                "user_id": user_id,
                "metadata.is_deleted": { "$ne": true },
            })
            .await?;
        Ok(result.matched_count == 1)
    }
}
