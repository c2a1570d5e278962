//! Read models returned by the API

use bson::oid::ObjectId;
use serde::Serialize;
use std::collections::HashMap;

use super::{Desk, LIST_LIMIT};
use crate::db::schemas::{
    AnswerDoc, Category, Identified, NotificationDoc, NotificationKind, QuestionDoc, UserDoc,
};
use crate::db::QuestionFilter;
use crate::stats::Rating;
use crate::types::{DeskError, Result};

/// Characters of description shown in question lists
pub const PREVIEW_CHARS: usize = 160;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    pub id: String,
    pub name: String,
    pub department: String,
    pub reputation_score: i64,
}

impl From<&UserDoc> for AuthorSummary {
    fn from(user: &UserDoc) -> Self {
        Self {
            id: user._id.map(|id| id.to_hex()).unwrap_or_default(),
            name: user.name.clone(),
            department: user.department.clone(),
            reputation_score: user.reputation_score,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSummary {
    pub id: String,
    pub title: String,
    pub description_preview: String,
    pub category: Category,
    pub tags: Vec<String>,
    pub author: Option<AuthorSummary>,
    pub answers_count: i64,
    pub likes_count: i64,
    pub follower_count: i64,
    pub has_accepted_answer: bool,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerView {
    pub id: String,
    pub body: String,
    pub author: Option<AuthorSummary>,
    pub is_accepted: bool,
    pub likes_count: i64,
    pub total_ratings: i64,
    pub average_rating: f64,
    /// Only present when the request is authenticated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liked_by_me: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_rating: Option<Rating>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub tags: Vec<String>,
    pub author: Option<AuthorSummary>,
    pub answers_count: i64,
    pub likes_count: i64,
    pub follower_count: i64,
    pub has_accepted_answer: bool,
    pub accepted_answer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_following: Option<bool>,
    pub created_at: Option<String>,
}

/// A question and its answers, serialized as `{question, answers}`
#[derive(Debug, Clone, Serialize)]
pub struct QuestionDetail {
    pub question: QuestionView,
    pub answers: Vec<AnswerView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub id: String,
    pub name: String,
    pub department: String,
    pub reputation_score: i64,
    pub accepted_answers_count: i64,
    pub contribution_count: i64,
    pub total_ratings_received: i64,
    pub average_rating: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub department: String,
    pub year: i32,
    pub skills: Vec<String>,
    pub joined_community: bool,
    pub reputation_score: i64,
    pub contribution_count: i64,
    pub accepted_answers_count: i64,
    pub total_ratings_received: i64,
    pub average_rating: f64,
    pub created_at: Option<String>,
}

impl From<&UserDoc> for UserProfile {
    fn from(user: &UserDoc) -> Self {
        Self {
            id: user._id.map(|id| id.to_hex()).unwrap_or_default(),
            name: user.name.clone(),
            email: user.email.clone(),
            department: user.department.clone(),
            year: user.year,
            skills: user.skills.clone(),
            joined_community: user.joined_community,
            reputation_score: user.reputation_score,
            contribution_count: user.contribution_count,
            accepted_answers_count: user.accepted_answers_count,
            total_ratings_received: user.total_ratings_received,
            average_rating: user.average_rating,
            created_at: user.metadata.created_at_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub entity_id: Option<String>,
    pub created_at: Option<String>,
}

impl From<&NotificationDoc> for NotificationView {
    fn from(n: &NotificationDoc) -> Self {
        Self {
            id: n._id.map(|id| id.to_hex()).unwrap_or_default(),
            kind: n.kind,
            title: n.title.clone(),
            message: n.message.clone(),
            read: n.read,
            entity_id: n.entity_id.clone(),
            created_at: n.metadata.created_at_rfc3339(),
        }
    }
}

fn summarize(question: &QuestionDoc, authors: &HashMap<ObjectId, UserDoc>) -> QuestionSummary {
    QuestionSummary {
        id: question._id.map(|id| id.to_hex()).unwrap_or_default(),
        title: question.title.clone(),
        description_preview: question.description_preview(PREVIEW_CHARS),
        category: question.category,
        tags: question.tags.clone(),
        author: authors.get(&question.author_id).map(AuthorSummary::from),
        answers_count: question.answers_count,
        likes_count: question.likes_count,
        follower_count: question.follower_count,
        has_accepted_answer: question.accepted_answer_id.is_some(),
        created_at: question.metadata.created_at_rfc3339(),
    }
}

impl Desk {
    async fn authors_by_id(
        &self,
        ids: impl Iterator<Item = ObjectId>,
    ) -> Result<HashMap<ObjectId, UserDoc>> {
        let mut ids: Vec<ObjectId> = ids.collect();
        ids.sort();
        ids.dedup();

        Ok(self
            .store
            .find_users(&ids)
            .await?
            .into_iter()
            .filter_map(|user| user._id.map(|id| (id, user)))
            .collect())
    }

    async fn summaries(&self, questions: Vec<QuestionDoc>) -> Result<Vec<QuestionSummary>> {
        let authors = self
            .authors_by_id(questions.iter().map(|q| q.author_id))
            .await?;
        Ok(questions.iter().map(|q| summarize(q, &authors)).collect())
    }

    /// Newest questions matching `filter`, at most `LIST_LIMIT`
    pub async fn list_questions(&self, mut filter: QuestionFilter) -> Result<Vec<QuestionSummary>> {
        if filter.limit == 0 || filter.limit > LIST_LIMIT {
            filter.limit = LIST_LIMIT;
        }
        let questions = self.store.list_questions(&filter).await?;
        self.summaries(questions).await
    }

    /// A question with its answers, accepted first then oldest first.
    /// With a viewer, each answer also reports the viewer's like and rating.
    pub async fn question_detail(
        &self,
        question_id: &ObjectId,
        viewer: Option<&ObjectId>,
    ) -> Result<QuestionDetail> {
        let question = self
            .store
            .find_question(question_id)
            .await?
            .ok_or_else(|| DeskError::not_found("Question not found"))?;
        let answers = self.store.answers_for_question(question_id).await?;

        let authors = self
            .authors_by_id(
                std::iter::once(question.author_id).chain(answers.iter().map(|a| a.author_id)),
            )
            .await?;

        let mut views = Vec::with_capacity(answers.len());
        for answer in &answers {
            views.push(self.answer_view(answer, &authors, viewer).await?);
        }

        Ok(QuestionDetail {
            question: QuestionView {
                id: question_id.to_hex(),
                title: question.title.clone(),
                description: question.description.clone(),
                category: question.category,
                tags: question.tags.clone(),
                author: authors.get(&question.author_id).map(AuthorSummary::from),
                answers_count: question.answers_count,
                likes_count: question.likes_count,
                follower_count: question.follower_count,
                has_accepted_answer: question.accepted_answer_id.is_some(),
                accepted_answer_id: question.accepted_answer_id.map(|id| id.to_hex()),
                is_following: viewer.map(|v| question.is_followed_by(v)),
                created_at: question.metadata.created_at_rfc3339(),
            },
            answers: views,
        })
    }

    async fn answer_view(
        &self,
        answer: &AnswerDoc,
        authors: &HashMap<ObjectId, UserDoc>,
        viewer: Option<&ObjectId>,
    ) -> Result<AnswerView> {
        let answer_id = answer.id()?;
        let entry = match viewer {
            Some(v) => self.ledger.entry(v, &answer_id).await?,
            None => None,
        };

        Ok(AnswerView {
            id: answer_id.to_hex(),
            body: answer.body.clone(),
            author: authors.get(&answer.author_id).map(AuthorSummary::from),
            is_accepted: answer.is_accepted,
            likes_count: answer.likes_count,
            total_ratings: answer.total_ratings,
            average_rating: answer.average_rating,
            liked_by_me: viewer.map(|_| entry.as_ref().map(|e| e.liked).unwrap_or(false)),
            my_rating: entry.and_then(|e| e.rating),
            created_at: answer.metadata.created_at_rfc3339(),
        })
    }

    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>> {
        let users = self.store.leaderboard(LIST_LIMIT).await?;
        Ok(users
            .iter()
            .enumerate()
            .map(|(i, user)| LeaderboardEntry {
                rank: i + 1,
                id: user._id.map(|id| id.to_hex()).unwrap_or_default(),
                name: user.name.clone(),
                department: user.department.clone(),
                reputation_score: user.reputation_score,
                accepted_answers_count: user.accepted_answers_count,
                contribution_count: user.contribution_count,
                total_ratings_received: user.total_ratings_received,
                average_rating: user.average_rating,
            })
            .collect())
    }

    pub async fn profile(&self, actor: &ObjectId) -> Result<UserProfile> {
        let user = self.require_user(actor).await?;
        Ok(UserProfile::from(&user))
    }

    // Follow queries

    pub async fn is_following(&self, actor: &ObjectId, question_id: &ObjectId) -> Result<bool> {
        let question = self
            .store
            .find_question(question_id)
            .await?
            .ok_or_else(|| DeskError::not_found("Question not found"))?;
        Ok(question.is_followed_by(actor))
    }

    pub async fn follower_count(&self, question_id: &ObjectId) -> Result<i64> {
        let question = self
            .store
            .find_question(question_id)
            .await?
            .ok_or_else(|| DeskError::not_found("Question not found"))?;
        Ok(question.follower_count)
    }

    pub async fn followed_questions(&self, actor: &ObjectId) -> Result<Vec<QuestionSummary>> {
        let questions = self.store.questions_followed_by(actor, LIST_LIMIT).await?;
        self.summaries(questions).await
    }

    // Notifications

    pub async fn notifications(&self, actor: &ObjectId) -> Result<Vec<NotificationView>> {
        let notifications = self.store.notifications_for(actor, LIST_LIMIT).await?;
        Ok(notifications.iter().map(NotificationView::from).collect())
    }

    pub async fn unread_notifications(&self, actor: &ObjectId) -> Result<u64> {
        self.store.unread_count(actor).await
    }

    pub async fn mark_notification_read(
        &self,
        actor: &ObjectId,
        notification_id: &ObjectId,
    ) -> Result<NotificationView> {
        self.store
            .mark_notification_read(notification_id, actor)
            .await?
            .as_ref()
            .map(NotificationView::from)
            .ok_or_else(|| DeskError::not_found("Notification not found"))
    }

    pub async fn mark_all_notifications_read(&self, actor: &ObjectId) -> Result<u64> {
        self.store.mark_all_read(actor).await
    }

    pub async fn delete_notification(
        &self,
        actor: &ObjectId,
        notification_id: &ObjectId,
    ) -> Result<()> {
        if self.store.delete_notification(notification_id, actor).await? {
            Ok(())
        } else {
            Err(DeskError::not_found("Notification not found"))
        }
    }
}
