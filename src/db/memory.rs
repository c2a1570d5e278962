//! In-memory `Store`
//!
//! Used in dev mode when MongoDB is unreachable and by the test suite.
//! Collections are insertion-ordered vectors behind one `RwLock`, so every
//! method is atomic with respect to the others.

use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime};
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::db::schemas::{
    AnswerDoc, Metadata, NotificationDoc, QuestionDoc, RatingEntryDoc, UserDoc,
};
use crate::db::store::{FollowChange, QuestionFilter, Store, UserCounterDelta};
use crate::stats::{Rating, RunningMean};
use crate::types::{DeskError, Result};

#[derive(Default)]
struct Collections {
    users: Vec<UserDoc>,
    questions: Vec<QuestionDoc>,
    answers: Vec<AnswerDoc>,
    entries: Vec<RatingEntryDoc>,
    tags: HashMap<String, i64>,
    notifications: Vec<NotificationDoc>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Usage count for a tag, if it has ever been used
    pub async fn tag_usage(&self, name: &str) -> Option<i64> {
        self.inner.read().await.tags.get(name).copied()
    }

    /// Number of ledger entries, for tests asserting cleanup
    pub async fn rating_entry_count(&self) -> usize {
        self.inner.read().await.entries.len()
    }
}

fn stamp(metadata: &mut Metadata) {
    *metadata = Metadata::new();
}

fn touch(metadata: &mut Metadata) {
    metadata.updated_at = Some(DateTime::now());
}

fn find_mut<'a, T, F>(items: &'a mut [T], pred: F) -> Option<&'a mut T>
where
    F: Fn(&T) -> bool,
{
    items.iter_mut().find(|item| pred(item))
}

fn mean_matches(stored: RunningMean, expected: RunningMean) -> bool {
    stored.count == expected.count && stored.average.to_bits() == expected.average.to_bits()
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, mut user: UserDoc) -> Result<ObjectId> {
        let mut inner = self.inner.write().await;
        if inner.users.iter().any(|u| u.email == user.email) {
            return Err(DeskError::Conflict("Email already registered".into()));
        }
        let id = ObjectId::new();
        user._id = Some(id);
        stamp(&mut user.metadata);
        inner.users.push(user);
        Ok(id)
    }

    async fn find_user(&self, id: &ObjectId) -> Result<Option<UserDoc>> {
        let inner = self.inner.read().await;
        Ok(inner.users.iter().find(|u| u._id == Some(*id)).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserDoc>> {
        let inner = self.inner.read().await;
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_users(&self, ids: &[ObjectId]) -> Result<Vec<UserDoc>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .iter()
            .filter(|u| u._id.map(|id| ids.contains(&id)).unwrap_or(false))
            .cloned()
            .collect())
    }

    async fn set_joined_community(&self, id: &ObjectId) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(user) = find_mut(&mut inner.users, |u| u._id == Some(*id)) {
            user.joined_community = true;
            touch(&mut user.metadata);
        }
        Ok(())
    }

    async fn increment_user(&self, id: &ObjectId, delta: UserCounterDelta) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(user) = find_mut(&mut inner.users, |u| u._id == Some(*id)) {
            user.reputation_score += delta.reputation;
            user.contribution_count += delta.contributions;
            user.accepted_answers_count += delta.accepted_answers;
            touch(&mut user.metadata);
        }
        Ok(())
    }

    async fn compare_and_set_user_rating(
        &self,
        id: &ObjectId,
        expected: RunningMean,
        next: RunningMean,
    ) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match find_mut(&mut inner.users, |u| u._id == Some(*id)) {
            Some(user) if mean_matches(user.rating_mean(), expected) => {
                user.total_ratings_received = next.count;
                user.average_rating = next.average;
                touch(&mut user.metadata);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<UserDoc>> {
        let inner = self.inner.read().await;
        let mut users: Vec<UserDoc> = inner
            .users
            .iter()
            .filter(|u| u.joined_community)
            .cloned()
            .collect();
        users.sort_by(|a, b| {
            b.reputation_score
                .cmp(&a.reputation_score)
                .then(b.accepted_answers_count.cmp(&a.accepted_answers_count))
                .then(
                    b.average_rating
                        .partial_cmp(&a.average_rating)
                        .unwrap_or(Ordering::Equal),
                )
        });
        users.truncate(limit);
        Ok(users)
    }

    async fn insert_question(&self, mut question: QuestionDoc) -> Result<ObjectId> {
        let mut inner = self.inner.write().await;
        let id = ObjectId::new();
        question._id = Some(id);
        stamp(&mut question.metadata);
        inner.questions.push(question);
        Ok(id)
    }

    async fn find_question(&self, id: &ObjectId) -> Result<Option<QuestionDoc>> {
        let inner = self.inner.read().await;
        Ok(inner.questions.iter().find(|q| q._id == Some(*id)).cloned())
    }

    async fn list_questions(&self, filter: &QuestionFilter) -> Result<Vec<QuestionDoc>> {
        let inner = self.inner.read().await;
        let needle = filter.text.as_ref().map(|t| t.to_lowercase());

        Ok(inner
            .questions
            .iter()
            .rev()
            .filter(|q| filter.category.map(|c| q.category == c).unwrap_or(true))
            .filter(|q| !filter.unanswered || q.answers_count == 0)
            .filter(|q| filter.tags.is_empty() || q.tags.iter().any(|t| filter.tags.contains(t)))
            .filter(|q| match &needle {
                Some(n) => {
                    q.title.to_lowercase().contains(n) || q.description.to_lowercase().contains(n)
                }
                None => true,
            })
            .take(filter.limit)
            .cloned()
            .collect())
    }

    async fn increment_answers_count(&self, id: &ObjectId) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(q) = find_mut(&mut inner.questions, |q| q._id == Some(*id)) {
            q.answers_count += 1;
            touch(&mut q.metadata);
        }
        Ok(())
    }

    async fn set_accepted_answer(&self, id: &ObjectId, answer_id: &ObjectId) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(q) = find_mut(&mut inner.questions, |q| q._id == Some(*id)) {
            q.accepted_answer_id = Some(*answer_id);
            touch(&mut q.metadata);
        }
        Ok(())
    }

    async fn add_follower(&self, id: &ObjectId, user_id: &ObjectId) -> Result<FollowChange> {
        let mut inner = self.inner.write().await;
        let q = find_mut(&mut inner.questions, |q| q._id == Some(*id))
            .ok_or_else(|| DeskError::not_found("Question not found"))?;
        let changed = !q.followers.contains(user_id);
        if changed {
            q.followers.push(*user_id);
            q.follower_count += 1;
            touch(&mut q.metadata);
        }
        Ok(FollowChange {
            changed,
            follower_count: q.follower_count,
        })
    }

    async fn remove_follower(&self, id: &ObjectId, user_id: &ObjectId) -> Result<FollowChange> {
        let mut inner = self.inner.write().await;
        let q = find_mut(&mut inner.questions, |q| q._id == Some(*id))
            .ok_or_else(|| DeskError::not_found("Question not found"))?;
        let before = q.followers.len();
        q.followers.retain(|f| f != user_id);
        let changed = q.followers.len() != before;
        if changed {
            q.follower_count = (q.follower_count - 1).max(0);
            touch(&mut q.metadata);
        }
        Ok(FollowChange {
            changed,
            follower_count: q.follower_count,
        })
    }

    async fn questions_followed_by(
        &self,
        user_id: &ObjectId,
        limit: usize,
    ) -> Result<Vec<QuestionDoc>> {
        let inner = self.inner.read().await;
        Ok(inner
            .questions
            .iter()
            .rev()
            .filter(|q| q.followers.contains(user_id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn bump_tags(&self, tags: &[String]) -> Result<()> {
        let mut inner = self.inner.write().await;
        for tag in tags {
            *inner.tags.entry(tag.clone()).or_insert(0) += 1;
        }
        Ok(())
    }

    async fn insert_answer(&self, mut answer: AnswerDoc) -> Result<ObjectId> {
        let mut inner = self.inner.write().await;
        let id = ObjectId::new();
        answer._id = Some(id);
        stamp(&mut answer.metadata);
        inner.answers.push(answer);
        Ok(id)
    }

    async fn find_answer(&self, id: &ObjectId) -> Result<Option<AnswerDoc>> {
        let inner = self.inner.read().await;
        Ok(inner.answers.iter().find(|a| a._id == Some(*id)).cloned())
    }

    async fn answers_for_question(&self, question_id: &ObjectId) -> Result<Vec<AnswerDoc>> {
        let inner = self.inner.read().await;
        let mut answers: Vec<AnswerDoc> = inner
            .answers
            .iter()
            .filter(|a| a.question_id == *question_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion (oldest-first) order within each group
        answers.sort_by_key(|a| !a.is_accepted);
        Ok(answers)
    }

    async fn set_answer_accepted(&self, id: &ObjectId, accepted: bool) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(a) = find_mut(&mut inner.answers, |a| a._id == Some(*id)) {
            a.is_accepted = accepted;
            touch(&mut a.metadata);
        }
        Ok(())
    }

    async fn increment_answer_likes(&self, id: &ObjectId, delta: i64) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(a) = find_mut(&mut inner.answers, |a| a._id == Some(*id)) {
            a.likes_count = (a.likes_count + delta).max(0);
            touch(&mut a.metadata);
        }
        Ok(())
    }

    async fn compare_and_set_answer_rating(
        &self,
        id: &ObjectId,
        expected: RunningMean,
        next: RunningMean,
    ) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match find_mut(&mut inner.answers, |a| a._id == Some(*id)) {
            Some(answer) if mean_matches(answer.rating_mean(), expected) => {
                answer.total_ratings = next.count;
                answer.average_rating = next.average;
                touch(&mut answer.metadata);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_rating_entry(
        &self,
        answer_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<Option<RatingEntryDoc>> {
        let inner = self.inner.read().await;
        Ok(inner
            .entries
            .iter()
            .find(|e| e.answer_id == *answer_id && e.user_id == *user_id)
            .cloned())
    }

    async fn insert_rating_entry(&self, mut entry: RatingEntryDoc) -> Result<ObjectId> {
        let mut inner = self.inner.write().await;
        if inner
            .entries
            .iter()
            .any(|e| e.answer_id == entry.answer_id && e.user_id == entry.user_id)
        {
            return Err(DeskError::Conflict("Rating entry already exists".into()));
        }
        let id = ObjectId::new();
        entry._id = Some(id);
        stamp(&mut entry.metadata);
        inner.entries.push(entry);
        Ok(id)
    }

    async fn set_entry_liked(&self, id: &ObjectId, liked: bool) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(e) = find_mut(&mut inner.entries, |e| e._id == Some(*id)) {
            e.liked = liked;
            touch(&mut e.metadata);
        }
        Ok(())
    }

    async fn set_entry_rating(&self, id: &ObjectId, rating: Rating) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(e) = find_mut(&mut inner.entries, |e| e._id == Some(*id)) {
            e.rating = Some(rating);
            touch(&mut e.metadata);
        }
        Ok(())
    }

    async fn delete_rating_entry(&self, id: &ObjectId) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.entries.len();
        inner.entries.retain(|e| e._id != Some(*id));
        Ok(inner.entries.len() != before)
    }

    async fn insert_notification(&self, mut notification: NotificationDoc) -> Result<ObjectId> {
        let mut inner = self.inner.write().await;
        let id = ObjectId::new();
        notification._id = Some(id);
        stamp(&mut notification.metadata);
        inner.notifications.push(notification);
        Ok(id)
    }

    async fn notifications_for(
        &self,
        user_id: &ObjectId,
        limit: usize,
    ) -> Result<Vec<NotificationDoc>> {
        let inner = self.inner.read().await;
        Ok(inner
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == *user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn unread_count(&self, user_id: &ObjectId) -> Result<u64> {
        let inner = self.inner.read().await;
        Ok(inner
            .notifications
            .iter()
            .filter(|n| n.user_id == *user_id && !n.read)
            .count() as u64)
    }

    async fn mark_notification_read(
        &self,
        id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<Option<NotificationDoc>> {
        let mut inner = self.inner.write().await;
        Ok(
            find_mut(&mut inner.notifications, |n| {
                n._id == Some(*id) && n.user_id == *user_id
            })
            .map(|n| {
                n.read = true;
                touch(&mut n.metadata);
                n.clone()
            }),
        )
    }

    async fn mark_all_read(&self, user_id: &ObjectId) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let mut changed = 0;
        for n in inner
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == *user_id && !n.read)
        {
            n.read = true;
            touch(&mut n.metadata);
            changed += 1;
        }
        Ok(changed)
    }

    async fn delete_notification(&self, id: &ObjectId, user_id: &ObjectId) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.notifications.len();
        inner
            .notifications
            .retain(|n| !(n._id == Some(*id) && n.user_id == *user_id));
        Ok(inner.notifications.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::{Category, NotificationKind};

    fn question(author: ObjectId, title: &str, tags: &[&str]) -> QuestionDoc {
        QuestionDoc::new(
            title.to_string(),
            "a description that is long enough to be valid".to_string(),
            Category::Subjects,
            tags.iter().map(|t| t.to_string()).collect(),
            author,
        )
    }

    #[tokio::test]
    async fn test_list_questions_filters_and_orders() {
        let store = MemoryStore::new();
        let author = ObjectId::new();
        store.insert_question(question(author, "Rust lifetimes", &["rust"])).await.unwrap();
        let second = store
            .insert_question(question(author, "Operating systems paging", &["os"]))
            .await
            .unwrap();

        let all = store
            .list_questions(&QuestionFilter {
                limit: 50,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0]._id, Some(second));

        let by_tag = store
            .list_questions(&QuestionFilter {
                tags: vec!["rust".into()],
                limit: 50,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_tag.len(), 1);
        assert_eq!(by_tag[0].title, "Rust lifetimes");

        let by_text = store
            .list_questions(&QuestionFilter {
                text: Some("PAGING".into()),
                limit: 50,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_text.len(), 1);
    }

    #[tokio::test]
    async fn test_compare_and_set_rejects_stale_mean() {
        let store = MemoryStore::new();
        let id = store
            .insert_answer(AnswerDoc::new(ObjectId::new(), ObjectId::new(), "body".into()))
            .await
            .unwrap();

        let fresh = RunningMean::new(1, 4.0);
        assert!(store
            .compare_and_set_answer_rating(&id, RunningMean::default(), fresh)
            .await
            .unwrap());
        // Same expectation again is now stale
        assert!(!store
            .compare_and_set_answer_rating(&id, RunningMean::default(), RunningMean::new(1, 2.0))
            .await
            .unwrap());

        let answer = store.find_answer(&id).await.unwrap().unwrap();
        assert_eq!(answer.rating_mean(), fresh);
    }

    #[tokio::test]
    async fn test_likes_never_negative() {
        let store = MemoryStore::new();
        let id = store
            .insert_answer(AnswerDoc::new(ObjectId::new(), ObjectId::new(), "body".into()))
            .await
            .unwrap();
        store.increment_answer_likes(&id, -1).await.unwrap();
        assert_eq!(store.find_answer(&id).await.unwrap().unwrap().likes_count, 0);
    }

    #[tokio::test]
    async fn test_duplicate_rating_entry_conflicts() {
        let store = MemoryStore::new();
        let (answer, user) = (ObjectId::new(), ObjectId::new());
        store
            .insert_rating_entry(RatingEntryDoc::new(answer, user))
            .await
            .unwrap();
        let err = store
            .insert_rating_entry(RatingEntryDoc::new(answer, user))
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_notification_ownership() {
        let store = MemoryStore::new();
        let owner = ObjectId::new();
        let stranger = ObjectId::new();
        let id = store
            .insert_notification(NotificationDoc::new(
                owner,
                NotificationKind::QuestionAnswered,
                "New answer",
                "Someone answered",
                None,
            ))
            .await
            .unwrap();

        assert!(store.mark_notification_read(&id, &stranger).await.unwrap().is_none());
        assert!(!store.delete_notification(&id, &stranger).await.unwrap());
        assert_eq!(store.unread_count(&owner).await.unwrap(), 1);

        assert!(store.mark_notification_read(&id, &owner).await.unwrap().unwrap().read);
        assert_eq!(store.unread_count(&owner).await.unwrap(), 0);
        assert!(store.delete_notification(&id, &owner).await.unwrap());
    }
}
