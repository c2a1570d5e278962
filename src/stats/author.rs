//! Author aggregate updates

use bson::oid::ObjectId;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::db::{Store, UserCounterDelta};
use crate::reputation::{ReputationLedger, ReputationReason};
use crate::stats::{MeanChange, Rating};
use crate::types::{DeskError, Result};

/// Applies reputation and rating events to a user's aggregate
#[derive(Clone)]
pub struct AuthorStats {
    store: Arc<dyn Store>,
    reputation: ReputationLedger,
}

impl AuthorStats {
    pub fn new(store: Arc<dyn Store>, reputation: ReputationLedger) -> Self {
        Self { store, reputation }
    }

    pub fn reputation(&self) -> &ReputationLedger {
        &self.reputation
    }

    /// Apply the policy delta for `reason` to `user_id`
    pub async fn apply_reputation_delta(
        &self,
        user_id: &ObjectId,
        reason: ReputationReason,
    ) -> Result<UserCounterDelta> {
        self.reputation.apply(user_id, reason).await
    }

    /// Same fold as the answer mean, over every rating the user's answers hold
    pub async fn apply_author_rating_change(
        &self,
        user_id: &ObjectId,
        old: Option<Rating>,
        new: Rating,
    ) -> Result<MeanChange> {
        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| DeskError::not_found("Author not found"))?;

        let current = user.rating_mean();
        let next = current.fold(old, new);

        if !self
            .store
            .compare_and_set_user_rating(user_id, current, next)
            .await?
        {
            return Err(DeskError::Conflict(
                "Author rating changed concurrently, retry".into(),
            ));
        }

        debug!(
            user = %user_id,
            count = next.count,
            average = next.average,
            "author rating updated"
        );
        Ok(MeanChange {
            before: current,
            after: next,
        })
    }

    /// Put back the mean `change` replaced, if nothing has written since
    pub async fn revert_author_rating_change(
        &self,
        user_id: &ObjectId,
        change: MeanChange,
    ) -> Result<()> {
        if self
            .store
            .compare_and_set_user_rating(user_id, change.after, change.before)
            .await?
        {
            return Ok(());
        }
        warn!(user = %user_id, "author rating moved before it could be rolled back");
        Err(DeskError::Conflict(
            "Author rating changed concurrently, retry".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::UserDoc;
    use crate::db::MemoryStore;
    use crate::reputation::ReputationPolicy;

    async fn setup() -> (Arc<MemoryStore>, AuthorStats, ObjectId) {
        let store = Arc::new(MemoryStore::new());
        let id = store
            .insert_user(UserDoc::new(
                "Asha".into(),
                "asha@college.edu".into(),
                "hash".into(),
            ))
            .await
            .unwrap();
        let ledger = ReputationLedger::new(store.clone(), ReputationPolicy::default());
        (store.clone(), AuthorStats::new(store, ledger), id)
    }

    #[tokio::test]
    async fn test_rerate_replaces_value() {
        let (store, stats, id) = setup().await;
        let r = |v| Rating::new(v).unwrap();

        stats.apply_author_rating_change(&id, None, r(4)).await.unwrap();
        stats.apply_author_rating_change(&id, None, r(2)).await.unwrap();
        stats
            .apply_author_rating_change(&id, Some(r(4)), r(5))
            .await
            .unwrap();

        let user = store.find_user(&id).await.unwrap().unwrap();
        assert_eq!(user.total_ratings_received, 2);
        assert!((user.average_rating - 3.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_revert_restores_previous_mean() {
        let (store, stats, id) = setup().await;
        let r = |v| Rating::new(v).unwrap();

        let change = stats.apply_author_rating_change(&id, None, r(3)).await.unwrap();
        assert_eq!(change.before.count, 0);
        stats.revert_author_rating_change(&id, change).await.unwrap();

        let user = store.find_user(&id).await.unwrap().unwrap();
        assert_eq!(user.total_ratings_received, 0);
        assert_eq!(user.average_rating, 0.0);
    }

    #[tokio::test]
    async fn test_reputation_delta_uses_policy() {
        let (store, stats, id) = setup().await;

        stats
            .apply_reputation_delta(&id, ReputationReason::AnswerAccepted)
            .await
            .unwrap();
        stats
            .apply_reputation_delta(&id, ReputationReason::AnswerLiked)
            .await
            .unwrap();

        let user = store.find_user(&id).await.unwrap().unwrap();
        assert_eq!(user.reputation_score, 17);
        assert_eq!(user.accepted_answers_count, 1);
    }
}
