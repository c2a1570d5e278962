//! Answer aggregate updates

use bson::oid::ObjectId;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::db::Store;
use crate::stats::{MeanChange, Rating};
use crate::types::{DeskError, Result};

/// Applies like and rating events to an answer's stored aggregate.
///
/// Callers hold the answer's lock; the rating write is still conditional on
/// the mean read here, so a writer in another process surfaces as `Conflict`.
#[derive(Clone)]
pub struct AnswerStats {
    store: Arc<dyn Store>,
}

impl AnswerStats {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Add `+1` or `-1` to the like count, never going below zero
    pub async fn apply_like_delta(&self, answer_id: &ObjectId, delta: i64) -> Result<()> {
        if delta != 1 && delta != -1 {
            return Err(DeskError::Internal(format!(
                "like delta must be +1 or -1, got {}",
                delta
            )));
        }
        self.store.increment_answer_likes(answer_id, delta).await
    }

    /// Fold one rating event into the answer's mean and persist it
    pub async fn apply_rating_change(
        &self,
        answer_id: &ObjectId,
        old: Option<Rating>,
        new: Rating,
    ) -> Result<MeanChange> {
        let answer = self
            .store
            .find_answer(answer_id)
            .await?
            .ok_or_else(|| DeskError::not_found("Answer not found"))?;

        let current = answer.rating_mean();
        let next = current.fold(old, new);

        if !self
            .store
            .compare_and_set_answer_rating(answer_id, current, next)
            .await?
        {
            return Err(DeskError::Conflict(
                "Answer rating changed concurrently, retry".into(),
            ));
        }

        debug!(
            answer = %answer_id,
            count = next.count,
            average = next.average,
            "answer rating updated"
        );
        Ok(MeanChange {
            before: current,
            after: next,
        })
    }

    /// Put back the mean `change` replaced, if nothing has written since
    pub async fn revert_rating_change(&self, answer_id: &ObjectId, change: MeanChange) -> Result<()> {
        if self
            .store
            .compare_and_set_answer_rating(answer_id, change.after, change.before)
            .await?
        {
            return Ok(());
        }
        warn!(answer = %answer_id, "answer rating moved before it could be rolled back");
        Err(DeskError::Conflict(
            "Answer rating changed concurrently, retry".into(),
        ))
    }
}
