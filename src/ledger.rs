//! Rating ledger
//!
//! One entry per (rater, answer), holding a like flag and an optional
//! rating. The ledger only records what each rater has done; the aggregates
//! on answers and users are maintained separately by `stats`.

use bson::oid::ObjectId;
use std::sync::Arc;

use crate::db::schemas::{AnswerDoc, Identified, RatingEntryDoc};
use crate::db::Store;
use crate::stats::Rating;
use crate::types::{DeskError, Result};

/// Outcome of recording a like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeUpsert {
    /// False when the rater had already liked the answer
    pub created: bool,
}

/// Outcome of clearing a like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeRemoval {
    /// False when there was no like to clear
    pub removed: bool,
}

/// Outcome of recording a rating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingUpsert {
    pub is_new: bool,
    /// The rater's value before this call, for backing it out of the mean
    pub previous: Option<Rating>,
}

#[derive(Clone)]
pub struct RatingLedger {
    store: Arc<dyn Store>,
}

impl RatingLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn entry(
        &self,
        rater: &ObjectId,
        answer_id: &ObjectId,
    ) -> Result<Option<RatingEntryDoc>> {
        self.store.find_rating_entry(answer_id, rater).await
    }

    pub async fn is_liked(&self, rater: &ObjectId, answer_id: &ObjectId) -> Result<bool> {
        Ok(self
            .entry(rater, answer_id)
            .await?
            .map(|e| e.liked)
            .unwrap_or(false))
    }

    pub async fn current_rating(
        &self,
        rater: &ObjectId,
        answer_id: &ObjectId,
    ) -> Result<Option<Rating>> {
        Ok(self.entry(rater, answer_id).await?.and_then(|e| e.rating))
    }

    pub async fn upsert_like(&self, rater: &ObjectId, answer_id: &ObjectId) -> Result<LikeUpsert> {
        match self.entry(rater, answer_id).await? {
            Some(entry) if entry.liked => Ok(LikeUpsert { created: false }),
            Some(entry) => {
                self.store.set_entry_liked(&entry.id()?, true).await?;
                Ok(LikeUpsert { created: true })
            }
            None => {
                let mut entry = RatingEntryDoc::new(*answer_id, *rater);
                entry.liked = true;
                self.store.insert_rating_entry(entry).await?;
                Ok(LikeUpsert { created: true })
            }
        }
    }

    /// Clear the like flag, dropping the entry if it holds no rating either
    pub async fn remove_like(&self, rater: &ObjectId, answer_id: &ObjectId) -> Result<LikeRemoval> {
        let entry = match self.entry(rater, answer_id).await? {
            Some(entry) if entry.liked => entry,
            _ => return Ok(LikeRemoval { removed: false }),
        };

        let id = entry.id()?;
        if entry.rating.is_some() {
            self.store.set_entry_liked(&id, false).await?;
        } else {
            self.store.delete_rating_entry(&id).await?;
        }
        Ok(LikeRemoval { removed: true })
    }

    /// Record `rating` for `answer`, replacing any earlier value from `rater`
    pub async fn upsert_rating(
        &self,
        rater: &ObjectId,
        answer: &AnswerDoc,
        rating: Rating,
    ) -> Result<RatingUpsert> {
        if answer.author_id == *rater {
            return Err(DeskError::forbidden("You cannot rate your own answer"));
        }
        let answer_id = answer.id()?;

        match self.entry(rater, &answer_id).await? {
            Some(entry) => {
                self.store.set_entry_rating(&entry.id()?, rating).await?;
                Ok(RatingUpsert {
                    is_new: entry.rating.is_none(),
                    previous: entry.rating,
                })
            }
            None => {
                let mut entry = RatingEntryDoc::new(answer_id, *rater);
                entry.rating = Some(rating);
                self.store.insert_rating_entry(entry).await?;
                Ok(RatingUpsert {
                    is_new: true,
                    previous: None,
                })
            }
        }
    }
}
