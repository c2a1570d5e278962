//! Answer actions: submit, accept, like, rate

use bson::oid::ObjectId;
use serde::Serialize;
use tracing::{error, info};

use super::Desk;
use crate::db::schemas::{AnswerDoc, Identified, NotificationDoc, NotificationKind};
use crate::reputation::ReputationReason;
use crate::stats::{MeanChange, Rating, RunningMean};
use crate::types::{DeskError, Result};

pub const ANSWER_MIN_CHARS: usize = 10;
pub const ANSWER_MAX_CHARS: usize = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptOutcome {
    /// False when the answer was already the accepted one
    pub changed: bool,
    /// Answer that lost its accepted flag, if acceptance moved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<ObjectId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateOutcome {
    pub is_new: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<Rating>,
    pub answer: RunningMean,
    pub author: RunningMean,
}

impl Desk {
    async fn answer_in_question(
        &self,
        question_id: &ObjectId,
        answer_id: &ObjectId,
    ) -> Result<AnswerDoc> {
        self.store
            .find_answer(answer_id)
            .await?
            .filter(|a| a.question_id == *question_id)
            .ok_or_else(|| DeskError::not_found("Answer not found for this question"))
    }

    /// Post an answer. The author gains reputation and a contribution, and
    /// the question's author is notified.
    pub async fn submit_answer(
        &self,
        actor: &ObjectId,
        question_id: &ObjectId,
        body: &str,
    ) -> Result<ObjectId> {
        let body = body.trim();
        let len = body.chars().count();
        if !(ANSWER_MIN_CHARS..=ANSWER_MAX_CHARS).contains(&len) {
            return Err(DeskError::validation(format!(
                "Answer must be between {} and {} characters",
                ANSWER_MIN_CHARS, ANSWER_MAX_CHARS
            )));
        }

        let question = self
            .store
            .find_question(question_id)
            .await?
            .ok_or_else(|| DeskError::not_found("Question not found"))?;
        let user = self.require_member(actor).await?;

        let answer_id = self
            .store
            .insert_answer(AnswerDoc::new(*question_id, *actor, body.to_string()))
            .await?;
        self.store.increment_answers_count(question_id).await?;
        self.authors
            .apply_reputation_delta(actor, ReputationReason::AnswerPosted)
            .await?;

        info!(question = %question_id, answer = %answer_id, author = %actor, "answer posted");

        if question.author_id != *actor {
            self.notify(NotificationDoc::new(
                question.author_id,
                NotificationKind::QuestionAnswered,
                "New answer on your question",
                format!("{} answered \"{}\"", user.name, question.title),
                Some(question_id.to_hex()),
            ))
            .await;
        }

        Ok(answer_id)
    }

    /// Mark an answer as the accepted one. Moving acceptance from another
    /// answer takes the accepted bonus back from that answer's author.
    pub async fn accept_answer(
        &self,
        actor: &ObjectId,
        question_id: &ObjectId,
        answer_id: &ObjectId,
    ) -> Result<AcceptOutcome> {
        let _question_guard = self.question_locks.lock(question_id).await;

        let question = self
            .store
            .find_question(question_id)
            .await?
            .ok_or_else(|| DeskError::not_found("Question not found"))?;
        if question.author_id != *actor {
            return Err(DeskError::forbidden(
                "Only the question author can accept an answer",
            ));
        }
        let answer = self.answer_in_question(question_id, answer_id).await?;

        if answer.is_accepted {
            return Ok(AcceptOutcome {
                changed: false,
                previous: None,
            });
        }

        let previous = match question.accepted_answer_id {
            Some(prev) if prev != *answer_id => self
                .store
                .find_answer(&prev)
                .await?
                .filter(|a| a.is_accepted),
            _ => None,
        };

        let previous_id = match previous {
            Some(prev) => {
                let prev_id = prev.id()?;
                let _prev_guard = self.answer_locks.lock(&prev_id).await;
                self.store.set_answer_accepted(&prev_id, false).await?;
                self.authors
                    .apply_reputation_delta(&prev.author_id, ReputationReason::AcceptanceRevoked)
                    .await?;
                Some(prev_id)
            }
            None => None,
        };

        {
            let _answer_guard = self.answer_locks.lock(answer_id).await;
            self.store.set_answer_accepted(answer_id, true).await?;
            self.store
                .set_accepted_answer(question_id, answer_id)
                .await?;
            self.authors
                .apply_reputation_delta(&answer.author_id, ReputationReason::AnswerAccepted)
                .await?;
        }

        info!(
            question = %question_id,
            answer = %answer_id,
            previous = ?previous_id.map(|id| id.to_hex()),
            "answer accepted"
        );

        if answer.author_id != *actor {
            self.notify(NotificationDoc::new(
                answer.author_id,
                NotificationKind::AnswerAccepted,
                "Your answer was accepted",
                format!("Your answer to \"{}\" was accepted", question.title),
                Some(question_id.to_hex()),
            ))
            .await;
        }

        Ok(AcceptOutcome {
            changed: true,
            previous: previous_id,
        })
    }

    /// Like the answer, or remove the like if already present. Returns the
    /// new like state.
    pub async fn toggle_like(
        &self,
        actor: &ObjectId,
        question_id: &ObjectId,
        answer_id: &ObjectId,
    ) -> Result<bool> {
        let answer = self.answer_in_question(question_id, answer_id).await?;
        self.require_member(actor).await?;

        let _guard = self.answer_locks.lock(answer_id).await;

        if self.ledger.is_liked(actor, answer_id).await? {
            self.ledger.remove_like(actor, answer_id).await?;
            self.answers.apply_like_delta(answer_id, -1).await?;
            self.authors
                .apply_reputation_delta(&answer.author_id, ReputationReason::AnswerUnliked)
                .await?;
            Ok(false)
        } else {
            self.ledger.upsert_like(actor, answer_id).await?;
            self.answers.apply_like_delta(answer_id, 1).await?;
            self.authors
                .apply_reputation_delta(&answer.author_id, ReputationReason::AnswerLiked)
                .await?;
            Ok(true)
        }
    }

    /// Rate an answer 1 to 5. A second rating from the same user replaces
    /// the first in both the answer's and the author's mean.
    ///
    /// Both means are written before the ledger entry. If a later write
    /// fails, the earlier mean writes are rolled back, so a resubmitted
    /// rating folds against the same prior value as the first attempt.
    pub async fn rate_answer(
        &self,
        actor: &ObjectId,
        question_id: &ObjectId,
        answer_id: &ObjectId,
        rating: Rating,
    ) -> Result<RateOutcome> {
        self.require_user(actor).await?;
        let answer = self.answer_in_question(question_id, answer_id).await?;
        if answer.author_id == *actor {
            return Err(DeskError::forbidden("You cannot rate your own answer"));
        }

        let _answer_guard = self.answer_locks.lock(answer_id).await;

        let previous = self.ledger.current_rating(actor, answer_id).await?;
        let answer_change = self
            .answers
            .apply_rating_change(answer_id, previous, rating)
            .await?;

        let _author_guard = self.author_locks.lock(&answer.author_id).await;
        let author_change = match self
            .authors
            .apply_author_rating_change(&answer.author_id, previous, rating)
            .await
        {
            Ok(change) => change,
            Err(e) => {
                self.roll_back_answer_rating(answer_id, answer_change).await;
                return Err(e);
            }
        };

        let upsert = match self.ledger.upsert_rating(actor, &answer, rating).await {
            Ok(upsert) => upsert,
            Err(e) => {
                if let Err(undo) = self
                    .authors
                    .revert_author_rating_change(&answer.author_id, author_change)
                    .await
                {
                    error!(author = %answer.author_id, "rating rollback failed: {}", undo);
                }
                self.roll_back_answer_rating(answer_id, answer_change).await;
                return Err(e);
            }
        };

        info!(
            answer = %answer_id,
            rater = %actor,
            rating = rating.value(),
            is_new = upsert.is_new,
            "answer rated"
        );

        Ok(RateOutcome {
            is_new: upsert.is_new,
            previous: upsert.previous,
            answer: answer_change.after,
            author: author_change.after,
        })
    }

    async fn roll_back_answer_rating(&self, answer_id: &ObjectId, change: MeanChange) {
        if let Err(undo) = self.answers.revert_rating_change(answer_id, change).await {
            error!(answer = %answer_id, "rating rollback failed: {}", undo);
        }
    }
}
