//! Reputation policy and ledger
//!
//! Every reputation change goes through [`ReputationLedger::apply_delta`],
//! which performs one atomic increment and emits a structured event on the
//! `doubtdesk::reputation` target. Filtering on that target gives an audit
//! trail of who gained or lost points and why.

use bson::oid::ObjectId;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::config::Args;
use crate::db::{Store, UserCounterDelta};
use crate::types::Result;

/// Points awarded per event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReputationPolicy {
    pub new_answer: i64,
    pub accepted: i64,
    pub like: i64,
    pub new_question: i64,
}

impl Default for ReputationPolicy {
    fn default() -> Self {
        Self {
            new_answer: 5,
            accepted: 15,
            like: 2,
            new_question: 2,
        }
    }
}

impl ReputationPolicy {
    pub fn from_args(args: &Args) -> Self {
        Self {
            new_answer: args.rep_new_answer,
            accepted: args.rep_accepted,
            like: args.rep_like,
            new_question: args.rep_new_question,
        }
    }

    /// Counter changes for one event
    pub fn delta(&self, reason: ReputationReason) -> UserCounterDelta {
        match reason {
            ReputationReason::AnswerPosted => UserCounterDelta {
                reputation: self.new_answer,
                contributions: 1,
                accepted_answers: 0,
            },
            ReputationReason::QuestionAsked => UserCounterDelta {
                reputation: self.new_question,
                contributions: 1,
                accepted_answers: 0,
            },
            ReputationReason::AnswerAccepted => UserCounterDelta {
                reputation: self.accepted,
                contributions: 0,
                accepted_answers: 1,
            },
            ReputationReason::AcceptanceRevoked => UserCounterDelta {
                reputation: -self.accepted,
                contributions: 0,
                accepted_answers: -1,
            },
            ReputationReason::AnswerLiked => UserCounterDelta::reputation(self.like),
            ReputationReason::AnswerUnliked => UserCounterDelta::reputation(-self.like),
        }
    }
}

/// Why a user's counters changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReputationReason {
    AnswerPosted,
    QuestionAsked,
    AnswerAccepted,
    AcceptanceRevoked,
    AnswerLiked,
    AnswerUnliked,
}

impl ReputationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnswerPosted => "answer_posted",
            Self::QuestionAsked => "question_asked",
            Self::AnswerAccepted => "answer_accepted",
            Self::AcceptanceRevoked => "acceptance_revoked",
            Self::AnswerLiked => "answer_liked",
            Self::AnswerUnliked => "answer_unliked",
        }
    }
}

impl fmt::Display for ReputationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct ReputationLedger {
    store: Arc<dyn Store>,
    policy: ReputationPolicy,
}

impl ReputationLedger {
    pub fn new(store: Arc<dyn Store>, policy: ReputationPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &ReputationPolicy {
        &self.policy
    }

    /// Apply the policy's delta for `reason`
    pub async fn apply(&self, user_id: &ObjectId, reason: ReputationReason) -> Result<UserCounterDelta> {
        let delta = self.policy.delta(reason);
        self.apply_delta(user_id, delta, reason).await?;
        Ok(delta)
    }

    pub async fn apply_delta(
        &self,
        user_id: &ObjectId,
        delta: UserCounterDelta,
        reason: ReputationReason,
    ) -> Result<()> {
        self.store.increment_user(user_id, delta).await?;

        info!(
            target: "doubtdesk::reputation",
            user = %user_id,
            reason = %reason,
            reputation = delta.reputation,
            contributions = delta.contributions,
            accepted_answers = delta.accepted_answers,
            "reputation changed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = ReputationPolicy::default();
        assert_eq!(policy.delta(ReputationReason::AnswerPosted).reputation, 5);
        assert_eq!(policy.delta(ReputationReason::AnswerPosted).contributions, 1);
        assert_eq!(policy.delta(ReputationReason::AnswerAccepted).reputation, 15);
        assert_eq!(policy.delta(ReputationReason::QuestionAsked).reputation, 2);
    }

    #[test]
    fn test_paired_reasons_cancel() {
        let policy = ReputationPolicy::default();
        let pairs = [
            (ReputationReason::AnswerAccepted, ReputationReason::AcceptanceRevoked),
            (ReputationReason::AnswerLiked, ReputationReason::AnswerUnliked),
        ];
        for (up, down) in pairs {
            let a = policy.delta(up);
            let b = policy.delta(down);
            assert_eq!(a.reputation + b.reputation, 0);
            assert_eq!(a.accepted_answers + b.accepted_answers, 0);
        }
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(ReputationReason::AnswerUnliked.to_string(), "answer_unliked");
    }
}
