//! Question actions: ask, join the community, follow and unfollow

use bson::oid::ObjectId;
use serde::Deserialize;
use std::str::FromStr;
use tracing::info;

use super::Desk;
use crate::db::schemas::{Category, NotificationDoc, NotificationKind, QuestionDoc, UserDoc};
use crate::db::FollowChange;
use crate::reputation::ReputationReason;
use crate::types::{DeskError, Result};

const TITLE_CHARS: (usize, usize) = (10, 160);
const DESCRIPTION_CHARS: (usize, usize) = (30, 20_000);
const TAG_CHARS: (usize, usize) = (2, 24);
const MAX_TAGS: usize = 8;

/// Request body for asking a question
#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestion {
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn check_length(field: &str, value: &str, (min, max): (usize, usize)) -> Result<()> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(DeskError::validation(format!(
            "{} must be between {} and {} characters",
            field, min, max
        )));
    }
    Ok(())
}

/// Trim, lower-case and deduplicate tags, keeping first-seen order
pub fn normalize_tags(raw: &[String]) -> Result<Vec<String>> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() || tags.contains(&tag) {
            continue;
        }
        check_length("Tag", &tag, TAG_CHARS)?;
        tags.push(tag);
    }
    if tags.len() > MAX_TAGS {
        return Err(DeskError::validation(format!(
            "At most {} tags are allowed",
            MAX_TAGS
        )));
    }
    Ok(tags)
}

impl Desk {
    pub async fn ask_question(&self, actor: &ObjectId, input: NewQuestion) -> Result<ObjectId> {
        let title = input.title.trim();
        let description = input.description.trim();
        check_length("Title", title, TITLE_CHARS)?;
        check_length("Description", description, DESCRIPTION_CHARS)?;
        let category = Category::from_str(input.category.trim())?;
        let tags = normalize_tags(&input.tags)?;

        self.require_member(actor).await?;

        let question_id = self
            .store
            .insert_question(QuestionDoc::new(
                title.to_string(),
                description.to_string(),
                category,
                tags.clone(),
                *actor,
            ))
            .await?;
        self.store.bump_tags(&tags).await?;
        self.authors
            .apply_reputation_delta(actor, ReputationReason::QuestionAsked)
            .await?;

        info!(question = %question_id, author = %actor, category = %category, "question asked");
        Ok(question_id)
    }

    /// Join the community. Joining twice is harmless.
    pub async fn join_community(&self, actor: &ObjectId) -> Result<UserDoc> {
        let mut user = self.require_user(actor).await?;
        if !user.joined_community {
            self.store.set_joined_community(actor).await?;
            user.joined_community = true;
            info!(user = %actor, "joined community");
        }
        Ok(user)
    }

    pub async fn follow_question(
        &self,
        actor: &ObjectId,
        question_id: &ObjectId,
    ) -> Result<FollowChange> {
        let user = self.require_user(actor).await?;
        let question = self
            .store
            .find_question(question_id)
            .await?
            .ok_or_else(|| DeskError::not_found("Question not found"))?;

        let change = self.store.add_follower(question_id, actor).await?;

        if change.changed && question.author_id != *actor {
            self.notify(NotificationDoc::new(
                question.author_id,
                NotificationKind::NewFollower,
                "New follower",
                format!("{} is following \"{}\"", user.name, question.title),
                Some(question_id.to_hex()),
            ))
            .await;
        }

        Ok(change)
    }

    pub async fn unfollow_question(
        &self,
        actor: &ObjectId,
        question_id: &ObjectId,
    ) -> Result<FollowChange> {
        self.require_user(actor).await?;
        if self.store.find_question(question_id).await?.is_none() {
            return Err(DeskError::not_found("Question not found"));
        }
        self.store.remove_follower(question_id, actor).await
    }
}
