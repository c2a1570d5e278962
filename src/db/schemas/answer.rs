//! Answer document schema
//!
//! Carries the answer aggregate: like count and the running mean of ratings.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::{Identified, Metadata};
use crate::stats::RunningMean;

/// Collection name for answers
pub const ANSWER_COLLECTION: &str = "answers";

/// Answer document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AnswerDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub question_id: ObjectId,

    pub author_id: ObjectId,

    pub body: String,

    #[serde(default)]
    pub is_accepted: bool,

    #[serde(default)]
    pub likes_count: i64,

    #[serde(default)]
    pub total_ratings: i64,

    #[serde(default)]
    pub average_rating: f64,
}

impl AnswerDoc {
    pub fn new(question_id: ObjectId, author_id: ObjectId, body: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            question_id,
            author_id,
            body,
            ..Default::default()
        }
    }

    pub fn rating_mean(&self) -> RunningMean {
        RunningMean::new(self.total_ratings, self.average_rating)
    }
}

impl Identified for AnswerDoc {
    fn object_id(&self) -> Option<ObjectId> {
        self._id
    }
}

impl IntoIndexes for AnswerDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "question_id": 1, "is_accepted": -1, "metadata.created_at": 1 },
            Some(
                IndexOptions::builder()
                    .name("question_answers_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for AnswerDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
