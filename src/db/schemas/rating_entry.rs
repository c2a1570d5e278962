//! Rating ledger entry schema
//!
//! One document per (rater, answer). Likes and ratings share the entry but
//! are independent: `liked` toggles, `rating` is upserted.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::{Identified, Metadata};
use crate::stats::Rating;

/// Collection name for ledger entries
pub const RATING_ENTRY_COLLECTION: &str = "answer_likes";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct RatingEntryDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub answer_id: ObjectId,

    /// The rater
    pub user_id: ObjectId,

    #[serde(default)]
    pub liked: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
}

impl RatingEntryDoc {
    pub fn new(answer_id: ObjectId, user_id: ObjectId) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            answer_id,
            user_id,
            liked: false,
            rating: None,
        }
    }

    /// An entry with neither a like nor a rating carries no information
    pub fn is_empty(&self) -> bool {
        !self.liked && self.rating.is_none()
    }
}

impl Identified for RatingEntryDoc {
    fn object_id(&self) -> Option<ObjectId> {
        self._id
    }
}

impl IntoIndexes for RatingEntryDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "answer_id": 1, "user_id": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("rater_answer_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for RatingEntryDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
