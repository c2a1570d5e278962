//! User document schema
//!
//! Stores credentials, profile, and the author aggregate: reputation plus
//! the running mean of every rating the user's answers have received.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::{Identified, Metadata};
use crate::stats::RunningMean;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct UserDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub name: String,

    /// Login identifier, stored lower-cased
    pub email: String,

    /// Argon2 password hash
    pub password_hash: String,

    #[serde(default)]
    pub department: String,

    #[serde(default)]
    pub year: i32,

    #[serde(default)]
    pub skills: Vec<String>,

    /// Posting, answering and liking require membership
    #[serde(default)]
    pub joined_community: bool,

    #[serde(default)]
    pub reputation_score: i64,

    #[serde(default)]
    pub contribution_count: i64,

    #[serde(default)]
    pub accepted_answers_count: i64,

    #[serde(default)]
    pub total_ratings_received: i64,

    #[serde(default)]
    pub average_rating: f64,
}

impl UserDoc {
    /// Create a new user document with zeroed statistics
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            name,
            email,
            password_hash,
            ..Default::default()
        }
    }

    /// Ratings received across all of this user's answers
    pub fn rating_mean(&self) -> RunningMean {
        RunningMean::new(self.total_ratings_received, self.average_rating)
    }
}

impl Identified for UserDoc {
    fn object_id(&self) -> Option<ObjectId> {
        self._id
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("email_unique".to_string())
                        .build(),
                ),
            ),
            // Leaderboard ordering
            (
                doc! { "reputation_score": -1, "accepted_answers_count": -1 },
                Some(
                    IndexOptions::builder()
                        .name("leaderboard_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
