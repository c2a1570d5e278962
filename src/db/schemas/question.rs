//! Question document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::{Identified, Metadata};
use crate::types::DeskError;

/// Collection name for questions
pub const QUESTION_COLLECTION: &str = "questions";

/// Question categories offered by the community
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Category {
    #[default]
    Subjects,
    Placements,
    Exams,
    Labs,
    Projects,
    #[serde(rename = "NSS / Activities")]
    NssActivities,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Subjects,
        Category::Placements,
        Category::Exams,
        Category::Labs,
        Category::Projects,
        Category::NssActivities,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Subjects => "Subjects",
            Category::Placements => "Placements",
            Category::Exams => "Exams",
            Category::Labs => "Labs",
            Category::Projects => "Projects",
            Category::NssActivities => "NSS / Activities",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| DeskError::validation(format!("Unknown category: {}", s)))
    }
}

/// Question document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct QuestionDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub title: String,

    pub description: String,

    pub category: Category,

    /// Lower-cased, deduplicated
    #[serde(default)]
    pub tags: Vec<String>,

    pub author_id: ObjectId,

    #[serde(default)]
    pub answers_count: i64,

    #[serde(default)]
    pub likes_count: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_answer_id: Option<ObjectId>,

    #[serde(default)]
    pub followers: Vec<ObjectId>,

    #[serde(default)]
    pub follower_count: i64,
}

impl QuestionDoc {
    pub fn new(
        title: String,
        description: String,
        category: Category,
        tags: Vec<String>,
        author_id: ObjectId,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            title,
            description,
            category,
            tags,
            author_id,
            ..Default::default()
        }
    }

    /// First `max_chars` characters of the description
    pub fn description_preview(&self, max_chars: usize) -> String {
        self.description.chars().take(max_chars).collect()
    }

    pub fn is_followed_by(&self, user_id: &ObjectId) -> bool {
        self.followers.contains(user_id)
    }
}

impl Identified for QuestionDoc {
    fn object_id(&self) -> Option<ObjectId> {
        self._id
    }
}

impl IntoIndexes for QuestionDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "metadata.created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("created_at_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "tags": 1 },
                Some(IndexOptions::builder().name("tags_index".to_string()).build()),
            ),
            (
                doc! { "followers": 1 },
                Some(
                    IndexOptions::builder()
                        .name("followers_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for QuestionDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip_names() {
        for c in Category::ALL {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), c);
        }
        assert!("Sports".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_serde_uses_display_name() {
        let json = serde_json::to_string(&Category::NssActivities).unwrap();
        assert_eq!(json, "\"NSS / Activities\"");
    }

    #[test]
    fn test_description_preview_is_char_safe() {
        let q = QuestionDoc {
            description: "é".repeat(200),
            ..Default::default()
        };
        assert_eq!(q.description_preview(160).chars().count(), 160);
    }
}
