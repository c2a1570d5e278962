//! Notification document schema
//!
//! Notifications are stored records only; nothing pushes them to clients.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::{Identified, Metadata};

/// Collection name for notifications
pub const NOTIFICATION_COLLECTION: &str = "notifications";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    #[default]
    QuestionAnswered,
    AnswerAccepted,
    NewFollower,
    Mention,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct NotificationDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Recipient
    pub user_id: ObjectId,

    pub kind: NotificationKind,

    pub title: String,

    pub message: String,

    #[serde(default)]
    pub read: bool,

    /// Question or answer the notification points at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

impl NotificationDoc {
    pub fn new(
        user_id: ObjectId,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        entity_id: Option<String>,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            user_id,
            kind,
            title: title.into(),
            message: message.into(),
            read: false,
            entity_id,
        }
    }
}

impl Identified for NotificationDoc {
    fn object_id(&self) -> Option<ObjectId> {
        self._id
    }
}

impl IntoIndexes for NotificationDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "user_id": 1, "metadata.created_at": -1 },
            Some(
                IndexOptions::builder()
                    .name("user_recent_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for NotificationDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
