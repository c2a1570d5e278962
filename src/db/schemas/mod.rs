//! Database schemas for doubtdesk
//!
//! Defines MongoDB document structures for users, questions, answers, the
//! rating ledger, tags, and notifications.

mod answer;
mod metadata;
mod notification;
mod question;
mod rating_entry;
mod tag;
mod user;

use bson::oid::ObjectId;

use crate::types::DeskError;

pub use answer::{AnswerDoc, ANSWER_COLLECTION};
pub use metadata::Metadata;
pub use notification::{NotificationDoc, NotificationKind, NOTIFICATION_COLLECTION};
pub use question::{Category, QuestionDoc, QUESTION_COLLECTION};
pub use rating_entry::{RatingEntryDoc, RATING_ENTRY_COLLECTION};
pub use tag::{TagDoc, TAG_COLLECTION};
pub use user::{UserDoc, USER_COLLECTION};

/// Documents read back from a store always carry their `_id`
pub trait Identified {
    fn object_id(&self) -> Option<ObjectId>;

    fn id(&self) -> Result<ObjectId, DeskError> {
        self.object_id()
            .ok_or_else(|| DeskError::Internal("document has no _id".into()))
    }
}
