//! Shared types for doubtdesk

pub mod error;

pub use error::{DeskError, Result};
