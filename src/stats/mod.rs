//! Derived rating and like statistics
//!
//! - `mean`: the pure running-mean fold shared by answers and authors
//! - `answer`: per-answer likes and rating mean
//! - `author`: per-user rating mean and reputation

pub mod answer;
pub mod author;
pub mod mean;

pub use answer::AnswerStats;
pub use author::AuthorStats;
pub use mean::{MeanChange, Rating, RunningMean, MAX_RATING, MIN_RATING};
