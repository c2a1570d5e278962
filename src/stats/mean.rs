//! Incremental mean over 1–5 ratings
//!
//! A `RunningMean` is the `(count, average)` pair stored on answers and users.
//! It is never recomputed from the ledger; every rating event folds one value
//! in, either as a fresh rating or as a replacement for the rater's old one.
//!
//! The fold takes the count as it was *before* the event, so a fresh rating
//! weighs the old average by `count` and divides by `count + 1`.

use serde::{Deserialize, Serialize};

use crate::types::DeskError;

/// Lowest accepted rating
pub const MIN_RATING: i32 = 1;
/// Highest accepted rating
pub const MAX_RATING: i32 = 5;

/// A validated rating value in `[1, 5]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Rating(i32);

impl Rating {
    pub fn new(value: i32) -> Result<Self, DeskError> {
        if (MIN_RATING..=MAX_RATING).contains(&value) {
            Ok(Self(value))
        } else {
            Err(DeskError::validation(format!(
                "Rating must be between {} and {}",
                MIN_RATING, MAX_RATING
            )))
        }
    }

    /// Parse a rating from a JSON number. `4` and `4.0` are both accepted;
    /// fractional values, strings and non-finite numbers are not.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, DeskError> {
        let number = value
            .as_f64()
            .filter(|n| n.is_finite() && n.fract() == 0.0)
            .ok_or_else(|| {
                DeskError::validation("Rating must be a whole number between 1 and 5")
            })?;
        if number < f64::from(MIN_RATING) || number > f64::from(MAX_RATING) {
            return Err(DeskError::validation(format!(
                "Rating must be between {} and {}",
                MIN_RATING, MAX_RATING
            )));
        }
        Self::new(number as i32)
    }

    pub fn value(self) -> i32 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0)
    }
}

impl TryFrom<i32> for Rating {
    type Error = DeskError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for i32 {
    fn from(r: Rating) -> Self {
        r.0
    }
}

/// Count and average of the ratings currently recorded for one entity
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RunningMean {
    pub count: i64,
    pub average: f64,
}

/// A mean as read before a write and as written, so the write can be undone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanChange {
    pub before: RunningMean,
    pub after: RunningMean,
}

impl RunningMean {
    pub fn new(count: i64, average: f64) -> Self {
        Self { count, average }
    }

    /// Sum of the recorded values implied by this mean
    pub fn sum(&self) -> f64 {
        self.average * self.count as f64
    }

    /// Fold one rating event into the mean.
    ///
    /// `previous` is the rater's prior rating for the same target, if any.
    /// With no prior rating the count grows by one; a re-rating swaps the old
    /// value for the new one and leaves the count alone. A re-rating against
    /// an empty mean is treated as a fresh rating, since there is nothing to
    /// back out.
    pub fn fold(self, previous: Option<Rating>, next: Rating) -> Self {
        match previous {
            Some(old) if self.count > 0 => {
                let sum = self.sum() - old.as_f64() + next.as_f64();
                Self {
                    count: self.count,
                    average: sum / self.count as f64,
                }
            }
            _ => {
                let count = self.count + 1;
                let sum = self.sum() + next.as_f64();
                Self {
                    count,
                    average: sum / count as f64,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(v: i32) -> Rating {
        Rating::new(v).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_rating_bounds() {
        assert!(Rating::new(0).is_err());
        assert!(Rating::new(6).is_err());
        for v in 1..=5 {
            assert_eq!(Rating::new(v).unwrap().value(), v);
        }
    }

    #[test]
    fn test_rating_from_json() {
        assert_eq!(Rating::from_json(&serde_json::json!(4)).unwrap().value(), 4);
        assert_eq!(Rating::from_json(&serde_json::json!(4.0)).unwrap().value(), 4);
        assert_eq!(Rating::from_json(&serde_json::json!(1.0)).unwrap().value(), 1);
        assert!(Rating::from_json(&serde_json::json!(4.5)).is_err());
        assert!(Rating::from_json(&serde_json::json!(5.0000001)).is_err());
        assert!(Rating::from_json(&serde_json::json!(6.0)).is_err());
        assert!(Rating::from_json(&serde_json::json!("4")).is_err());
        assert!(Rating::from_json(&serde_json::json!(-1)).is_err());
        assert!(Rating::from_json(&serde_json::json!(i64::MAX)).is_err());
    }

    #[test]
    fn test_documented_scenario() {
        let mean = RunningMean::default();

        // A rates 4
        let mean = mean.fold(None, r(4));
        assert_eq!(mean.count, 1);
        assert!(close(mean.average, 4.0));

        // B rates 2
        let mean = mean.fold(None, r(2));
        assert_eq!(mean.count, 2);
        assert!(close(mean.average, 3.0));

        // A re-rates to 5
        let mean = mean.fold(Some(r(4)), r(5));
        assert_eq!(mean.count, 2);
        assert!(close(mean.average, 3.5));
    }

    #[test]
    fn test_sum_tracks_recorded_values() {
        // Distinct raters, every value 1..=5 cycling, with periodic re-rates
        let mut recorded: Vec<i32> = Vec::new();
        let mut mean = RunningMean::default();

        for i in 0..200 {
            let value = (i * 7 % 5) + 1;
            if i % 3 == 2 {
                let slot = i as usize % recorded.len();
                let old = recorded[slot];
                recorded[slot] = value;
                mean = mean.fold(Some(r(old)), r(value));
            } else {
                recorded.push(value);
                mean = mean.fold(None, r(value));
            }

            let expected: i32 = recorded.iter().sum();
            assert_eq!(mean.count, recorded.len() as i64);
            assert!(
                (mean.sum() - expected as f64).abs() < 1e-6,
                "step {}: {} vs {}",
                i,
                mean.sum(),
                expected
            );
        }
    }

    #[test]
    fn test_rerate_keeps_count() {
        let mean = RunningMean::new(3, 2.0).fold(Some(r(1)), r(4));
        assert_eq!(mean.count, 3);
        assert!(close(mean.average, 3.0));
    }

    #[test]
    fn test_rerate_on_empty_mean_counts_as_new() {
        let mean = RunningMean::default().fold(Some(r(3)), r(5));
        assert_eq!(mean.count, 1);
        assert!(close(mean.average, 5.0));
    }

    #[test]
    fn test_rating_serde() {
        let json = serde_json::to_string(&r(3)).unwrap();
        assert_eq!(json, "3");
        assert!(serde_json::from_str::<Rating>("9").is_err());
    }
}
