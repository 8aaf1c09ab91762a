//! Post-execution outcome feedback.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::ids::RequestId;
use crate::time::Timestamp;

/// A 1..=5 rating of how the executed command worked out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    /// Create a rating, rejecting values outside 1..=5.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRating`] for out-of-range values.
    pub fn new(value: u8) -> Result<Self, CoreError> {
        if (1..=5).contains(&value) {
            Ok(Self(value))
        } else {
            Err(CoreError::InvalidRating(value))
        }
    }

    /// The raw value.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/5", self.0)
    }
}

/// Feedback recorded after a request executed. One per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// The executed request this feedback is about.
    pub request_id: RequestId,
    /// Whether the command caused problems.
    pub caused_problems: bool,
    /// What went wrong, when something did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_description: Option<String>,
    /// Overall rating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// When the feedback was recorded.
    pub recorded_at: Timestamp,
}
