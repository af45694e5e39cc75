//! User-facing target duration.

use crate::error::ValidationError;

/// Target output length, chosen in whole minutes and sent in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDuration {
    minutes: u32,
}

impl TargetDuration {
    pub const MIN_MINUTES: u32 = 1;
    pub const MAX_MINUTES: u32 = 30;
    pub const DEFAULT_MINUTES: u32 = 5;

    pub fn from_minutes(minutes: u32) -> Result<Self, ValidationError> {
        if !(Self::MIN_MINUTES..=Self::MAX_MINUTES).contains(&minutes) {
            return Err(ValidationError::DurationOutOfRange {
                minutes,
                min: Self::MIN_MINUTES,
                max: Self::MAX_MINUTES,
            });
        }
        Ok(Self { minutes })
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn as_seconds(&self) -> u32 {
        self.minutes * 60
    }
}

impl Default for TargetDuration {
    fn default() -> Self {
        Self {
            minutes: Self::DEFAULT_MINUTES,
        }
    }
}
