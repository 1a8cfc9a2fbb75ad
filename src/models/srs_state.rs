use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_EASINESS: f64 = 2.5;

/// Scheduling state of one card for one user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SrsState {
    pub user_id: i64,
    pub card_id: i64,
    pub repetitions: u32,
    pub interval_days: u32,
    pub easiness: f64,
    pub due_at: DateTime<Utc>,
    pub last_quality: Option<u8>,
}

impl SrsState {
    pub fn new(user_id: i64, card_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            card_id,
            repetitions: 0,
            interval_days: 1,
            easiness: DEFAULT_EASINESS,
            due_at: now,
            last_quality: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at <= now
    }
}

/// Summary row for the "due reviews" listing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DueReviewCard {
    pub card_id: i64,
    pub deck_id: i64,
    pub due_at: DateTime<Utc>,
    pub repetitions: u32,
    pub interval_days: u32,
    pub easiness: f64,
}
