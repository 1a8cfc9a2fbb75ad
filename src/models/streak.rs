//! Consecutive-day study streaks, keyed by calendar date.
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStreak {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_activity_date: Option<NaiveDate>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakStats {
    /// Zero once the streak has lapsed
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_activity_date: Option<NaiveDate>,
    pub is_active: bool,
}

impl UserStreak {
    /// Streak after studying on `today`. Several calls on the same day count once.
    pub fn record_activity(&self, today: NaiveDate) -> UserStreak {
        let current_streak = match self.last_activity_date {
            None => 1,
            Some(last) if last == today => self.current_streak,
            Some(last) if Some(last) == today.checked_sub_days(Days::new(1)) => {
                self.current_streak + 1
            }
            Some(_) => 1,
        };

        UserStreak {
            current_streak,
            longest_streak: self.longest_streak.max(current_streak),
            last_activity_date: Some(today),
        }
    }

    /// A streak is active if the last study day was today or yesterday.
    pub fn is_active(&self, today: NaiveDate) -> bool {
        self.last_activity_date.is_some_and(|last| {
            last == today || Some(last) == today.checked_sub_days(Days::new(1))
        })
    }

    pub fn stats(&self, today: NaiveDate) -> StreakStats {
        let is_active = self.is_active(today);
        StreakStats {
            current_streak: if is_active { self.current_streak } else { 0 },
            longest_streak: self.longest_streak,
            last_activity_date: self.last_activity_date,
            is_active,
        }
    }
}
