use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How much of a deck a user has worked through.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeckProgress {
    pub user_id: i64,
    pub deck_id: i64,
    /// Distinct cards answered at least once, as a percentage of the deck (capped at 100)
    pub percent_complete: f64,
    pub last_studied_at: Option<DateTime<Utc>>,
}

pub fn percent_complete(answered_cards: usize, total_cards: usize) -> f64 {
    if total_cards == 0 {
        return 0.0;
    }
    (answered_cards as f64 / total_cards as f64 * 100.0).min(100.0)
}

/// A card a user has set aside for focused study.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlaggedCard {
    pub id: i64,
    pub user_id: i64,
    pub card_id: i64,
    pub deck_id: i64,
    pub flagged_at: DateTime<Utc>,
}
