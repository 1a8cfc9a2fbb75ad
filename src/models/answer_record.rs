use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One answered card within a session. Append-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub id: i64,
    pub session_id: i64,
    pub card_id: i64,
    /// Raw text; cloze answers are a JSON list of per-blank answers
    pub user_answer: Option<String>,
    /// `None` for self-assessed (basic) cards
    pub is_correct: Option<bool>,
    /// Only recorded in review mode
    pub quality: Option<u8>,
    pub answered_at: DateTime<Utc>,
}

/// An answer as submitted by the caller.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerSubmission {
    pub card_id: i64,
    #[serde(default)]
    pub user_answer: Option<String>,
    /// Explicit 0-5 rating; preferred over the derived quality when present
    #[serde(default)]
    pub quality: Option<i32>,
    /// Whether the user revealed the answer of a basic card
    #[serde(default)]
    pub revealed: bool,
}

impl AnswerSubmission {
    pub fn new(card_id: i64, user_answer: impl Into<String>) -> Self {
        Self {
            card_id,
            user_answer: Some(user_answer.into()),
            ..Default::default()
        }
    }

    pub fn with_quality(mut self, quality: i32) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn revealed(mut self) -> Self {
        self.revealed = true;
        self
    }

    /// Quality fed to the scheduler in review mode. An explicit rating wins; otherwise
    /// graded answers map correct → 5, incorrect → 2 and self-assessed cards map
    /// revealed → 3, not revealed → 1.
    pub fn derived_quality(&self, is_correct: Option<bool>) -> i32 {
        if let Some(quality) = self.quality {
            return quality;
        }
        match is_correct {
            Some(true) => 5,
            Some(false) => 2,
            None if self.revealed => 3,
            None => 1,
        }
    }
}
