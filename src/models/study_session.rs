//! Study session state: mode, ordered card sequence and position within it.
//!
//! A session is created `active` and becomes `completed` exactly once, either when
//! its sequence runs out or when it is finished explicitly. Endless practice
//! sessions reshuffle and restart instead of running out.

use super::SrsState;
use crate::error::{Result, StudyError};
use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Due cards only; answers feed the SM-2 scheduler
    Review,
    Practice,
    Exam,
    /// The user's flagged cards in the deck
    Flagged,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Review => "review",
            Self::Practice => "practice",
            Self::Exam => "exam",
            Self::Flagged => "flagged",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "review" => Ok(Self::Review),
            "practice" => Ok(Self::Practice),
            "exam" => Ok(Self::Exam),
            "flagged" => Ok(Self::Flagged),
            other => Err(StudyError::InvalidInput(format!(
                "unknown session mode '{}'",
                other
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            other => Err(StudyError::InvalidInput(format!(
                "unknown session status '{}'",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub card_limit: Option<usize>,
    #[serde(default)]
    pub shuffle: bool,
    /// Seconds from `started_at`
    #[serde(default)]
    pub time_limit: Option<u64>,
    #[serde(default)]
    pub endless: bool,
}

impl SessionConfig {
    /// Rejects a time limit whose deadline lies past the representable range.
    pub fn validate(&self, started_at: DateTime<Utc>) -> Result<()> {
        match self.time_limit {
            Some(seconds) if deadline_after(started_at, seconds).is_none() => {
                Err(StudyError::InvalidInput(format!(
                    "time limit of {} seconds is out of range",
                    seconds
                )))
            }
            _ => Ok(()),
        }
    }
}

fn deadline_after(started_at: DateTime<Utc>, seconds: u64) -> Option<DateTime<Utc>> {
    let limit = Duration::try_seconds(i64::try_from(seconds).ok()?)?;
    started_at.checked_add_signed(limit)
}

/// What happened to the position after an answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advance {
    Next,
    /// Endless practice wrapped around to a reshuffled sequence
    Restarted,
    Exhausted,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StudySession {
    pub id: i64,
    pub user_id: i64,
    pub deck_id: i64,
    pub mode: SessionMode,
    pub status: SessionStatus,
    pub config: Option<SessionConfig>,
    pub card_sequence: Vec<i64>,
    pub position: usize,
    /// Number of completed passes over the sequence (endless practice only)
    pub cycle: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl StudySession {
    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    pub fn current_card_id(&self) -> Option<i64> {
        if self.is_completed() {
            return None;
        }
        self.card_sequence.get(self.position).copied()
    }

    pub fn is_endless(&self) -> bool {
        self.mode == SessionMode::Practice && self.config.as_ref().is_some_and(|c| c.endless)
    }

    /// `None` without a time limit, or when the limit reaches past the representable range.
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        let seconds = self.config.as_ref()?.time_limit?;
        deadline_after(self.started_at, seconds)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    /// Moves past the current card. Does not change `status`; the caller completes
    /// the session when `Advance::Exhausted` is returned.
    pub fn advance(&mut self) -> Advance {
        if self.position + 1 < self.card_sequence.len() {
            self.position += 1;
            return Advance::Next;
        }

        if self.is_endless() && !self.card_sequence.is_empty() {
            self.card_sequence.shuffle(&mut rand::thread_rng());
            self.position = 0;
            self.cycle += 1;
            return Advance::Restarted;
        }

        self.position = self.card_sequence.len();
        Advance::Exhausted
    }

    /// Marks the session completed. Fails if it already was.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.is_completed() {
            return Err(StudyError::InvalidState(format!(
                "session {} is already completed",
                self.id
            )));
        }
        self.status = SessionStatus::Completed;
        self.ended_at = Some(now);
        Ok(())
    }
}

/// Review sequence: due states only, earliest due first, optionally capped.
/// Cards without a state never reach this function and are therefore never due.
pub fn review_sequence(
    mut states: Vec<SrsState>,
    now: DateTime<Utc>,
    card_limit: Option<usize>,
) -> Vec<i64> {
    states.retain(|state| state.is_due(now));
    states.sort_by(|a, b| a.due_at.cmp(&b.due_at).then(a.card_id.cmp(&b.card_id)));
    let ids = states.into_iter().map(|state| state.card_id);
    match card_limit {
        Some(limit) => ids.take(limit).collect(),
        None => ids.collect(),
    }
}

/// Practice, exam and flagged sequences: the given cards, shuffled if asked, then capped.
pub fn ordered_sequence(mut card_ids: Vec<i64>, config: Option<&SessionConfig>) -> Vec<i64> {
    let Some(config) = config else {
        return card_ids;
    };
    if config.shuffle {
        card_ids.shuffle(&mut rand::thread_rng());
    }
    if let Some(limit) = config.card_limit {
        card_ids.truncate(limit);
    }
    card_ids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(mode: SessionMode, cards: Vec<i64>, config: Option<SessionConfig>) -> StudySession {
        StudySession {
            id: 1,
            user_id: 1,
            deck_id: 1,
            mode,
            status: SessionStatus::Active,
            config,
            card_sequence: cards,
            position: 0,
            cycle: 0,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    fn endless() -> Option<SessionConfig> {
        Some(SessionConfig {
            endless: true,
            ..Default::default()
        })
    }

    #[test]
    fn test_mode_and_status_parse() {
        assert_eq!(SessionMode::parse("exam").unwrap(), SessionMode::Exam);
        assert_eq!(SessionStatus::parse("completed").unwrap(), SessionStatus::Completed);
        assert!(SessionMode::parse("cram").unwrap_err().is_invalid_input());
    }

    #[test]
    fn test_advance_until_exhausted() {
        let mut s = session(SessionMode::Practice, vec![10, 20], None);
        assert_eq!(s.current_card_id(), Some(10));
        assert_eq!(s.advance(), Advance::Next);
        assert_eq!(s.current_card_id(), Some(20));
        assert_eq!(s.advance(), Advance::Exhausted);
        assert_eq!(s.current_card_id(), None);
    }

    #[test]
    fn test_endless_practice_restarts() {
        let mut s = session(SessionMode::Practice, vec![1, 2, 3], endless());
        s.advance();
        s.advance();
        assert_eq!(s.advance(), Advance::Restarted);
        assert_eq!(s.position, 0);
        assert_eq!(s.cycle, 1);

        let mut cards = s.card_sequence.clone();
        cards.sort();
        assert_eq!(cards, vec![1, 2, 3]);
    }

    #[test]
    fn test_endless_only_applies_to_practice() {
        let mut s = session(SessionMode::Exam, vec![1], endless());
        assert_eq!(s.advance(), Advance::Exhausted);
    }

    #[test]
    fn test_complete_is_terminal() {
        let mut s = session(SessionMode::Review, vec![1], None);
        s.complete(Utc::now()).unwrap();
        assert!(s.is_completed());
        assert!(s.ended_at.is_some());
        assert_eq!(s.current_card_id(), None);
        assert!(s.complete(Utc::now()).unwrap_err().is_invalid_state());
    }

    #[test]
    fn test_deadline() {
        let mut s = session(
            SessionMode::Exam,
            vec![1],
            Some(SessionConfig {
                time_limit: Some(60),
                ..Default::default()
            }),
        );
        let start = s.started_at;
        assert!(!s.is_expired(start + Duration::seconds(59)));
        assert!(s.is_expired(start + Duration::seconds(60)));

        s.config = None;
        assert!(!s.is_expired(start + Duration::days(1)));
    }

    #[test]
    fn test_out_of_range_time_limit() {
        for seconds in [10_000_000_000_000, i64::MAX as u64, u64::MAX] {
            let config = SessionConfig {
                time_limit: Some(seconds),
                ..Default::default()
            };
            let s = session(SessionMode::Exam, vec![1], Some(config.clone()));
            assert_eq!(s.deadline(), None);
            assert!(!s.is_expired(s.started_at + Duration::days(365)));
            assert!(config.validate(s.started_at).unwrap_err().is_invalid_input());
        }

        let hour = SessionConfig {
            time_limit: Some(3600),
            ..Default::default()
        };
        assert!(hour.validate(Utc::now()).is_ok());
        assert!(SessionConfig::default().validate(Utc::now()).is_ok());
    }

    #[test]
    fn test_review_sequence_selects_due_cards_in_order() {
        let now = Utc::now();
        let state = |card_id, offset_hours: i64| SrsState {
            due_at: now + Duration::hours(offset_hours),
            ..SrsState::new(1, card_id, now)
        };

        let states = vec![state(1, -1), state(2, 5), state(3, -48), state(4, 0)];
        assert_eq!(review_sequence(states.clone(), now, None), vec![3, 1, 4]);
        assert_eq!(review_sequence(states, now, Some(2)), vec![3, 1]);
    }

    #[test]
    fn test_ordered_sequence() {
        assert_eq!(ordered_sequence(vec![1, 2, 3], None), vec![1, 2, 3]);

        let capped = SessionConfig {
            card_limit: Some(2),
            ..Default::default()
        };
        assert_eq!(ordered_sequence(vec![1, 2, 3], Some(&capped)), vec![1, 2]);

        let shuffled = SessionConfig {
            shuffle: true,
            ..Default::default()
        };
        let mut cards = ordered_sequence((1..=20).collect(), Some(&shuffled));
        cards.sort();
        assert_eq!(cards, (1..=20).collect::<Vec<_>>());
    }
}
