//! Study engine: drives sessions over a shared SQLite connection.
//!
//! Every mutating call runs in one `BEGIN IMMEDIATE` transaction, so an answer is
//! either fully applied (record appended, SM-2 state and position updated) or not
//! at all, and concurrent writers to the same user/card state are serialized by
//! SQLite even across processes.

use crate::config::{ClockMode, EngineConfig};
use crate::database::db;
use crate::error::{Result, StudyError};
use crate::models::sm2::calculate_next_review;
use crate::models::study_session::{ordered_sequence, review_sequence};
use crate::models::{
    Advance, AnswerRecord, AnswerSubmission, CardPrompt, DeckProgress, DueReviewCard,
    FlaggedCard, SessionConfig, SessionMode, StreakStats, StudySession, UserStreak, grading,
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct StudyEngine {
    conn: Arc<Mutex<Connection>>,
    config: EngineConfig,
}

impl StudyEngine {
    /// Opens the database named by the config.
    pub fn open(config: EngineConfig) -> Result<Self> {
        let conn = db::init_database(&config.database_path)?;
        Ok(Self::new(conn, config))
    }

    /// Wraps an existing connection. The schema is created if missing.
    pub fn with_connection(conn: Connection, config: EngineConfig) -> Result<Self> {
        db::create_schema(&conn)?;
        Ok(Self::new(conn, config))
    }

    fn new(conn: Connection, config: EngineConfig) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared handle to the underlying connection (for collaborators such as deck CRUD).
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StudyError::LockPoisoned)
    }

    fn now(&self, conn: &Connection) -> Result<DateTime<Utc>> {
        match self.config.clock {
            // Storage keeps whole seconds
            ClockMode::System => {
                let now = Utc::now();
                Ok(DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now))
            }
            ClockMode::Simulated => db::get_current_date(conn),
        }
    }

    pub fn current_time(&self) -> Result<DateTime<Utc>> {
        let conn = self.lock()?;
        self.now(&conn)
    }

    /// Moves the simulated clock forward one day. Only valid with `ClockMode::Simulated`.
    pub fn advance_day(&self) -> Result<DateTime<Utc>> {
        if self.config.clock != ClockMode::Simulated {
            return Err(StudyError::InvalidState(
                "advance_day requires the simulated clock".to_string(),
            ));
        }
        let conn = self.lock()?;
        let next = db::advance_day(&conn)?;
        log::info!("Simulated date advanced to {}", next.date_naive());
        Ok(next)
    }

    /// Loads a session owned by `user_id`. Sessions of other users are reported as missing.
    fn owned_session(user_id: i64, session_id: i64, conn: &Connection) -> Result<StudySession> {
        let session = db::get_session(session_id, conn)?;
        if session.user_id != user_id {
            return Err(StudyError::NotFound(format!("session {}", session_id)));
        }
        Ok(session)
    }

    /// Schedules the deck's unscheduled cards for the user, due now. Review sessions
    /// only ever show cards that have been scheduled.
    pub fn enroll_deck(&self, user_id: i64, deck_id: i64) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = self.now(&tx)?;

        db::load_streak(user_id, &tx)?;
        db::get_deck(deck_id, &tx)?;
        let created = db::enroll_deck(user_id, deck_id, now, &tx)?;
        tx.commit()?;

        log::info!("Scheduled {} new cards of deck {} for user {}", created, deck_id, user_id);
        Ok(created)
    }

    /// Builds the card sequence for the mode and persists a new active session.
    pub fn start_session(
        &self,
        user_id: i64,
        deck_id: i64,
        mode: SessionMode,
        config: Option<SessionConfig>,
    ) -> Result<StudySession> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = self.now(&tx)?;

        db::load_streak(user_id, &tx)?;
        db::get_deck(deck_id, &tx)?;
        if let Some(config) = &config {
            config.validate(now)?;
        }

        let sequence = match mode {
            SessionMode::Review => {
                let limit = config
                    .as_ref()
                    .and_then(|c| c.card_limit)
                    .or(self.config.default_card_limit);
                let due = db::list_due(user_id, Some(deck_id), now, &tx)?;
                review_sequence(due, now, limit)
            }
            SessionMode::Practice | SessionMode::Exam => {
                let ids = db::list_cards(deck_id, &tx)?
                    .into_iter()
                    .map(|card| card.id)
                    .collect();
                ordered_sequence(ids, config.as_ref())
            }
            SessionMode::Flagged => {
                let ids = db::list_flagged_card_ids(user_id, deck_id, &tx)?;
                ordered_sequence(ids, config.as_ref())
            }
        };

        let session =
            db::create_session(user_id, deck_id, mode, config.as_ref(), &sequence, now, &tx)?;
        tx.commit()?;

        log::info!(
            "Started {} session {} for user {} on deck {} with {} cards",
            mode.as_str(),
            session.id,
            user_id,
            deck_id,
            sequence.len()
        );
        Ok(session)
    }

    pub fn get_session(&self, user_id: i64, session_id: i64) -> Result<StudySession> {
        let conn = self.lock()?;
        Self::owned_session(user_id, session_id, &conn)
    }

    /// The card currently expected, without its answer. `None` once nothing is left.
    pub fn current_prompt(&self, user_id: i64, session_id: i64) -> Result<Option<CardPrompt>> {
        let conn = self.lock()?;
        let session = Self::owned_session(user_id, session_id, &conn)?;
        session
            .current_card_id()
            .map(|card_id| db::get_card(card_id, &conn).map(|card| card.to_prompt()))
            .transpose()
    }

    pub fn session_answers(&self, user_id: i64, session_id: i64) -> Result<Vec<AnswerRecord>> {
        let conn = self.lock()?;
        Self::owned_session(user_id, session_id, &conn)?;
        db::list_answer_records(session_id, &conn)
    }

    /// Grades and records an answer to the session's current card, schedules the
    /// card in review mode and advances the session.
    pub fn submit_answer(
        &self,
        user_id: i64,
        session_id: i64,
        submission: AnswerSubmission,
    ) -> Result<AnswerRecord> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = self.now(&tx)?;
        let mut session = Self::owned_session(user_id, session_id, &tx)?;

        if session.is_completed() {
            log::warn!("Rejected answer to completed session {}", session_id);
            return Err(StudyError::InvalidState(format!(
                "session {} is already completed",
                session_id
            )));
        }

        if session.is_expired(now) {
            log::warn!("Session {} ran out of time; finishing it", session_id);
            complete_session(&mut session, now, &tx)?;
            tx.commit()?;
            return Err(StudyError::InvalidState(format!(
                "session {} exceeded its time limit",
                session_id
            )));
        }

        if session.current_card_id() != Some(submission.card_id) {
            log::warn!(
                "Rejected answer for card {} in session {}: current card is {:?}",
                submission.card_id,
                session_id,
                session.current_card_id()
            );
            return Err(StudyError::InvalidState(format!(
                "card {} is not the current card of session {}",
                submission.card_id, session_id
            )));
        }

        let card = db::get_card(submission.card_id, &tx)?;
        let is_correct = grading::grade(&card, submission.user_answer.as_deref());

        let quality = if session.mode == SessionMode::Review {
            let quality = submission.derived_quality(is_correct);
            let state = db::get_or_create_srs_state(user_id, card.id, now, &tx)?;
            let next = calculate_next_review(&state, quality, now)?;
            db::save_srs_state(&next, &tx)?;
            log::debug!(
                "Card {} scheduled: interval {} -> {} days, easiness {:.2} -> {:.2}",
                card.id,
                state.interval_days,
                next.interval_days,
                state.easiness,
                next.easiness
            );
            next.last_quality
        } else {
            None
        };

        let record = db::append_answer_record(
            session.id,
            card.id,
            submission.user_answer.as_deref(),
            is_correct,
            quality,
            now,
            &tx,
        )?;
        log::debug!(
            "Session {} card {} graded {:?} (quality {:?})",
            session.id,
            card.id,
            is_correct,
            quality
        );

        db::update_deck_progress(user_id, session.deck_id, now, &tx)?;

        match session.advance() {
            Advance::Next => db::save_session(&session, &tx)?,
            Advance::Restarted => {
                log::debug!("Session {} restarted cycle {}", session.id, session.cycle + 1);
                db::save_session(&session, &tx)?;
            }
            Advance::Exhausted => complete_session(&mut session, now, &tx)?,
        }

        tx.commit()?;
        Ok(record)
    }

    /// Finishes an active session explicitly.
    pub fn finish_session(&self, user_id: i64, session_id: i64) -> Result<StudySession> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = self.now(&tx)?;
        let mut session = Self::owned_session(user_id, session_id, &tx)?;

        complete_session(&mut session, now, &tx)?;
        tx.commit()?;
        Ok(session)
    }

    /// Finishes the session if its time limit has passed. Returns whether it did.
    pub fn finish_if_expired(&self, user_id: i64, session_id: i64) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = self.now(&tx)?;
        let mut session = Self::owned_session(user_id, session_id, &tx)?;

        if session.is_completed() || !session.is_expired(now) {
            return Ok(false);
        }

        log::warn!("Session {} ran out of time; finishing it", session_id);
        complete_session(&mut session, now, &tx)?;
        tx.commit()?;
        Ok(true)
    }

    pub fn due_reviews(&self, user_id: i64) -> Result<Vec<DueReviewCard>> {
        let conn = self.lock()?;
        let now = self.now(&conn)?;
        db::due_review_cards(user_id, now, &conn)
    }

    pub fn streak(&self, user_id: i64) -> Result<UserStreak> {
        let conn = self.lock()?;
        db::load_streak(user_id, &conn)
    }

    pub fn streak_stats(&self, user_id: i64) -> Result<StreakStats> {
        let conn = self.lock()?;
        let today = self.now(&conn)?.date_naive();
        Ok(db::load_streak(user_id, &conn)?.stats(today))
    }

    pub fn deck_progress(&self, user_id: i64, deck_id: i64) -> Result<Option<DeckProgress>> {
        let conn = self.lock()?;
        db::get_deck_progress(user_id, deck_id, &conn)
    }

    pub fn flag_card(&self, user_id: i64, deck_id: i64, card_id: i64) -> Result<FlaggedCard> {
        let conn = self.lock()?;
        let now = self.now(&conn)?;
        db::load_streak(user_id, &conn)?;
        db::flag_card(user_id, deck_id, card_id, now, &conn)
    }

    pub fn unflag_card(&self, user_id: i64, card_id: i64) -> Result<()> {
        let conn = self.lock()?;
        db::unflag_card(user_id, card_id, &conn)
    }
}

/// Marks the session completed and credits the study day to the user's streak.
/// Runs inside the caller's transaction.
fn complete_session(session: &mut StudySession, now: DateTime<Utc>, conn: &Connection) -> Result<()> {
    session.complete(now)?;
    db::save_session(session, conn)?;

    let streak = db::load_streak(session.user_id, conn)?;
    let updated = streak.record_activity(now.date_naive());
    if updated != streak {
        db::save_streak(session.user_id, &updated, conn)?;
        log::info!(
            "User {} streak now {} (longest {})",
            session.user_id,
            updated.current_streak,
            updated.longest_streak
        );
    }

    log::info!("Completed {} session {}", session.mode.as_str(), session.id);
    Ok(())
}
