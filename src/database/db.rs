//! Database operations for the study engine
//!
//! Handles SQLite schema creation and the persistence the engine relies on:
//! cards and decks (read side), per-user SM-2 state, study sessions with their
//! answer records, streaks, flagged cards, deck progress and the simulated date.
//!
//! Timestamps are stored as UNIX seconds, calendar dates as `YYYY-MM-DD` text.

use crate::error::{Result, StudyError};
use crate::models::progress::percent_complete;
use crate::models::srs_state::DEFAULT_EASINESS;
use crate::models::{
    AnswerRecord, Card, CardType, ClozeData, Deck, DeckProgress, DueReviewCard, FlaggedCard,
    SessionConfig, SessionMode, SessionStatus, SrsState, StudySession, UserStreak,
};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::HashMap;
use std::path::Path;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        current_streak INTEGER NOT NULL DEFAULT 0,
        longest_streak INTEGER NOT NULL DEFAULT 0,
        last_activity_date TEXT
    );

    CREATE TABLE IF NOT EXISTS decks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS cards (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        deck_id INTEGER NOT NULL REFERENCES decks(id) ON DELETE CASCADE,
        card_type TEXT NOT NULL,
        prompt TEXT NOT NULL,
        answer TEXT NOT NULL,
        options TEXT,
        cloze_data TEXT
    );

    CREATE TABLE IF NOT EXISTS srs_states (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        card_id INTEGER NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
        repetitions INTEGER NOT NULL DEFAULT 0,
        interval_days INTEGER NOT NULL DEFAULT 1,
        easiness REAL NOT NULL DEFAULT 2.5,
        due_at INTEGER NOT NULL,
        last_quality INTEGER,
        UNIQUE(user_id, card_id)
    );

    CREATE INDEX IF NOT EXISTS idx_srs_states_due ON srs_states(user_id, due_at);

    CREATE TABLE IF NOT EXISTS study_sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        deck_id INTEGER NOT NULL REFERENCES decks(id) ON DELETE CASCADE,
        mode TEXT NOT NULL,
        status TEXT NOT NULL,
        config TEXT,
        card_sequence TEXT NOT NULL,
        position INTEGER NOT NULL DEFAULT 0,
        cycle INTEGER NOT NULL DEFAULT 0,
        started_at INTEGER NOT NULL,
        ended_at INTEGER
    );

    CREATE TABLE IF NOT EXISTS answer_records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id INTEGER NOT NULL REFERENCES study_sessions(id) ON DELETE CASCADE,
        card_id INTEGER NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
        user_answer TEXT,
        is_correct INTEGER,
        quality INTEGER,
        answered_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS flagged_cards (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        card_id INTEGER NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
        deck_id INTEGER NOT NULL REFERENCES decks(id) ON DELETE CASCADE,
        flagged_at INTEGER NOT NULL,
        UNIQUE(user_id, card_id)
    );

    CREATE TABLE IF NOT EXISTS deck_progress (
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        deck_id INTEGER NOT NULL REFERENCES decks(id) ON DELETE CASCADE,
        percent_complete REAL NOT NULL DEFAULT 0,
        last_studied_at INTEGER,
        PRIMARY KEY (user_id, deck_id)
    );

    CREATE TABLE IF NOT EXISTS app_state (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
";

/// Opens (or creates) the SQLite database at `path` and makes sure the schema exists.
pub fn init_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    create_schema(&conn)?;
    log::info!("Opened study database at {}", path.display());
    Ok(conn)
}

/// Private in-memory database, mostly for tests.
pub fn init_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

/// Creates all tables and seeds the simulated date with the current time if unset.
pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA)?;

    conn.execute(
        "INSERT OR IGNORE INTO app_state (key, value) VALUES ('current_date', ?1)",
        params![Utc::now().timestamp().to_string()],
    )?;

    Ok(())
}

fn timestamp_at(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let secs: i64 = row.get(idx)?;
    DateTime::from_timestamp(secs, 0).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, secs))
}

fn optional_timestamp_at(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<i64>>(idx)? {
        Some(_) => timestamp_at(row, idx).map(Some),
        None => Ok(None),
    }
}

fn to_json<T: serde::Serialize>(value: Option<&T>) -> Result<Option<String>> {
    value
        .map(serde_json::to_string)
        .transpose()
        .map_err(StudyError::from)
}

fn from_json<T: serde::de::DeserializeOwned>(value: Option<String>) -> Result<Option<T>> {
    value
        .map(|text| serde_json::from_str(&text))
        .transpose()
        .map_err(StudyError::from)
}

// ==================== Simulated date ====================

/// Retrieves the simulated current date from the database
pub fn get_current_date(conn: &Connection) -> Result<DateTime<Utc>> {
    let timestamp: String = conn.query_row(
        "SELECT value FROM app_state WHERE key = 'current_date'",
        [],
        |row| row.get(0),
    )?;

    let secs = timestamp.parse::<i64>().map_err(|_| {
        StudyError::InvalidInput(format!("stored current date '{}' is not a timestamp", timestamp))
    })?;
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| StudyError::InvalidInput(format!("timestamp {} out of range", secs)))
}

pub fn set_current_date(date: DateTime<Utc>, conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT INTO app_state (key, value) VALUES ('current_date', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![date.timestamp().to_string()],
    )?;
    Ok(())
}

/// Advances the simulated date by 24 hours (for exercising spaced repetition)
pub fn advance_day(conn: &Connection) -> Result<DateTime<Utc>> {
    let next_day = get_current_date(conn)? + Duration::days(1);
    set_current_date(next_day, conn)?;
    Ok(next_day)
}

// ==================== Users, decks and cards ====================

pub fn add_user(name: &str, conn: &Connection) -> Result<i64> {
    conn.execute("INSERT INTO users (name) VALUES (?1)", params![name])?;
    Ok(conn.last_insert_rowid())
}

/// Creates a new deck in the database and returns its ID
pub fn new_deck(name: &str, conn: &Connection) -> Result<i64> {
    conn.execute("INSERT INTO decks (name) VALUES (?1)", params![name])?;
    Ok(conn.last_insert_rowid())
}

pub fn get_deck(deck_id: i64, conn: &Connection) -> Result<Deck> {
    conn.query_row(
        "SELECT id, name FROM decks WHERE id = ?1",
        params![deck_id],
        |row| {
            Ok(Deck {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| StudyError::NotFound(format!("deck {}", deck_id)))
}

/// Adds a card to a deck. `card.id` is ignored; the stored card is returned.
pub fn add_card(card: &Card, conn: &Connection) -> Result<Card> {
    conn.execute(
        "INSERT INTO cards (deck_id, card_type, prompt, answer, options, cloze_data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            card.deck_id,
            card.card_type.as_str(),
            card.prompt,
            card.answer,
            to_json(card.options.as_ref())?,
            to_json(card.cloze_data.as_ref())?,
        ],
    )?;

    Ok(Card {
        id: conn.last_insert_rowid(),
        ..card.clone()
    })
}

struct CardRow {
    id: i64,
    deck_id: i64,
    card_type: String,
    prompt: String,
    answer: String,
    options: Option<String>,
    cloze_data: Option<String>,
}

impl CardRow {
    const COLUMNS: &'static str = "id, deck_id, card_type, prompt, answer, options, cloze_data";

    fn read(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            deck_id: row.get(1)?,
            card_type: row.get(2)?,
            prompt: row.get(3)?,
            answer: row.get(4)?,
            options: row.get(5)?,
            cloze_data: row.get(6)?,
        })
    }

    fn into_card(self) -> Result<Card> {
        Ok(Card {
            id: self.id,
            deck_id: self.deck_id,
            card_type: CardType::parse(&self.card_type)?,
            prompt: self.prompt,
            answer: self.answer,
            options: from_json::<Vec<String>>(self.options)?,
            cloze_data: from_json::<ClozeData>(self.cloze_data)?,
        })
    }
}

pub fn get_card(card_id: i64, conn: &Connection) -> Result<Card> {
    conn.query_row(
        &format!("SELECT {} FROM cards WHERE id = ?1", CardRow::COLUMNS),
        params![card_id],
        CardRow::read,
    )
    .optional()?
    .ok_or_else(|| StudyError::NotFound(format!("card {}", card_id)))?
    .into_card()
}

/// Retrieves all cards of a deck in insertion order
pub fn list_cards(deck_id: i64, conn: &Connection) -> Result<Vec<Card>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM cards WHERE deck_id = ?1 ORDER BY id",
        CardRow::COLUMNS
    ))?;

    let rows = stmt
        .query_map(params![deck_id], CardRow::read)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter().map(CardRow::into_card).collect()
}

// ==================== SM-2 state ====================

const SRS_COLUMNS: &str =
    "s.user_id, s.card_id, s.repetitions, s.interval_days, s.easiness, s.due_at, s.last_quality";

fn read_srs_state(row: &Row) -> rusqlite::Result<SrsState> {
    Ok(SrsState {
        user_id: row.get(0)?,
        card_id: row.get(1)?,
        repetitions: row.get(2)?,
        interval_days: row.get(3)?,
        easiness: row.get(4)?,
        due_at: timestamp_at(row, 5)?,
        last_quality: row.get(6)?,
    })
}

pub fn get_srs_state(user_id: i64, card_id: i64, conn: &Connection) -> Result<Option<SrsState>> {
    let state = conn
        .query_row(
            &format!(
                "SELECT {} FROM srs_states s WHERE s.user_id = ?1 AND s.card_id = ?2",
                SRS_COLUMNS
            ),
            params![user_id, card_id],
            read_srs_state,
        )
        .optional()?;
    Ok(state)
}

/// Returns the user's state for a card, creating it with SM-2 defaults (due now) if missing.
pub fn get_or_create_srs_state(
    user_id: i64,
    card_id: i64,
    now: DateTime<Utc>,
    conn: &Connection,
) -> Result<SrsState> {
    let fresh = SrsState::new(user_id, card_id, now);
    conn.execute(
        "INSERT OR IGNORE INTO srs_states (user_id, card_id, repetitions, interval_days, easiness, due_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user_id,
            card_id,
            fresh.repetitions,
            fresh.interval_days,
            fresh.easiness,
            fresh.due_at.timestamp()
        ],
    )?;

    get_srs_state(user_id, card_id, conn)?
        .ok_or_else(|| StudyError::NotFound(format!("SRS state for card {}", card_id)))
}

/// Updates SM-2 state after a review
pub fn save_srs_state(state: &SrsState, conn: &Connection) -> Result<()> {
    let updated = conn.execute(
        "UPDATE srs_states
         SET repetitions = ?1, interval_days = ?2, easiness = ?3, due_at = ?4, last_quality = ?5
         WHERE user_id = ?6 AND card_id = ?7",
        params![
            state.repetitions,
            state.interval_days,
            state.easiness,
            state.due_at.timestamp(),
            state.last_quality,
            state.user_id,
            state.card_id
        ],
    )?;

    if updated == 0 {
        return Err(StudyError::NotFound(format!(
            "SRS state for user {} and card {}",
            state.user_id, state.card_id
        )));
    }
    Ok(())
}

/// Schedules every deck card the user has no state for yet, due immediately.
/// Returns how many states were created.
pub fn enroll_deck(
    user_id: i64,
    deck_id: i64,
    now: DateTime<Utc>,
    conn: &Connection,
) -> Result<usize> {
    let created = conn.execute(
        "INSERT OR IGNORE INTO srs_states (user_id, card_id, repetitions, interval_days, easiness, due_at)
         SELECT ?1, id, 0, 1, ?2, ?3 FROM cards WHERE deck_id = ?4",
        params![user_id, DEFAULT_EASINESS, now.timestamp(), deck_id],
    )?;
    Ok(created)
}

/// Retrieves the user's states with `due_at <= now`, optionally restricted to one deck,
/// ordered by due date (earliest first).
pub fn list_due(
    user_id: i64,
    deck_id: Option<i64>,
    now: DateTime<Utc>,
    conn: &Connection,
) -> Result<Vec<SrsState>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {}
         FROM srs_states s
         JOIN cards c ON c.id = s.card_id
         WHERE s.user_id = ?1 AND s.due_at <= ?2 AND (?3 IS NULL OR c.deck_id = ?3)
         ORDER BY s.due_at ASC, s.card_id ASC",
        SRS_COLUMNS
    ))?;

    let states = stmt
        .query_map(params![user_id, now.timestamp(), deck_id], read_srs_state)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(states)
}

/// Due reviews across all decks, earliest first
pub fn due_review_cards(
    user_id: i64,
    now: DateTime<Utc>,
    conn: &Connection,
) -> Result<Vec<DueReviewCard>> {
    let mut stmt = conn.prepare(
        "SELECT s.card_id, c.deck_id, s.due_at, s.repetitions, s.interval_days, s.easiness
         FROM srs_states s
         JOIN cards c ON c.id = s.card_id
         WHERE s.user_id = ?1 AND s.due_at <= ?2
         ORDER BY s.due_at ASC, s.card_id ASC",
    )?;

    let due = stmt
        .query_map(params![user_id, now.timestamp()], |row| {
            Ok(DueReviewCard {
                card_id: row.get(0)?,
                deck_id: row.get(1)?,
                due_at: timestamp_at(row, 2)?,
                repetitions: row.get(3)?,
                interval_days: row.get(4)?,
                easiness: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(due)
}

// ==================== Sessions and answers ====================

struct SessionRow {
    id: i64,
    user_id: i64,
    deck_id: i64,
    mode: String,
    status: String,
    config: Option<String>,
    card_sequence: String,
    position: usize,
    cycle: u32,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl SessionRow {
    fn read(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            deck_id: row.get(2)?,
            mode: row.get(3)?,
            status: row.get(4)?,
            config: row.get(5)?,
            card_sequence: row.get(6)?,
            position: row.get(7)?,
            cycle: row.get(8)?,
            started_at: timestamp_at(row, 9)?,
            ended_at: optional_timestamp_at(row, 10)?,
        })
    }

    fn into_session(self) -> Result<StudySession> {
        Ok(StudySession {
            id: self.id,
            user_id: self.user_id,
            deck_id: self.deck_id,
            mode: SessionMode::parse(&self.mode)?,
            status: SessionStatus::parse(&self.status)?,
            config: from_json::<SessionConfig>(self.config)?,
            card_sequence: serde_json::from_str(&self.card_sequence)?,
            position: self.position,
            cycle: self.cycle,
            started_at: self.started_at,
            ended_at: self.ended_at,
        })
    }
}

pub fn create_session(
    user_id: i64,
    deck_id: i64,
    mode: SessionMode,
    config: Option<&SessionConfig>,
    card_sequence: &[i64],
    now: DateTime<Utc>,
    conn: &Connection,
) -> Result<StudySession> {
    conn.execute(
        "INSERT INTO study_sessions (user_id, deck_id, mode, status, config, card_sequence, started_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user_id,
            deck_id,
            mode.as_str(),
            SessionStatus::Active.as_str(),
            to_json(config)?,
            serde_json::to_string(card_sequence)?,
            now.timestamp()
        ],
    )?;

    get_session(conn.last_insert_rowid(), conn)
}

pub fn get_session(session_id: i64, conn: &Connection) -> Result<StudySession> {
    conn.query_row(
        "SELECT id, user_id, deck_id, mode, status, config, card_sequence, position, cycle,
                started_at, ended_at
         FROM study_sessions WHERE id = ?1",
        params![session_id],
        SessionRow::read,
    )
    .optional()?
    .ok_or_else(|| StudyError::NotFound(format!("session {}", session_id)))?
    .into_session()
}

/// Persists the mutable part of a session: status, sequence, position and end time.
pub fn save_session(session: &StudySession, conn: &Connection) -> Result<()> {
    conn.execute(
        "UPDATE study_sessions
         SET status = ?1, card_sequence = ?2, position = ?3, cycle = ?4, ended_at = ?5
         WHERE id = ?6",
        params![
            session.status.as_str(),
            serde_json::to_string(&session.card_sequence)?,
            session.position,
            session.cycle,
            session.ended_at.map(|t| t.timestamp()),
            session.id
        ],
    )?;
    Ok(())
}

pub fn append_answer_record(
    session_id: i64,
    card_id: i64,
    user_answer: Option<&str>,
    is_correct: Option<bool>,
    quality: Option<u8>,
    answered_at: DateTime<Utc>,
    conn: &Connection,
) -> Result<AnswerRecord> {
    conn.execute(
        "INSERT INTO answer_records (session_id, card_id, user_answer, is_correct, quality, answered_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            session_id,
            card_id,
            user_answer,
            is_correct,
            quality,
            answered_at.timestamp()
        ],
    )?;

    Ok(AnswerRecord {
        id: conn.last_insert_rowid(),
        session_id,
        card_id,
        user_answer: user_answer.map(String::from),
        is_correct,
        quality,
        answered_at,
    })
}

pub fn list_answer_records(session_id: i64, conn: &Connection) -> Result<Vec<AnswerRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, session_id, card_id, user_answer, is_correct, quality, answered_at
         FROM answer_records WHERE session_id = ?1 ORDER BY id",
    )?;

    let records = stmt
        .query_map(params![session_id], |row| {
            Ok(AnswerRecord {
                id: row.get(0)?,
                session_id: row.get(1)?,
                card_id: row.get(2)?,
                user_answer: row.get(3)?,
                is_correct: row.get(4)?,
                quality: row.get(5)?,
                answered_at: timestamp_at(row, 6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(records)
}

// ==================== Streaks ====================

pub fn load_streak(user_id: i64, conn: &Connection) -> Result<UserStreak> {
    conn.query_row(
        "SELECT current_streak, longest_streak, last_activity_date FROM users WHERE id = ?1",
        params![user_id],
        |row| {
            Ok(UserStreak {
                current_streak: row.get(0)?,
                longest_streak: row.get(1)?,
                last_activity_date: row.get(2)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| StudyError::NotFound(format!("user {}", user_id)))
}

pub fn save_streak(user_id: i64, streak: &UserStreak, conn: &Connection) -> Result<()> {
    conn.execute(
        "UPDATE users SET current_streak = ?1, longest_streak = ?2, last_activity_date = ?3
         WHERE id = ?4",
        params![
            streak.current_streak,
            streak.longest_streak,
            streak.last_activity_date,
            user_id
        ],
    )?;
    Ok(())
}

// ==================== Flagged cards ====================

fn read_flagged(row: &Row) -> rusqlite::Result<FlaggedCard> {
    Ok(FlaggedCard {
        id: row.get(0)?,
        user_id: row.get(1)?,
        card_id: row.get(2)?,
        deck_id: row.get(3)?,
        flagged_at: timestamp_at(row, 4)?,
    })
}

/// Flags a card for a user. Flagging twice returns the existing flag.
pub fn flag_card(
    user_id: i64,
    deck_id: i64,
    card_id: i64,
    now: DateTime<Utc>,
    conn: &Connection,
) -> Result<FlaggedCard> {
    let card = get_card(card_id, conn)?;
    if card.deck_id != deck_id {
        return Err(StudyError::InvalidInput(format!(
            "card {} does not belong to deck {}",
            card_id, deck_id
        )));
    }

    conn.execute(
        "INSERT OR IGNORE INTO flagged_cards (user_id, card_id, deck_id, flagged_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![user_id, card_id, deck_id, now.timestamp()],
    )?;

    let flagged = conn.query_row(
        "SELECT id, user_id, card_id, deck_id, flagged_at
         FROM flagged_cards WHERE user_id = ?1 AND card_id = ?2",
        params![user_id, card_id],
        read_flagged,
    )?;
    Ok(flagged)
}

pub fn unflag_card(user_id: i64, card_id: i64, conn: &Connection) -> Result<()> {
    let removed = conn.execute(
        "DELETE FROM flagged_cards WHERE user_id = ?1 AND card_id = ?2",
        params![user_id, card_id],
    )?;
    if removed == 0 {
        return Err(StudyError::NotFound(format!("flag on card {}", card_id)));
    }
    Ok(())
}

pub fn is_card_flagged(user_id: i64, card_id: i64, conn: &Connection) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM flagged_cards WHERE user_id = ?1 AND card_id = ?2",
            params![user_id, card_id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Flagged card IDs of a deck, in the order they were flagged
pub fn list_flagged_card_ids(user_id: i64, deck_id: i64, conn: &Connection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT card_id FROM flagged_cards
         WHERE user_id = ?1 AND deck_id = ?2
         ORDER BY flagged_at, id",
    )?;
    let ids = stmt
        .query_map(params![user_id, deck_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

pub fn flagged_counts_by_deck(user_id: i64, conn: &Connection) -> Result<HashMap<i64, usize>> {
    let mut stmt = conn.prepare(
        "SELECT deck_id, COUNT(*) FROM flagged_cards WHERE user_id = ?1 GROUP BY deck_id",
    )?;
    let counts = stmt
        .query_map(params![user_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<HashMap<i64, usize>>>()?;
    Ok(counts)
}

// ==================== Deck progress ====================

pub fn get_deck_progress(
    user_id: i64,
    deck_id: i64,
    conn: &Connection,
) -> Result<Option<DeckProgress>> {
    let progress = conn
        .query_row(
            "SELECT user_id, deck_id, percent_complete, last_studied_at
             FROM deck_progress WHERE user_id = ?1 AND deck_id = ?2",
            params![user_id, deck_id],
            |row| {
                Ok(DeckProgress {
                    user_id: row.get(0)?,
                    deck_id: row.get(1)?,
                    percent_complete: row.get(2)?,
                    last_studied_at: optional_timestamp_at(row, 3)?,
                })
            },
        )
        .optional()?;
    Ok(progress)
}

/// Recomputes the share of deck cards the user has answered in any session.
pub fn update_deck_progress(
    user_id: i64,
    deck_id: i64,
    now: DateTime<Utc>,
    conn: &Connection,
) -> Result<DeckProgress> {
    let total_cards: usize = conn.query_row(
        "SELECT COUNT(*) FROM cards WHERE deck_id = ?1",
        params![deck_id],
        |row| row.get(0),
    )?;

    let answered_cards: usize = conn.query_row(
        "SELECT COUNT(DISTINCT a.card_id)
         FROM answer_records a
         JOIN study_sessions s ON s.id = a.session_id
         JOIN cards c ON c.id = a.card_id
         WHERE s.user_id = ?1 AND s.deck_id = ?2 AND c.deck_id = ?2",
        params![user_id, deck_id],
        |row| row.get(0),
    )?;

    let progress = DeckProgress {
        user_id,
        deck_id,
        percent_complete: percent_complete(answered_cards, total_cards),
        last_studied_at: Some(now),
    };

    conn.execute(
        "INSERT INTO deck_progress (user_id, deck_id, percent_complete, last_studied_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(user_id, deck_id)
         DO UPDATE SET percent_complete = excluded.percent_complete,
                       last_studied_at = excluded.last_studied_at",
        params![user_id, deck_id, progress.percent_complete, now.timestamp()],
    )?;

    Ok(progress)
}
