//! Spaced-repetition study engine: SM-2 scheduling, answer grading for basic,
//! multiple-choice, short-answer and cloze cards, review/practice/exam/flagged
//! study sessions and daily study streaks, persisted in SQLite.

pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod models;

pub use config::{ClockMode, EngineConfig};
pub use engine::StudyEngine;
pub use error::{Result, StudyError};
pub use models::{
    AnswerRecord, AnswerSubmission, Card, CardPrompt, CardType, SessionConfig, SessionMode,
    SessionStatus, SrsState, StudySession, UserStreak,
};
