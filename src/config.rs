//! Engine configuration loaded from the environment (and an optional `.env` file).

use crate::error::{Result, StudyError};
use std::path::PathBuf;

const DATABASE_VAR: &str = "FLASHCARDS_DATABASE";
const CLOCK_VAR: &str = "FLASHCARDS_CLOCK";
const CARD_LIMIT_VAR: &str = "FLASHCARDS_DEFAULT_CARD_LIMIT";

/// Where the engine takes "now" from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClockMode {
    /// Wall clock (`Utc::now()`).
    #[default]
    System,
    /// Date stored in the database, advanced explicitly with `advance_day`.
    Simulated,
}

impl ClockMode {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "system" => Ok(Self::System),
            "simulated" => Ok(Self::Simulated),
            other => Err(StudyError::InvalidInput(format!(
                "unknown clock mode '{}'",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub database_path: PathBuf,
    pub clock: ClockMode,
    /// Applied to review sessions whose own config has no card limit.
    pub default_card_limit: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("db.sqlite3"),
            clock: ClockMode::System,
            default_card_limit: None,
        }
    }
}

impl EngineConfig {
    /// Reads `FLASHCARDS_DATABASE`, `FLASHCARDS_CLOCK` and `FLASHCARDS_DEFAULT_CARD_LIMIT`.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = lookup(DATABASE_VAR) {
            config.database_path = PathBuf::from(path);
        }
        if let Some(clock) = lookup(CLOCK_VAR) {
            config.clock = ClockMode::parse(&clock)?;
        }
        if let Some(limit) = lookup(CARD_LIMIT_VAR) {
            let parsed = limit.trim().parse::<usize>().ok().filter(|&n| n > 0);
            config.default_card_limit = Some(parsed.ok_or_else(|| {
                StudyError::InvalidInput(format!("{} must be a positive integer", CARD_LIMIT_VAR))
            })?);
        }

        Ok(config)
    }
}
