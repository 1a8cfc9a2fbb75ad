pub mod answer_record;
pub mod card;
pub mod deck;
pub mod grading;
pub mod progress;
pub mod sm2;
pub mod srs_state;
pub mod streak;
pub mod study_session;

pub use answer_record::{AnswerRecord, AnswerSubmission};
pub use card::{BlankAnswer, Card, CardPrompt, CardType, ClozeBlank, ClozeData};
pub use deck::Deck;
pub use progress::{DeckProgress, FlaggedCard};
pub use srs_state::{DueReviewCard, SrsState};
pub use streak::{StreakStats, UserStreak};
pub use study_session::{Advance, SessionConfig, SessionMode, SessionStatus, StudySession};
