//! Cards as the study engine sees them: a prompt, an expected answer and
//! type-specific grading data. Cards are read-only here.
use crate::error::{Result, StudyError};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    /// Self-assessed, never auto-graded
    Basic,
    MultipleChoice,
    /// `options` holds acceptable alternative answers
    ShortAnswer,
    /// Fill-in-the-blank, graded blank by blank
    Cloze,
}

impl CardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::MultipleChoice => "multiple_choice",
            Self::ShortAnswer => "short_answer",
            Self::Cloze => "cloze",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "basic" => Ok(Self::Basic),
            "multiple_choice" => Ok(Self::MultipleChoice),
            "short_answer" => Ok(Self::ShortAnswer),
            "cloze" => Ok(Self::Cloze),
            other => Err(StudyError::InvalidInput(format!(
                "unknown card type '{}'",
                other
            ))),
        }
    }
}

/// Expected answer of one blank: a single string or a list of accepted strings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlankAnswer {
    One(String),
    Many(Vec<String>),
}

impl BlankAnswer {
    pub fn accepted(&self) -> &[String] {
        match self {
            Self::One(answer) => std::slice::from_ref(answer),
            Self::Many(answers) => answers,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClozeBlank {
    pub answer: BlankAnswer,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClozeData {
    pub blanks: Vec<ClozeBlank>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,
    pub deck_id: i64,
    #[serde(rename = "type")]
    pub card_type: CardType,
    pub prompt: String,
    pub answer: String,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub cloze_data: Option<ClozeData>,
}

impl Card {
    /// The part of a card that may be shown before an answer is submitted.
    pub fn to_prompt(&self) -> CardPrompt {
        let options = match self.card_type {
            CardType::MultipleChoice => self.options.clone(),
            _ => None,
        };
        CardPrompt {
            card_id: self.id,
            card_type: self.card_type,
            prompt: self.prompt.clone(),
            options,
            blank_count: self.cloze_data.as_ref().map(|data| data.blanks.len()),
        }
    }
}

/// Card view without the expected answer, short-answer alternatives or cloze answers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CardPrompt {
    pub card_id: i64,
    pub card_type: CardType,
    pub prompt: String,
    /// Only present for multiple-choice cards
    pub options: Option<Vec<String>>,
    pub blank_count: Option<usize>,
}
