//! Answer grading per card type.
//!
//! Grading is total: malformed or missing answers come from untrusted clients and
//! are graded as incorrect instead of failing. Comparison is case-insensitive and
//! ignores surrounding whitespace.

use super::{Card, CardType};

pub fn normalize(answer: &str) -> String {
    answer.trim().to_lowercase()
}

/// Grades a raw answer. `None` means the card type is self-assessed (`basic`).
pub fn grade(card: &Card, user_answer: Option<&str>) -> Option<bool> {
    match card.card_type {
        CardType::Basic => None,
        CardType::MultipleChoice => Some(check_multiple_choice(card, user_answer)),
        CardType::ShortAnswer => Some(check_short_answer(card, user_answer)),
        CardType::Cloze => Some(check_cloze(card, user_answer)),
    }
}

/// Normalized, non-empty answer text.
fn submitted(user_answer: Option<&str>) -> Option<String> {
    user_answer.map(normalize).filter(|answer| !answer.is_empty())
}

fn check_multiple_choice(card: &Card, user_answer: Option<&str>) -> bool {
    submitted(user_answer).is_some_and(|answer| answer == normalize(&card.answer))
}

fn check_short_answer(card: &Card, user_answer: Option<&str>) -> bool {
    let Some(answer) = submitted(user_answer) else {
        return false;
    };

    answer == normalize(&card.answer)
        || card
            .options
            .iter()
            .flatten()
            .any(|alternative| normalize(alternative) == answer)
}

fn check_cloze(card: &Card, user_answer: Option<&str>) -> bool {
    let Some(blanks) = card.cloze_data.as_ref().map(|data| &data.blanks) else {
        return false;
    };
    let Some(answers) = user_answer.and_then(parse_cloze_answer) else {
        return false;
    };
    if answers.len() != blanks.len() {
        return false;
    }

    blanks.iter().zip(&answers).all(|(blank, given)| {
        let given = normalize(given);
        blank
            .answer
            .accepted()
            .iter()
            .any(|expected| normalize(expected) == given)
    })
}

/// Decodes the JSON list of per-blank answers. Anything that is not a list of strings yields `None`.
pub fn parse_cloze_answer(raw: &str) -> Option<Vec<String>> {
    serde_json::from_str::<Vec<String>>(raw).ok()
}

/// Encodes per-blank answers in the stored cloze answer format.
pub fn encode_cloze_answer<S: AsRef<str>>(answers: &[S]) -> String {
    let answers: Vec<&str> = answers.iter().map(AsRef::as_ref).collect();
    serde_json::Value::from(answers).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BlankAnswer, ClozeBlank, ClozeData};

    fn card(card_type: CardType, answer: &str, options: Option<Vec<&str>>) -> Card {
        Card {
            id: 1,
            deck_id: 1,
            card_type,
            prompt: "Question?".to_string(),
            answer: answer.to_string(),
            options: options.map(|opts| opts.into_iter().map(String::from).collect()),
            cloze_data: None,
        }
    }

    fn cloze(blanks: Vec<BlankAnswer>) -> Card {
        Card {
            cloze_data: Some(ClozeData {
                blanks: blanks
                    .into_iter()
                    .map(|answer| ClozeBlank { answer })
                    .collect(),
            }),
            ..card(CardType::Cloze, "", None)
        }
    }

    fn one(answer: &str) -> BlankAnswer {
        BlankAnswer::One(answer.to_string())
    }

    fn many(answers: &[&str]) -> BlankAnswer {
        BlankAnswer::Many(answers.iter().map(|a| a.to_string()).collect())
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Paris  "), "paris");
        assert_eq!(normalize("Paris\n"), "paris");
        assert_eq!(normalize("PaRiS"), "paris");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_basic_is_not_auto_graded() {
        let basic = card(CardType::Basic, "hello", None);
        assert_eq!(grade(&basic, Some("hello")), None);
        assert_eq!(grade(&basic, None), None);
    }

    #[test]
    fn test_multiple_choice() {
        let mc = card(CardType::MultipleChoice, "4", Some(vec!["3", "4", "5"]));
        assert_eq!(grade(&mc, Some("4")), Some(true));
        assert_eq!(grade(&mc, Some(" 4 ")), Some(true));
        assert_eq!(grade(&mc, Some("3")), Some(false));
        assert_eq!(grade(&mc, Some("")), Some(false));
        assert_eq!(grade(&mc, None), Some(false));
    }

    #[test]
    fn test_short_answer_normalization() {
        let sa = card(CardType::ShortAnswer, "Paris", None);
        for answer in [" Paris ", "paris", "PARIS"] {
            assert_eq!(grade(&sa, Some(answer)), Some(true));
        }
        assert_eq!(grade(&sa, Some("London")), Some(false));
    }

    #[test]
    fn test_short_answer_alternatives() {
        let sa = card(
            CardType::ShortAnswer,
            "Washington D.C.",
            Some(vec!["Washington DC", "DC"]),
        );
        assert_eq!(grade(&sa, Some("DC")), Some(true));
        assert_eq!(grade(&sa, Some("washington dc")), Some(true));
        assert_eq!(grade(&sa, Some("Seattle")), Some(false));
    }

    #[test]
    fn test_short_answer_empty_input() {
        let sa = card(CardType::ShortAnswer, "Paris", None);
        assert_eq!(grade(&sa, Some("")), Some(false));
        assert_eq!(grade(&sa, Some("   ")), Some(false));
        assert_eq!(grade(&sa, None), Some(false));
    }

    #[test]
    fn test_cloze_all_blanks_must_match() {
        let card = cloze(vec![one("France"), one("Paris")]);
        assert_eq!(grade(&card, Some(r#"["France", "Paris"]"#)), Some(true));
        assert_eq!(grade(&card, Some(r#"[" france ", "PARIS"]"#)), Some(true));
        assert_eq!(grade(&card, Some(r#"["France", "London"]"#)), Some(false));
        assert_eq!(grade(&card, Some(r#"["Spain", "Paris"]"#)), Some(false));
    }

    #[test]
    fn test_cloze_accepts_alternatives_per_blank() {
        let card = cloze(vec![many(&["Paris", "París"]), many(&["Eiffel", "Eifel"])]);
        assert_eq!(grade(&card, Some(r#"["París", "Eiffel"]"#)), Some(true));
        assert_eq!(grade(&card, Some(r#"["parís", "eifel"]"#)), Some(true));
        assert_eq!(grade(&card, Some(r#"["Paris", "Tower"]"#)), Some(false));
    }

    #[test]
    fn test_cloze_malformed_answers_are_incorrect() {
        let card = cloze(vec![one("France"), one("Paris")]);
        for raw in [
            "",
            "not json",
            "[]",
            r#"["France"]"#,
            r#"["France", "Paris", "Extra"]"#,
            r#"{"0": "France"}"#,
            "[1, 2]",
        ] {
            assert_eq!(grade(&card, Some(raw)), Some(false), "answer {:?}", raw);
        }
        assert_eq!(grade(&card, None), Some(false));
    }

    #[test]
    fn test_cloze_without_blank_data() {
        let card = card(CardType::Cloze, "Paris", None);
        assert_eq!(grade(&card, Some(r#"["Paris"]"#)), Some(false));
    }

    #[test]
    fn test_cloze_with_no_blanks_accepts_empty_list() {
        let card = cloze(vec![]);
        assert_eq!(grade(&card, Some("[]")), Some(true));
        assert_eq!(grade(&card, Some(r#"["Paris"]"#)), Some(false));
        assert_eq!(grade(&card, Some("")), Some(false));
    }

    #[test]
    fn test_grading_is_repeatable() {
        let card = cloze(vec![one("Paris")]);
        let answer = encode_cloze_answer(&["paris"]);
        assert_eq!(grade(&card, Some(&answer)), grade(&card, Some(&answer)));
        assert_eq!(grade(&card, Some(&answer)), Some(true));
    }
}
