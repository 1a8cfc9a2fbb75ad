//! SM-2 (SuperMemo 2) spaced repetition algorithm implementation.
//!
//! The SM-2 algorithm calculates review intervals based on recall quality:
//! - Quality grades 0-2: repetitions and interval reset (card needs relearning)
//! - Quality grades 3-5: interval grows progressively (1 day → 6 days → EF multiplier)
//! - The easiness factor (EF) is adjusted after every review, whatever the grade,
//!   and never falls below 1.3
//! - The next due date is derived from the new interval

use super::SrsState;
use crate::error::{Result, StudyError};
use chrono::{DateTime, Duration, Utc};

pub const MIN_EASINESS: f64 = 1.3;
pub const MAX_QUALITY: i32 = 5;

/// Checks that a quality rating lies in 0-5. Out-of-range values are rejected, never clamped.
pub fn validate_quality(quality: i32) -> Result<u8> {
    if (0..=MAX_QUALITY).contains(&quality) {
        Ok(quality as u8)
    } else {
        Err(StudyError::InvalidInput(format!(
            "quality must be between 0 and {}, got {}",
            MAX_QUALITY, quality
        )))
    }
}

/// Easiness after a review of the given quality, floored at 1.3.
pub fn next_easiness(easiness: f64, quality: u8) -> f64 {
    let q = 5.0 - quality as f64;
    (easiness + (0.1 - q * (0.08 + q * 0.02))).max(MIN_EASINESS)
}

/// Repetition count and interval (in days) after a review of the given quality.
fn next_schedule(state: &SrsState, quality: u8) -> (u32, u32) {
    if quality < 3 {
        return (0, 1);
    }
    match state.repetitions {
        0 => (1, 1),
        1 => (2, 6),
        reps => {
            // Uses the easiness from before this review's adjustment
            let grown = (state.interval_days as f64 * state.easiness).round();
            (reps.saturating_add(1), (grown as u32).max(1))
        }
    }
}

/// Calculates new review state according to the SM-2 algorithm.
/// quality: 0-5 (0 = complete blackout, 5 = perfect response)
///
/// The input state is left untouched; on an invalid quality nothing is computed.
/// An interval that pushes the due date out of the representable range is `InvalidInput`.
pub fn calculate_next_review(
    state: &SrsState,
    quality: i32,
    now: DateTime<Utc>,
) -> Result<SrsState> {
    let quality = validate_quality(quality)?;
    let (repetitions, interval_days) = next_schedule(state, quality);

    let due_at = Duration::try_days(i64::from(interval_days))
        .and_then(|interval| now.checked_add_signed(interval))
        .ok_or_else(|| {
            StudyError::InvalidInput(format!(
                "interval of {} days for card {} is out of range",
                interval_days, state.card_id
            ))
        })?;

    Ok(SrsState {
        user_id: state.user_id,
        card_id: state.card_id,
        repetitions,
        interval_days,
        easiness: next_easiness(state.easiness, quality),
        due_at,
        last_quality: Some(quality),
    })
}

/// Interval (in days) each quality 0-5 would produce from the given state.
pub fn preview_intervals(state: &SrsState) -> [u32; 6] {
    let mut intervals = [1; 6];
    for (quality, slot) in (0u8..).zip(intervals.iter_mut()) {
        *slot = next_schedule(state, quality).1;
    }
    intervals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(repetitions: u32, interval_days: u32, easiness: f64) -> SrsState {
        SrsState {
            repetitions,
            interval_days,
            easiness,
            ..SrsState::new(1, 1, Utc::now())
        }
    }

    #[test]
    fn test_first_review() {
        let next = calculate_next_review(&state(0, 1, 2.5), 5, Utc::now()).unwrap();
        assert_eq!(next.interval_days, 1);
        assert_eq!(next.repetitions, 1);
        assert_eq!(next.last_quality, Some(5));
    }

    #[test]
    fn test_second_review() {
        let next = calculate_next_review(&state(1, 1, 2.5), 4, Utc::now()).unwrap();
        assert_eq!(next.interval_days, 6);
        assert_eq!(next.repetitions, 2);
    }

    #[test]
    fn test_three_review_scenario() {
        let now = Utc::now();
        let first = calculate_next_review(&SrsState::new(1, 1, now), 5, now).unwrap();
        assert_eq!((first.repetitions, first.interval_days), (1, 1));

        let second = calculate_next_review(&first, 5, now).unwrap();
        assert_eq!((second.repetitions, second.interval_days), (2, 6));

        let third = calculate_next_review(&second, 4, now).unwrap();
        let expected = (6.0 * second.easiness).round() as u32;
        assert_eq!(third.repetitions, 3);
        assert_eq!(third.interval_days, expected);
        assert_eq!(third.interval_days, 16);
    }

    #[test]
    fn test_subsequent_review_uses_easiness() {
        let next = calculate_next_review(&state(2, 6, 2.5), 5, Utc::now()).unwrap();
        assert_eq!(next.repetitions, 3);
        assert_eq!(next.interval_days, 15);
        assert!((next.easiness - 2.6).abs() < 1e-9);
    }

    #[test]
    fn test_quality_below_3_resets() {
        for quality in 0..3 {
            let next = calculate_next_review(&state(5, 40, 2.5), quality, Utc::now()).unwrap();
            assert_eq!(next.interval_days, 1);
            assert_eq!(next.repetitions, 0);
            // EF should still be updated
            assert!(next.easiness < 2.5);
        }
    }

    #[test]
    fn test_ef_floor() {
        let mut current = state(1, 1, 1.3);
        for quality in [0, 1, 2, 0, 3, 0] {
            current = calculate_next_review(&current, quality, Utc::now()).unwrap();
            assert!(current.easiness >= MIN_EASINESS);
        }
        assert_eq!(current.easiness, MIN_EASINESS);
    }

    #[test]
    fn test_interval_never_below_one_when_recalled() {
        let mut current = state(2, 1, MIN_EASINESS);
        for _ in 0..5 {
            let previous = current.interval_days;
            current = calculate_next_review(&current, 3, Utc::now()).unwrap();
            assert!(current.interval_days >= previous.max(1));
        }
    }

    #[test]
    fn test_due_at_follows_new_interval() {
        let now = Utc::now();
        let next = calculate_next_review(&state(1, 1, 2.5), 4, now).unwrap();
        assert_eq!(next.due_at, now + Duration::days(6));
    }

    #[test]
    fn test_invalid_quality_rejected() {
        let current = state(3, 10, 2.2);
        for quality in [-1, 6, 100] {
            let err = calculate_next_review(&current, quality, Utc::now()).unwrap_err();
            assert!(err.is_invalid_input());
        }
        assert_eq!(current.interval_days, 10);
    }

    #[test]
    fn test_preview_intervals() {
        let intervals = preview_intervals(&state(2, 6, 2.5));
        assert_eq!(intervals[..3], [1, 1, 1]);
        assert_eq!(intervals[5], 15);
    }

    #[test]
    fn test_interval_past_date_range_is_rejected() {
        let current = state(5, 60_000_000, 2.5);
        let err = calculate_next_review(&current, 5, Utc::now()).unwrap_err();
        assert!(err.is_invalid_input());

        let huge = state(5, u32::MAX, 2.5);
        assert!(calculate_next_review(&huge, 4, Utc::now()).unwrap_err().is_invalid_input());
        assert_eq!(preview_intervals(&huge)[5], u32::MAX);

        // A lapse brings the interval back into range
        let lapsed = calculate_next_review(&current, 1, Utc::now()).unwrap();
        assert_eq!(lapsed.interval_days, 1);
    }
}
