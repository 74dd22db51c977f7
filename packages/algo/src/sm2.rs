//! SM-2 scheduler.
//!
//! One review updates one word's `(easiness factor, interval, repetitions)`
//! triple from a 0-5 quality grade. The dictee game grades binary answers, so
//! [`quality_for_answer`] maps correctness onto the two extreme grades; the
//! scheduler itself accepts the full range.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Floor for the easiness factor; SM-2 never lets a word get harder than this.
pub const MIN_EASINESS_FACTOR: f64 = 1.3;

/// Easiness factor assigned to a word that has never been reviewed.
pub const DEFAULT_EASINESS_FACTOR: f64 = 2.5;

/// Highest quality grade.
pub const MAX_QUALITY: u8 = 5;

/// Grades below this count as a failed recall and reset the repetition chain.
pub const PASSING_QUALITY: u8 = 3;

/// Interval after the first successful review, in days.
const FIRST_INTERVAL_DAYS: i64 = 1;

/// Interval after the second successful review, in days.
const SECOND_INTERVAL_DAYS: i64 = 6;

/// Scheduling input rejected before any state is touched.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Sm2Error {
    #[error("quality grade {0} is out of range 0..=5")]
    InvalidQuality(u8),
}

/// Per-word scheduling state carried between reviews.
///
/// `interval_days` is the gap scheduled *after* the most recent review;
/// `repetitions` counts consecutive successful recalls since the last failure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sm2State {
    pub easiness_factor: f64,
    pub interval_days: i64,
    pub repetitions: i32,
}

impl Default for Sm2State {
    fn default() -> Self {
        Self {
            easiness_factor: DEFAULT_EASINESS_FACTOR,
            interval_days: 0,
            repetitions: 0,
        }
    }
}

impl Sm2State {
    pub fn new(easiness_factor: f64, interval_days: i64, repetitions: i32) -> Self {
        Self {
            easiness_factor,
            interval_days,
            repetitions,
        }
    }
}

/// Maps a graded answer to an SM-2 quality: correct is a perfect recall,
/// incorrect (or timed out) is a blackout. No partial credit in this game.
pub fn quality_for_answer(is_correct: bool) -> u8 {
    if is_correct {
        MAX_QUALITY
    } else {
        0
    }
}

/// Applies one review to `state` and returns the next state.
///
/// The easiness factor is updated for every grade, including failures. A
/// failing grade resets the repetition chain and schedules the word for
/// tomorrow; a passing grade extends the chain: 1 day, then 6 days, then the
/// previous interval stretched by the updated easiness factor.
pub fn next_state(state: &Sm2State, quality: u8) -> Result<Sm2State, Sm2Error> {
    if quality > MAX_QUALITY {
        return Err(Sm2Error::InvalidQuality(quality));
    }

    let easiness_factor = next_easiness_factor(state.easiness_factor, quality);

    if quality < PASSING_QUALITY {
        // Failure resets progression but keeps the (lowered) easiness factor.
        return Ok(Sm2State {
            easiness_factor,
            interval_days: FIRST_INTERVAL_DAYS,
            repetitions: 0,
        });
    }

    let repetitions = state.repetitions + 1;
    let interval_days = match repetitions {
        1 => FIRST_INTERVAL_DAYS,
        2 => SECOND_INTERVAL_DAYS,
        _ => (state.interval_days as f64 * easiness_factor).round() as i64,
    };

    Ok(Sm2State {
        easiness_factor,
        interval_days,
        repetitions,
    })
}

fn next_easiness_factor(current: f64, quality: u8) -> f64 {
    let missed = f64::from(MAX_QUALITY - quality);
    let updated = current + (0.1 - missed * (0.08 + missed * 0.02));
    updated.max(MIN_EASINESS_FACTOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_quality() {
        let state = Sm2State::default();
        assert_eq!(next_state(&state, 6), Err(Sm2Error::InvalidQuality(6)));
        assert_eq!(next_state(&state, 255), Err(Sm2Error::InvalidQuality(255)));
    }

    #[test]
    fn perfect_recall_raises_easiness() {
        let state = Sm2State::default();
        let next = next_state(&state, 5).unwrap();
        assert!((next.easiness_factor - 2.6).abs() < 1e-9);
    }

    #[test]
    fn blackout_drops_easiness_by_point_eight() {
        let state = Sm2State::default();
        let next = next_state(&state, 0).unwrap();
        assert!((next.easiness_factor - 1.7).abs() < 1e-9);
    }

    #[test]
    fn easiness_never_drops_below_floor() {
        let mut state = Sm2State::default();
        for _ in 0..10 {
            state = next_state(&state, 0).unwrap();
        }
        assert!((state.easiness_factor - MIN_EASINESS_FACTOR).abs() < 1e-9);
    }

    #[test]
    fn failure_resets_repetitions_and_interval() {
        let state = Sm2State::new(2.5, 42, 7);
        for quality in 0..PASSING_QUALITY {
            let next = next_state(&state, quality).unwrap();
            assert_eq!(next.repetitions, 0);
            assert_eq!(next.interval_days, 1);
        }
    }

    #[test]
    fn success_chain_from_default_is_1_6_17() {
        let mut state = Sm2State::default();
        let mut intervals = Vec::new();
        for _ in 0..3 {
            state = next_state(&state, 5).unwrap();
            intervals.push(state.interval_days);
        }
        // Third review: round(6 * 2.8) with ef = 2.5 + 3 * 0.1.
        assert_eq!(intervals, vec![1, 6, 17]);
    }

    #[test]
    fn third_interval_uses_updated_easiness() {
        let state = Sm2State::new(2.0, 6, 2);
        let next = next_state(&state, 4).unwrap();
        assert_eq!(next.repetitions, 3);
        // ef' = 2.0 + (0.1 - 1 * 0.1) = 2.0, interval = round(6 * 2.0).
        assert_eq!(next.interval_days, 12);
    }

    #[test]
    fn quality_mapping_is_binary() {
        assert_eq!(quality_for_answer(true), 5);
        assert_eq!(quality_for_answer(false), 0);
    }

    #[test]
    fn passing_grade_three_keeps_easiness_shrinking() {
        let state = Sm2State::default();
        let next = next_state(&state, 3).unwrap();
        // 2.5 + (0.1 - 2 * 0.12) = 2.36: a pass, but a strained one.
        assert!((next.easiness_factor - 2.36).abs() < 1e-9);
        assert_eq!(next.repetitions, 1);
        assert_eq!(next.interval_days, 1);
    }
}
