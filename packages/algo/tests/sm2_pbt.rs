//! Property-Based Tests for the SM-2 scheduler
//!
//! Tests the following invariants:
//! - Failing grades always reset the repetition chain to (0, 1 day)
//! - The easiness factor never falls below its floor
//! - Passing grades always extend the repetition chain by exactly one
//! - The scheduler is a pure function: same input, same output

use proptest::prelude::*;

use dictee_algo::{
    next_state, quality_for_answer, Sm2State, MIN_EASINESS_FACTOR, PASSING_QUALITY,
};

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_easiness() -> impl Strategy<Value = f64> {
    (1300u64..=4000u64).prop_map(|v| v as f64 / 1000.0)
}

fn arb_state() -> impl Strategy<Value = Sm2State> {
    (arb_easiness(), 0i64..=10_000i64, 0i32..=1_000i32)
        .prop_map(|(easiness_factor, interval_days, repetitions)| Sm2State {
            easiness_factor,
            interval_days,
            repetitions,
        })
}

fn arb_quality() -> impl Strategy<Value = u8> {
    0u8..=5u8
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// Any failing grade resets progression regardless of prior state.
    #[test]
    fn failing_grade_resets_progression(state in arb_state(), quality in 0u8..PASSING_QUALITY) {
        let next = next_state(&state, quality).unwrap();
        prop_assert_eq!(next.repetitions, 0);
        prop_assert_eq!(next.interval_days, 1);
    }

    /// The easiness factor stays at or above the floor for every grade.
    #[test]
    fn easiness_respects_floor(state in arb_state(), quality in arb_quality()) {
        let next = next_state(&state, quality).unwrap();
        prop_assert!(next.easiness_factor >= MIN_EASINESS_FACTOR - 1e-12);
    }

    /// A passing grade extends the chain by exactly one repetition.
    #[test]
    fn passing_grade_extends_chain(state in arb_state(), quality in PASSING_QUALITY..=5u8) {
        let next = next_state(&state, quality).unwrap();
        prop_assert_eq!(next.repetitions, state.repetitions + 1);
    }

    /// Intervals are always at least one day once a word has been reviewed.
    #[test]
    fn intervals_are_at_least_one_day(state in arb_state(), quality in arb_quality()) {
        // The stretched branch multiplies the prior interval, so feed it a
        // state a real session could produce (interval >= 1 once reps > 0).
        let state = if state.repetitions >= 2 && state.interval_days == 0 {
            Sm2State { interval_days: 1, ..state }
        } else {
            state
        };
        let next = next_state(&state, quality).unwrap();
        prop_assert!(next.interval_days >= 1);
    }

    /// Same input, same output: the step is deterministic.
    #[test]
    fn step_is_deterministic(state in arb_state(), quality in arb_quality()) {
        let a = next_state(&state, quality).unwrap();
        let b = next_state(&state, quality).unwrap();
        prop_assert_eq!(a, b);
    }

    /// Grades above 5 are rejected without panicking for any state.
    #[test]
    fn out_of_range_grades_are_rejected(state in arb_state(), quality in 6u8..=255u8) {
        prop_assert!(next_state(&state, quality).is_err());
    }

    /// State round-trips through its serde representation.
    #[test]
    fn state_serde_roundtrip(state in arb_state()) {
        let json = serde_json::to_value(&state).unwrap();
        let restored: Sm2State = serde_json::from_value(json).unwrap();
        prop_assert!((state.easiness_factor - restored.easiness_factor).abs() < 1e-12);
        prop_assert_eq!(state.interval_days, restored.interval_days);
        prop_assert_eq!(state.repetitions, restored.repetitions);
    }
}

// ============================================================================
// Additional Unit Tests for Edge Cases
// ============================================================================

#[test]
fn binary_grading_covers_both_branches() {
    let state = Sm2State::default();
    let pass = next_state(&state, quality_for_answer(true)).unwrap();
    let fail = next_state(&state, quality_for_answer(false)).unwrap();
    assert_eq!(pass.repetitions, 1);
    assert_eq!(fail.repetitions, 0);
}

#[test]
fn long_success_run_keeps_growing() {
    let mut state = Sm2State::default();
    let mut last = 0;
    for _ in 0..12 {
        state = next_state(&state, 5).unwrap();
        assert!(state.interval_days >= last);
        last = state.interval_days;
    }
    assert!(state.interval_days > 365);
}
