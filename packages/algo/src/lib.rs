//! # dictee-algo - spaced-repetition scheduling
//!
//! Pure Rust implementation of the SM-2 review scheduler used by the dictee
//! learning engine:
//!
//! - **SM-2** - per-word easiness factor, repetition chain, and review
//!   interval, updated from a 0-5 quality grade
//!
//! Design goals:
//! - **Pure** - no clock, no I/O, no allocation; every function is a
//!   deterministic map from inputs to outputs
//! - **Reusable** - nothing in this crate knows about sessions, storage, or
//!   users
//! - **Tested** - unit tests next to the code, property tests in `tests/`
//!
//! ## Modules
//!
//! - [`sm2`] - scheduler state, quality mapping, and the `next_state` step
//!
//! ## Example
//!
//! ```rust
//! use dictee_algo::{next_state, quality_for_answer, Sm2State};
//!
//! let state = Sm2State::default();
//! let after = next_state(&state, quality_for_answer(true)).unwrap();
//! assert_eq!(after.interval_days, 1);
//! assert_eq!(after.repetitions, 1);
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod sm2;

// ============================================================================
// Re-exports
// ============================================================================

pub use sm2::*;
