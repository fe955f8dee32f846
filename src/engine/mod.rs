//! Scoring engine: tiers, commissions, celebrations, streaks and the ticker.
//!
//! Everything here is a pure function of its inputs, except the celebration
//! registry which holds per-session state.

mod celebration;
mod streak;
mod ticker;
mod tier;

pub use celebration::*;
pub use streak::*;
pub use ticker::*;
pub use tier::*;
