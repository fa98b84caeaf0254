//! Time abstractions
//!
//! - **[`clock`]**: wall-clock source that can be pinned in tests

pub mod clock;

pub use clock::{Clock, MockClock, SystemClock};
