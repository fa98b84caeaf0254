//! Observability setup
//!
//! Structured logging through `tracing`. Engine and job events are emitted
//! as tracing events, so installing the subscriber here is the only wiring
//! a binary needs.

pub mod logging;

pub use logging::init;
