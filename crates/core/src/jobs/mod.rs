//! Typed background jobs

pub mod dispatcher;
pub mod ports;

pub use dispatcher::{JobDispatcher, JobReport};
pub use ports::JobStateRepository;
