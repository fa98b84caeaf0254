//! # Timekeep Server
//!
//! Service layer - wiring and the device push endpoint.
//!
//! This crate contains:
//! - Application context (dependency injection)
//! - The axum router for device pushes
//! - Main entry point and setup
//!
//! ## Architecture
//! - Depends on `common`, `domain`, `core`, and `infra`
//! - Wires up the hexagonal architecture

pub mod context;
pub mod routes;

pub use context::AppContext;
pub use routes::router;
