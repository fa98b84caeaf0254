//! Shared test helpers for `timekeep-core` integration tests.
//!
//! In-memory port implementations plus a [`fixtures::Harness`] that wires
//! every service the way the server does, so tests can drive whole flows.

#![allow(dead_code)]

pub mod fixtures;
pub mod repositories;
