//! API module for shared HTTP API functionality
//!
//! # Design Principle
//!
//! This module contains ONLY pure functions with no HTTP framework
//! dependencies. The planner wraps these with axum extractors and middleware.

pub mod auth;

pub use auth::{generate_salt, generate_token, hash_password, verify_password};
