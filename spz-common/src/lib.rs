//! # SPZ Common Library
//!
//! Shared code for the SPZ strategy planner services including:
//! - Database schema, models and initialization
//! - Event types (PlannerEvent) and the EventBus
//! - Credential hashing and token generation
//! - Configuration loading (TOML + root folder resolution)
//! - SSE and time/uuid utilities

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod sse;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
pub use events::{EventBus, PlannerEvent};
