//! Persistence gateway
//!
//! Two credential tiers over the same SQLite pool:
//! - [`UserStore`]: restricted, bound to one user id
//! - [`AdminStore`]: unrestricted, admin handlers only
//!
//! [`AuthStore`] covers identities, sessions and recovery tokens for the
//! sign-in flows that run before a user is known.

pub mod admin;
pub mod auth;
pub mod reference;
pub mod user;

pub use admin::{AdminStore, DeletionReport};
pub use auth::{AuthStore, NewUser};
pub use user::{Contact, UnreadCount, UserStore};
