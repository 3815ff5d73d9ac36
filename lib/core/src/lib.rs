//! Core domain types and utilities for the parlance dialog engine.
//!
//! This crate provides the identifiers, the user record, value helpers and
//! the error-handling foundation shared by every other parlance crate.

pub mod error;
pub mod id;
pub mod user;
pub mod value;

pub use error::Result;
pub use id::{ParseIdError, UpdateId, UserId};
pub use user::User;
pub use value::{is_truthy, normalize_intent};
