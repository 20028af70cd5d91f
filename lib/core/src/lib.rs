//! Core domain types and utilities for amber-lantern.
//!
//! This crate provides the identifier types and the `Result` alias shared by
//! the auth library and the web server.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ParseIdError, SessionId, UserId};
