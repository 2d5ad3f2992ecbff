//! Core types and trait definitions for the Popcorn movie database.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! holds the contribution/moderation state machine as pure functions over an
//! explicitly loaded [`ledger::MovieRecord`]; storage backends wrap those
//! functions in their own transactions.

#![allow(async_fn_in_trait)]

pub mod content;
pub mod contribution;
pub mod engine;
pub mod error;
pub mod field;
pub mod ledger;
pub mod movie;
pub mod permission;
pub mod store;
pub mod user;
pub mod verification;

#[cfg(test)]
mod test_support;

pub use error::{Error, ErrorKind, ResourceError, Result};
