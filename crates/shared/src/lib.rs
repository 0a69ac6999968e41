//! ChatDesk Shared Types and Utilities
//!
//! This crate contains the chat domain types, the persistence error type, and
//! database helpers shared across the ChatDesk services.

pub mod db;
pub mod error;
pub mod types;

pub use db::*;
pub use error::*;
pub use types::*;
