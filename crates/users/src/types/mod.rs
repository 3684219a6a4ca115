//! Shared types for the account services.

pub mod errors;

pub use errors::*;
