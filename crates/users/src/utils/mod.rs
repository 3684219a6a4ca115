//! Password hashing, tokens and input validation.

pub mod jwt;
pub mod password;
pub mod validation;

pub use jwt::*;
pub use password::*;
pub use validation::*;
