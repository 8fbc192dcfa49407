//! Request handlers.

pub mod admin;
pub mod health;

pub use admin::*;
pub use health::*;
