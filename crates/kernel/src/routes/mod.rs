//! HTTP route handlers.

pub mod health;
pub mod reports;
pub mod topics;
