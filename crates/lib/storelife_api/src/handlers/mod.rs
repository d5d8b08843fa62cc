//! Request handlers.

pub mod auth;
pub mod directory;
pub mod entities;
pub mod health;
