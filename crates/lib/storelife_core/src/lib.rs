//! # storelife_core
//!
//! Core domain logic for Storelife: token sessions, status rules for store
//! preparation entities, and the WeCom directory mirror.

pub mod auth;
pub mod directory;
pub mod entities;
pub mod error;
pub mod migrate;
pub mod models;
pub mod status;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
