//! Shared fixtures and assertions for ALK-RECON tests.

pub mod assertions;
pub mod fixtures;

pub use pretty_assertions;
