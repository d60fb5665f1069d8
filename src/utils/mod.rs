//! Utilities
//!
//! Cross-cutting helpers for environment hygiene, output collection and
//! fault diagnostics.

pub mod diagnostics;
pub mod env_hygiene;
pub mod output;
