//! Configuration
//!
//! Shared types, worker settings and startup validation.

pub mod types;
pub mod validator;
pub mod worker;
