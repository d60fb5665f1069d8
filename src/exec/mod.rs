//! Execution control
//!
//! Drives one invocation through the sandbox pipeline.

pub mod executor;

pub use executor::SandboxExecutor;
