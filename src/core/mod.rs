//! Language-agnostic process core.
//!
//! Core owns spawning, wall-clock enforcement and output capture for one
//! child. Language-specific compile/run logic lives in judge adapters.

pub mod supervisor;
pub mod types;
