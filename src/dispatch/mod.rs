//! Job dispatch
//!
//! Pulls queue items for one runtime, runs them through the sandbox and
//! persists exactly one result record per attributable item.

pub mod broker;
pub mod request;
pub mod worker;

pub use broker::{JobQueue, MemoryBroker, RedisBroker, ResultStore};
pub use worker::{PollOutcome, Worker};
