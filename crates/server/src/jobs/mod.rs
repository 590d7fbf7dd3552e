// crates/server/src/jobs/mod.rs
//! Operation dispatch.
//!
//! Provides:
//! - `Dispatcher`: single-flight admission and execution of backup operations
//! - `JobHandle`: awaitable completion of one dispatched operation

pub mod dispatcher;
pub mod handle;

pub use dispatcher::{Dispatched, Dispatcher};
pub use handle::JobHandle;
