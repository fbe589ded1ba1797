//! The event dispatcher: a pure `(tables, event) -> (tables, effects)`
//! reduction. All branching on event types lives here so it can be tested
//! without a live channel.

pub mod reducer;
pub mod tables;


pub use reducer::{reduce, replay, Effect, Reduction, ResyncReason};
pub use tables::{LiveTables, PendingArtifacts};
