//! Derived, never-stored views of a generation session: which part of the
//! text is reasoning, which part is the reply, and how fast it is arriving.

pub mod throughput;
pub mod zones;

pub use throughput::tokens_per_second;
pub use zones::{segment_text, TextSegments};
