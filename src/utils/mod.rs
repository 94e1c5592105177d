//! Utility functions shared across the parsers and the mutation engine.

mod cancel;
mod math;

pub use cancel::CancellationToken;
pub use math::{align_down, align_up, to_u32, to_usize};
