//! Draw-submission batcher.

mod batcher;

pub use batcher::{Batcher, FlushStats, FlushTarget};
