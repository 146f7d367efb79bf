//! Coordinate and extent types shared by the batcher, devices and backends.
//!
//! Canonical CPU space:
//! - Window pixels (physical)
//! - Origin top-left
//! - +X right, +Y down
//!
//! Devices convert to NDC using the current target extent.

mod extent;
mod rect;
mod vec2;

pub use extent::{Extent, Scissor};
pub use rect::Rect;
pub use vec2::Vec2;
