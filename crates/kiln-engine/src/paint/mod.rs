//! Color model for vertex tinting and clear values, and decoded image data.

pub mod color;
mod image_data;

pub use color::Color;
pub use image_data::{ImageData, TextureInfo};
