use bytemuck::{Pod, Zeroable};

use crate::coords::Vec2;
use crate::paint::Color;

/// One vertex as laid out in device memory (20 bytes).
///
/// `pos` is in window pixels, top-left origin. `color` is packed RGBA, see
/// [`Color::to_packed`].
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
    pub color: u32,
}

impl Vertex {
    pub const SIZE: u64 = std::mem::size_of::<Vertex>() as u64;

    #[inline]
    pub fn new(pos: Vec2, uv: Vec2, color: Color) -> Self {
        Self {
            pos: pos.to_array(),
            uv: uv.to_array(),
            color: color.to_packed(),
        }
    }

    /// Untextured vertex; the fallback white texture makes `uv` irrelevant.
    #[inline]
    pub fn solid(x: f32, y: f32, color: Color) -> Self {
        Self::new(Vec2::new(x, y), Vec2::zero(), color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_tightly_packed() {
        assert_eq!(Vertex::SIZE, 20);
        assert_eq!(std::mem::align_of::<Vertex>(), 4);
    }

    #[test]
    fn bytes_follow_field_order() {
        let v = Vertex::new(Vec2::new(1.0, 2.0), Vec2::new(0.5, 0.25), Color::WHITE);
        let bytes = bytemuck::bytes_of(&v);
        assert_eq!(&bytes[0..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[12..16], &0.25f32.to_le_bytes());
        assert_eq!(&bytes[16..20], &[0xff; 4]);
    }
}
