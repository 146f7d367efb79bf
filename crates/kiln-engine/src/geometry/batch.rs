use core::cmp::Ordering;

use crate::coords::{Rect, Vec2};
use crate::error::ContractViolation;
use crate::paint::Color;

use super::{BlendHandle, TextureHandle, Vertex};

/// Fragment shader path used by a batch.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum FragmentVariant {
    /// Vertex color only.
    #[default]
    Solid,
    /// Vertex color multiplied by the bound texture.
    Image,
}

impl FragmentVariant {
    pub const ALL: [FragmentVariant; 2] = [FragmentVariant::Solid, FragmentVariant::Image];
}

/// Z-ordering key for batches.
///
/// Higher values are drawn later (on top). Batches without a key sort as 0.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct ZIndex(pub i32);

impl ZIndex {
    #[inline]
    pub const fn new(v: i32) -> Self {
        Self(v)
    }
}

impl Ord for ZIndex {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for ZIndex {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One draw submission.
///
/// Ownership moves into the backend on push and the batch is dropped once its
/// frame's draws are recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u16>,
    /// Scissor rect in window pixels.
    pub clip: Rect,
    /// `None` binds the 1×1 white fallback texture.
    pub texture: Option<TextureHandle>,
    pub blend: BlendHandle,
    pub variant: FragmentVariant,
    pub z: Option<ZIndex>,
}

impl Batch {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u16>, clip: Rect) -> Self {
        Self {
            vertices,
            indices,
            clip,
            texture: None,
            blend: BlendHandle::DEFAULT,
            variant: FragmentVariant::Solid,
            z: None,
        }
    }

    /// Axis-aligned quad (two triangles) with full `0..1` texture coordinates.
    pub fn quad(rect: Rect, color: Color, clip: Rect) -> Self {
        let r = rect.normalized();
        let min = r.origin;
        let max = r.max();
        let vertices = vec![
            Vertex::new(min, Vec2::new(0.0, 0.0), color),
            Vertex::new(Vec2::new(max.x, min.y), Vec2::new(1.0, 0.0), color),
            Vertex::new(max, Vec2::new(1.0, 1.0), color),
            Vertex::new(Vec2::new(min.x, max.y), Vec2::new(0.0, 1.0), color),
        ];
        Self::new(vertices, vec![0, 1, 2, 0, 2, 3], clip)
    }

    /// Binds `texture` and switches to the image fragment path.
    pub fn with_texture(mut self, texture: TextureHandle) -> Self {
        self.texture = Some(texture);
        self.variant = FragmentVariant::Image;
        self
    }

    pub fn with_blend(mut self, blend: BlendHandle) -> Self {
        self.blend = blend;
        self
    }

    pub fn with_variant(mut self, variant: FragmentVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_z(mut self, z: i32) -> Self {
        self.z = Some(ZIndex::new(z));
        self
    }

    #[inline]
    pub fn sort_key(&self) -> ZIndex {
        self.z.unwrap_or_default()
    }

    #[inline]
    pub fn vertex_bytes(&self) -> u64 {
        self.vertices.len() as u64 * Vertex::SIZE
    }

    #[inline]
    pub fn index_bytes(&self) -> u64 {
        self.indices.len() as u64 * std::mem::size_of::<u16>() as u64
    }

    /// Checks the geometry is drawable: non-empty, addressable with 16-bit
    /// indices, and every index inside the vertex list.
    pub fn validate(&self) -> Result<(), ContractViolation> {
        if self.vertices.is_empty() || self.indices.is_empty() {
            return Err(ContractViolation::EmptyBatch);
        }
        if self.vertices.len() > usize::from(u16::MAX) + 1 {
            return Err(ContractViolation::TooManyVertices { count: self.vertices.len() });
        }
        if let Some(&index) = self.indices.iter().find(|&&i| usize::from(i) >= self.vertices.len()) {
            return Err(ContractViolation::IndexOutOfRange {
                index,
                vertex_count: self.vertices.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_is_two_triangles() {
        let b = Batch::quad(Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(b.vertices.len(), 4);
        assert_eq!(b.indices.len(), 6);
        assert_eq!(b.variant, FragmentVariant::Solid);
        assert!(b.validate().is_ok());
    }

    #[test]
    fn texture_switches_to_image_variant() {
        let b = Batch::quad(Rect::default(), Color::WHITE, Rect::default()).with_texture(TextureHandle(3));
        assert_eq!(b.texture, Some(TextureHandle(3)));
        assert_eq!(b.variant, FragmentVariant::Image);
    }

    #[test]
    fn empty_batch_is_rejected() {
        let b = Batch::new(Vec::new(), Vec::new(), Rect::default());
        assert_eq!(b.validate(), Err(ContractViolation::EmptyBatch));
    }

    #[test]
    fn dangling_index_is_rejected() {
        let v = Vertex::solid(0.0, 0.0, Color::WHITE);
        let b = Batch::new(vec![v; 3], vec![0, 1, 3], Rect::default());
        assert_eq!(
            b.validate(),
            Err(ContractViolation::IndexOutOfRange { index: 3, vertex_count: 3 })
        );
    }

    #[test]
    fn missing_z_sorts_as_zero() {
        let b = Batch::quad(Rect::default(), Color::WHITE, Rect::default());
        assert_eq!(b.sort_key(), ZIndex(0));
        assert_eq!(b.with_z(-2).sort_key(), ZIndex(-2));
    }
}
