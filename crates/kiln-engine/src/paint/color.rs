/// Straight-alpha RGBA color with `f32` channels in `[0, 1]`.
///
/// Vertices carry colors packed into 32 bits (see [`Color::to_packed`]); the
/// float form is used for clear values and construction.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Creates a color from 0-255 components.
    #[inline]
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, a as f32 / 255.0)
    }

    /// Unpacks a vertex color produced by [`Color::to_packed`].
    #[inline]
    pub fn from_packed(packed: u32) -> Self {
        let [r, g, b, a] = packed.to_le_bytes();
        Self::from_rgba8(r, g, b, a)
    }

    /// Packs into the vertex layout: `a << 24 | b << 16 | g << 8 | r`.
    ///
    /// Byte order in memory is R, G, B, A, which is what an `Unorm8x4`
    /// vertex attribute expects.
    #[inline]
    pub fn to_packed(self) -> u32 {
        let c = self.clamped();
        let to_u8 = |v: f32| (v * 255.0).round() as u32;
        (to_u8(c.a) << 24) | (to_u8(c.b) << 16) | (to_u8(c.g) << 8) | to_u8(c.r)
    }

    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite() && self.a.is_finite()
    }

    /// Clamps all channels to `[0, 1]`; NaN becomes 0.
    #[inline]
    pub fn clamped(self) -> Self {
        let c = |v: f32| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        Self::new(c(self.r), c(self.g), c(self.b), c(self.a))
    }
}
