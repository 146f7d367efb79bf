use std::fmt;

/// Opaque reference to a registered blend state.
///
/// Handles are issued by the active backend in registration order and stay
/// valid for the lifetime of the renderer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct BlendHandle(pub(crate) u32);

impl BlendHandle {
    /// Straight-alpha "over" blending, registered by every backend at init.
    pub const DEFAULT: Self = Self(0);

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl Default for BlendHandle {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for BlendHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blend#{}", self.0)
    }
}

/// Opaque reference to an uploaded texture.
///
/// Valid until passed to `destroy_texture`. Ids are never reused within a
/// renderer's lifetime.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub(crate) u32);

impl TextureHandle {
    #[inline]
    pub const fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "texture#{}", self.0)
    }
}
