/// Drawable or render-target size in physical pixels.
///
/// A zero width or height is a legal value: windowing reports it while the
/// window is minimized.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` when nothing can be presented at this size.
    #[inline]
    pub const fn is_degenerate(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels covered.
    #[inline]
    pub const fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Integer scissor rectangle in physical pixels, always inside its target.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct Scissor {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Scissor {
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Scissor covering the whole target.
    #[inline]
    pub const fn full(extent: Extent) -> Self {
        Self::new(0, 0, extent.width, extent.height)
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimized_window_is_degenerate() {
        assert!(Extent::new(0, 0).is_degenerate());
        assert!(Extent::new(800, 0).is_degenerate());
        assert!(Extent::new(0, 600).is_degenerate());
        assert!(!Extent::new(1, 1).is_degenerate());
    }

    #[test]
    fn full_scissor_matches_extent() {
        let s = Scissor::full(Extent::new(1280, 720));
        assert_eq!(s, Scissor::new(0, 0, 1280, 720));
        assert!(!s.is_empty());
    }
}
