use super::{Extent, Scissor, Vec2};

/// Axis-aligned rectangle in window pixels (top-left origin).
///
/// Batches carry one as their clip rectangle.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub origin: Vec2,
    pub size: Vec2,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            origin: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    /// Rectangle covering the whole drawable.
    #[inline]
    pub fn full(extent: Extent) -> Self {
        Self::new(0.0, 0.0, extent.width as f32, extent.height as f32)
    }

    #[inline]
    pub fn max(self) -> Vec2 {
        Vec2::new(self.origin.x + self.size.x, self.origin.y + self.size.y)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.size.x <= 0.0 || self.size.y <= 0.0
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.origin.is_finite() && self.size.is_finite()
    }

    /// Normalizes the rectangle so width/height are non-negative.
    #[inline]
    pub fn normalized(self) -> Self {
        let mut x = self.origin.x;
        let mut y = self.origin.y;
        let mut w = self.size.x;
        let mut h = self.size.y;

        if w < 0.0 {
            x += w;
            w = -w;
        }
        if h < 0.0 {
            y += h;
            h = -h;
        }

        Rect::new(x, y, w, h)
    }

    /// Converts the clip rectangle to an integer scissor clamped to `target`.
    ///
    /// Non-finite or fully outside rectangles produce an empty scissor at the
    /// origin; the draw is still recorded but rasterizes nothing.
    pub fn to_scissor(self, target: Extent) -> Scissor {
        if !self.is_finite() {
            return Scissor::default();
        }

        let r = self.normalized();
        let tw = target.width;
        let th = target.height;

        let x = (r.origin.x.max(0.0) as u32).min(tw);
        let y = (r.origin.y.max(0.0) as u32).min(th);
        let x2 = ((r.origin.x + r.size.x).max(0.0) as u32).min(tw);
        let y2 = ((r.origin.y + r.size.y).max(0.0) as u32).min(th);

        Scissor::new(x, y, x2.saturating_sub(x), y2.saturating_sub(y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(x: f32, y: f32, w: f32, h: f32) -> Rect { Rect::new(x, y, w, h) }

    // ── normalized ────────────────────────────────────────────────────────

    #[test]
    fn normalized_negative_width() {
        let n = r(10.0, 0.0, -4.0, 5.0).normalized();
        assert_eq!(n.origin.x, 6.0);
        assert_eq!(n.size.x, 4.0);
    }

    // ── to_scissor ────────────────────────────────────────────────────────

    #[test]
    fn full_window_clip_is_full_scissor() {
        let extent = Extent::new(800, 600);
        assert_eq!(Rect::full(extent).to_scissor(extent), Scissor::full(extent));
    }

    #[test]
    fn scissor_is_clamped_to_target() {
        let s = r(-20.0, 550.0, 100.0, 100.0).to_scissor(Extent::new(800, 600));
        assert_eq!(s, Scissor::new(0, 550, 80, 50));
    }

    #[test]
    fn outside_clip_is_empty_scissor() {
        let s = r(900.0, 10.0, 50.0, 50.0).to_scissor(Extent::new(800, 600));
        assert!(s.is_empty());
    }

    #[test]
    fn non_finite_clip_is_empty_scissor() {
        assert!(r(f32::NAN, 0.0, 10.0, 10.0).to_scissor(Extent::new(8, 8)).is_empty());
    }
}
