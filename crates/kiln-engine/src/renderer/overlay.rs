use crate::coords::Extent;
use crate::geometry::Batch;

/// Debug overlay drawn on top of every frame.
///
/// The renderer calls `new_frame` after a successful `begin_frame` and
/// collects `end_frame`'s batches just before the frame is submitted. Overlay
/// batches ignore z order and draw after everything else.
pub trait DebugOverlay {
    fn init(&mut self) {}

    fn new_frame(&mut self, extent: Extent);

    fn end_frame(&mut self) -> Vec<Batch>;

    fn shutdown(&mut self) {}
}
