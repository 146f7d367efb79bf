use std::collections::VecDeque;
use std::time::Instant;

use kiln_engine::coords::{Extent, Rect};
use kiln_engine::geometry::Batch;
use kiln_engine::paint::Color;
use kiln_engine::renderer::DebugOverlay;

const HISTORY: usize = 120;
const BAR_WIDTH: f32 = 2.0;
const PANEL_HEIGHT: f32 = 60.0;
/// Frame time mapped to the full panel height.
const SCALE_MS: f32 = 33.3;

/// Bar graph of recent frame times in the bottom-left corner.
pub struct FrameMeter {
    samples: VecDeque<f32>,
    last: Option<Instant>,
    extent: Extent,
}

impl Default for FrameMeter {
    fn default() -> Self {
        Self {
            samples: VecDeque::with_capacity(HISTORY),
            last: None,
            extent: Extent::default(),
        }
    }
}

impl DebugOverlay for FrameMeter {
    fn init(&mut self) {
        log::debug!("frame meter enabled");
    }

    fn new_frame(&mut self, extent: Extent) {
        let now = Instant::now();
        if let Some(last) = self.last.replace(now) {
            if self.samples.len() == HISTORY {
                self.samples.pop_front();
            }
            self.samples.push_back(now.duration_since(last).as_secs_f32() * 1000.0);
        }
        self.extent = extent;
    }

    fn end_frame(&mut self) -> Vec<Batch> {
        let bottom = self.extent.height as f32;
        let panel = Rect::new(0.0, bottom - PANEL_HEIGHT, HISTORY as f32 * BAR_WIDTH, PANEL_HEIGHT);

        let mut batches = vec![Batch::quad(panel, Color::new(0.0, 0.0, 0.0, 0.6), panel)];
        for (i, ms) in self.samples.iter().enumerate() {
            let h = (ms / SCALE_MS).min(1.0) * PANEL_HEIGHT;
            let bar = Rect::new(i as f32 * BAR_WIDTH, bottom - h, BAR_WIDTH, h);
            let color = if *ms > 17.0 {
                Color::from_rgba8(230, 80, 60, 255)
            } else {
                Color::from_rgba8(80, 200, 120, 255)
            };
            batches.push(Batch::quad(bar, color, panel));
        }
        batches
    }
}
