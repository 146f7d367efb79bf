mod overlay;

use anyhow::Result;

use kiln_engine::config::SamplerConfig;
use kiln_engine::coords::Rect;
use kiln_engine::core::{App, AppControl, FrameCtx};
use kiln_engine::geometry::{Batch, BlendDescriptor, BlendHandle, TextureHandle};
use kiln_engine::logging::{init_logging, LoggingConfig};
use kiln_engine::paint::{Color, ImageData};
use kiln_engine::window::{Runtime, RuntimeConfig};
use kiln_engine::{Renderer, RendererConfig};

use overlay::FrameMeter;

const CHECKER: u32 = 8;

/// Animated quads over a checkerboard, with an additive glow and a frame
/// meter overlay.
#[derive(Default)]
struct Demo {
    checker: Option<TextureHandle>,
    additive: Option<BlendHandle>,
}

fn checkerboard() -> Result<ImageData> {
    let mut pixels = Vec::with_capacity((CHECKER * CHECKER * 4) as usize);
    for y in 0..CHECKER {
        for x in 0..CHECKER {
            let v = if (x + y) % 2 == 0 { 0x30 } else { 0x50 };
            pixels.extend_from_slice(&[v, v, v + 0x10, 0xff]);
        }
    }
    Ok(ImageData::from_rgba(CHECKER, CHECKER, pixels)?)
}

impl App for Demo {
    fn on_start(&mut self, renderer: &mut Renderer) -> Result<()> {
        self.checker = Some(renderer.load_texture(&checkerboard()?)?);
        self.additive = Some(renderer.create_blend_state(BlendDescriptor::ADDITIVE)?);
        renderer.set_clear_color(Color::from_rgba8(12, 12, 18, 255));
        renderer.set_overlay(Box::new(FrameMeter::default()))?;
        Ok(())
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_>) -> AppControl {
        let full = ctx.full_rect();
        let t = ctx.elapsed.as_secs_f32();

        let mut batches = Vec::new();
        if let Some(checker) = self.checker {
            batches.push(Batch::quad(full, Color::WHITE, full).with_texture(checker).with_z(-1));
        }

        for i in 0..6 {
            let phase = t + i as f32 * 0.9;
            let x = full.origin.x + (full.size.x - 120.0) * (0.5 + 0.45 * phase.sin());
            let y = full.origin.y + (full.size.y - 120.0) * (0.5 + 0.45 * (phase * 1.3).cos());
            let hue = i as f32 / 6.0;
            let color = Color::new(hue, 1.0 - hue, 0.6, 0.8);
            let quad = Batch::quad(Rect::new(x, y, 120.0, 120.0), color, full).with_z(i);
            batches.push(quad);

            if let Some(additive) = self.additive {
                let glow = Rect::new(x - 20.0, y - 20.0, 160.0, 160.0);
                let tint = Color::new(hue * 0.3, 0.1, 0.3, 0.4);
                batches.push(Batch::quad(glow, tint, full).with_blend(additive).with_z(i));
            }
        }

        for batch in batches {
            if let Err(e) = ctx.push(batch) {
                log::error!("push failed: {e}");
                return AppControl::Exit;
            }
        }
        AppControl::Continue
    }

    fn on_exit(&mut self, renderer: &mut Renderer) {
        if let Some(stats) = renderer.frame_stats() {
            log::info!(
                "{} frames, last frame: {} draws, {} vertices",
                renderer.frame_counter(),
                stats.draws,
                stats.vertices
            );
        }
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let config = RuntimeConfig {
        title: "kiln demo".to_string(),
        renderer: RendererConfig {
            sampler: SamplerConfig::pixelated(),
            ..RendererConfig::default()
        },
        ..RuntimeConfig::default()
    };

    Runtime::run(config, Demo::default())
}
