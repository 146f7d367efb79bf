use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::config::RendererConfig;
use crate::core::{App, AppControl, FrameCtx};
use crate::device::{DeviceInit, NativeSurface, WgpuDevice};
use crate::renderer::Renderer;

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    pub renderer: RendererConfig,
    pub device: DeviceInit,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "kiln".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
            renderer: RendererConfig::default(),
            device: DeviceInit::default(),
        }
    }
}

/// Entry point for the runtime.
///
/// Opens one window, drives one frame per redraw and shuts the renderer down
/// when the window closes. Resize and minimize need no handling here: the
/// renderer notices the drawable size change at its next `begin_frame`.
pub struct Runtime;

impl Runtime {
    pub fn run<A>(config: RuntimeConfig, app: A) -> Result<()>
    where
        A: 'static + App,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.failure.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

struct WindowEntry {
    window: Arc<Window>,
    renderer: Renderer,
}

struct AppState<A>
where
    A: App + 'static,
{
    config: RuntimeConfig,
    app: A,
    entry: Option<WindowEntry>,
    started: Instant,
    exit_requested: bool,
    failure: Option<anyhow::Error>,
}

impl<A> AppState<A>
where
    A: App + 'static,
{
    fn new(config: RuntimeConfig, app: A) -> Self {
        Self {
            config,
            app,
            entry: None,
            started: Instant::now(),
            exit_requested: false,
            failure: None,
        }
    }

    fn create_window_entry(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );

        let surface: Arc<dyn NativeSurface> = window.clone();
        let device = pollster::block_on(WgpuDevice::new(surface, self.config.device.clone()))
            .context("GPU initialization failed for window")?;
        let mut renderer = Renderer::init(self.config.renderer.clone(), device)
            .context("renderer initialization failed")?;

        self.app
            .on_start(&mut renderer)
            .context("application start failed")?;

        window.request_redraw();
        self.entry = Some(WindowEntry { window, renderer });
        Ok(())
    }

    fn destroy_window_entry(&mut self) {
        let Some(mut entry) = self.entry.take() else {
            return;
        };
        self.app.on_exit(&mut entry.renderer);
        if let Err(e) = entry.renderer.shutdown() {
            log::error!("renderer shutdown failed: {e}");
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        self.failure.get_or_insert(error);
        self.request_exit(event_loop);
    }

    fn request_exit(&mut self, event_loop: &ActiveEventLoop) {
        self.exit_requested = true;
        self.destroy_window_entry();
        event_loop.exit();
    }

    /// Runs one frame. Returns `Ok(false)` when the app asked to exit.
    fn redraw(&mut self) -> Result<bool> {
        let Some(entry) = self.entry.as_mut() else {
            return Ok(true);
        };

        if !entry.renderer.begin_frame()? {
            return Ok(true);
        }

        let extent = entry.window.drawable_size();
        let frame_index = entry.renderer.frame_counter();
        let control = {
            let mut ctx = FrameCtx {
                renderer: &mut entry.renderer,
                extent,
                elapsed: self.started.elapsed(),
                frame_index,
            };
            self.app.on_frame(&mut ctx)
        };

        entry.renderer.end_frame()?;
        Ok(control == AppControl::Continue)
    }
}

impl<A> ApplicationHandler for AppState<A>
where
    A: App + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() || self.exit_requested {
            return;
        }

        if let Err(e) = self.create_window_entry(event_loop) {
            self.fail(event_loop, e.context("failed to create initial window"));
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        event_loop.set_control_flow(ControlFlow::Wait);

        // Continuous redraw.
        if let Some(entry) = &self.entry {
            entry.window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }
        if self.entry.as_ref().map(|e| e.window.id()) != Some(window_id) {
            return;
        }

        if self.app.on_window_event(&event) == AppControl::Exit {
            self.request_exit(event_loop);
            return;
        }

        match event {
            WindowEvent::CloseRequested => self.request_exit(event_loop),

            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(entry) = &self.entry {
                    entry.window.request_redraw();
                }
            }

            WindowEvent::RedrawRequested => match self.redraw() {
                Ok(true) => {}
                Ok(false) => self.request_exit(event_loop),
                Err(e) => self.fail(event_loop, e.context("frame failed")),
            },

            _ => {}
        }
    }
}
