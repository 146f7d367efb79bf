//! Renderer facade: owns one backend, enforces frame pairing and loads
//! textures.

use std::path::Path;

use crate::backend::{Api, Backend, D3dBackend, FramedBackend, ImmediateBackend};
use crate::batch::FlushStats;
use crate::config::RendererConfig;
use crate::device::Device;
use crate::error::{ContractViolation, RenderError};
use crate::geometry::{Batch, BlendDescriptor, BlendHandle, TextureHandle};
use crate::paint::{Color, ImageData, TextureInfo};
use crate::sync::SwapchainState;

mod overlay;

pub use overlay::DebugOverlay;

/// Entry point for the application driver and drawing collaborators.
///
/// ```ignore
/// let mut renderer = Renderer::init(RendererConfig::default(), device)?;
/// if renderer.begin_frame()? {
///     renderer.push(batch)?;
///     renderer.end_frame()?;
/// }
/// renderer.shutdown()?;
/// ```
pub struct Renderer {
    backend: Box<dyn Backend>,
    in_frame: bool,
    overlay: Option<Box<dyn DebugOverlay>>,
}

impl Renderer {
    /// Selects the backend for `config.api`, hands it `device` and
    /// initializes it.
    pub fn init<D: Device + 'static>(config: RendererConfig, device: D) -> Result<Self, RenderError> {
        let api = config.api;
        let backend: Box<dyn Backend> = match api {
            Api::Vulkan => Box::new(FramedBackend::new(device, config)),
            Api::OpenGl => Box::new(ImmediateBackend::new(device, config)),
            Api::D3d => Box::new(D3dBackend),
        };
        Self::with_backend(backend)
    }

    /// Initializes a caller-constructed backend.
    pub fn with_backend(mut backend: Box<dyn Backend>) -> Result<Self, RenderError> {
        backend.init()?;
        log::info!("renderer initialized ({} backend)", backend.api());
        Ok(Self { backend, in_frame: false, overlay: None })
    }

    #[inline]
    pub fn api(&self) -> Api {
        self.backend.api()
    }

    #[inline]
    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    #[inline]
    pub fn state(&self) -> SwapchainState {
        self.backend.state()
    }

    pub fn need_reinit(&self) -> bool {
        self.backend.need_reinit()
    }

    /// Starts a frame. `Ok(false)` means nothing can be drawn right now
    /// (minimized, resizing, GPU busy); skip the frame and try again later.
    pub fn begin_frame(&mut self) -> Result<bool, RenderError> {
        if self.in_frame {
            return Err(ContractViolation::BeginWhileInFrame.into());
        }
        if !self.backend.begin_frame()? {
            return Ok(false);
        }
        self.in_frame = true;

        if let Some(overlay) = self.overlay.as_mut() {
            let extent = self.backend.overlay_new_frame()?;
            overlay.new_frame(extent);
        }
        Ok(true)
    }

    /// Draws everything pushed since `begin_frame` and presents it.
    ///
    /// The frame is ended even when the overlay hands over invalid batches;
    /// it is presented without them and the overlay's error is returned.
    pub fn end_frame(&mut self) -> Result<(), RenderError> {
        if !self.in_frame {
            return Err(ContractViolation::EndWithoutBegin.into());
        }
        self.in_frame = false;

        let overlay = match self.overlay.as_mut() {
            Some(overlay) => self.backend.overlay_end_frame(overlay.end_frame()),
            None => Ok(()),
        };
        self.backend.end_frame()?;
        overlay
    }

    pub fn push(&mut self, batch: Batch) -> Result<(), RenderError> {
        if !self.in_frame {
            return Err(ContractViolation::PushOutsideFrame.into());
        }
        self.backend.push(batch)
    }

    pub fn create_blend_state(&mut self, descriptor: BlendDescriptor) -> Result<BlendHandle, RenderError> {
        self.backend.create_blend_state(descriptor)
    }

    // ── textures ──────────────────────────────────────────────────────────

    pub fn load_texture(&mut self, image: &ImageData) -> Result<TextureHandle, RenderError> {
        self.backend.create_texture(image)
    }

    /// Uploads a raw `width × height × 4` RGBA buffer.
    pub fn load_texture_rgba(&mut self, width: u32, height: u32, pixels: Vec<u8>) -> Result<TextureHandle, RenderError> {
        let image = ImageData::from_rgba(width, height, pixels)?;
        self.load_texture(&image)
    }

    /// Decodes an encoded image (PNG, JPEG, ...) and uploads it.
    pub fn load_texture_bytes(&mut self, bytes: &[u8]) -> Result<TextureHandle, RenderError> {
        let image = ImageData::decode(bytes)?;
        self.load_texture(&image)
    }

    pub fn load_texture_path(&mut self, path: impl AsRef<Path>) -> Result<TextureHandle, RenderError> {
        let image = ImageData::open(path)?;
        self.load_texture(&image)
    }

    pub fn destroy_texture(&mut self, handle: TextureHandle) -> Result<(), RenderError> {
        self.backend.destroy_texture(handle)
    }

    pub fn texture_info(&self, handle: TextureHandle) -> Option<TextureInfo> {
        self.backend.texture_info(handle)
    }

    // ── misc ──────────────────────────────────────────────────────────────

    pub fn set_clear_color(&mut self, color: Color) {
        self.backend.set_clear_color(color);
    }

    pub fn frame_counter(&self) -> u64 {
        self.backend.frame_counter()
    }

    /// Counters from the most recent frame.
    pub fn frame_stats(&self) -> Option<FlushStats> {
        self.backend.last_flush()
    }

    /// Installs `overlay`, replacing (and shutting down) any previous one.
    pub fn set_overlay(&mut self, mut overlay: Box<dyn DebugOverlay>) -> Result<(), RenderError> {
        if self.in_frame {
            return Err(ContractViolation::BeginWhileInFrame.into());
        }
        self.remove_overlay();
        self.backend.overlay_init()?;
        overlay.init();
        self.overlay = Some(overlay);
        Ok(())
    }

    pub fn remove_overlay(&mut self) -> Option<Box<dyn DebugOverlay>> {
        let mut overlay = self.overlay.take()?;
        overlay.shutdown();
        self.backend.overlay_shutdown();
        Some(overlay)
    }

    /// Releases every GPU object. The renderer can be dropped afterwards.
    pub fn shutdown(&mut self) -> Result<(), RenderError> {
        if self.in_frame {
            return Err(ContractViolation::ShutdownDuringFrame.into());
        }
        self.remove_overlay();
        self.backend.shutdown()?;
        log::info!("renderer shut down");
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if self.in_frame || self.backend.state() == SwapchainState::Uninitialized {
            return;
        }
        if let Err(e) = self.shutdown() {
            log::warn!("renderer shutdown on drop failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::coords::{Extent, Rect};
    use crate::device::{HeadlessDevice, HeadlessProbe};
    use crate::error::TextureError;

    const FULL: Extent = Extent::new(320, 240);

    fn renderer(api: Api) -> (Renderer, HeadlessProbe) {
        let device = HeadlessDevice::new(FULL);
        let probe = device.probe();
        let r = Renderer::init(RendererConfig::default().with_api(api), device).unwrap();
        (r, probe)
    }

    fn full_quad() -> Batch {
        Batch::quad(Rect::full(FULL), Color::WHITE, Rect::full(FULL))
    }

    // ── selection ─────────────────────────────────────────────────────────

    #[test]
    fn api_selects_backend() {
        assert_eq!(renderer(Api::Vulkan).0.api(), Api::Vulkan);
        assert_eq!(renderer(Api::OpenGl).0.api(), Api::OpenGl);
    }

    #[test]
    fn d3d_is_unsupported() {
        let config = RendererConfig::default().with_api(Api::D3d);
        let err = Renderer::init(config, HeadlessDevice::new(FULL)).err().unwrap();
        assert!(matches!(err, RenderError::Unsupported(Api::D3d)));
    }

    // ── frame pairing ─────────────────────────────────────────────────────

    #[test]
    fn begin_end_pairing_is_enforced() {
        let (mut r, _) = renderer(Api::Vulkan);
        assert!(matches!(
            r.end_frame(),
            Err(RenderError::Contract(ContractViolation::EndWithoutBegin))
        ));
        assert!(r.begin_frame().unwrap());
        assert!(matches!(
            r.begin_frame(),
            Err(RenderError::Contract(ContractViolation::BeginWhileInFrame))
        ));
        r.end_frame().unwrap();
        assert!(!r.in_frame());
    }

    #[test]
    fn skipped_frame_is_not_in_progress() {
        let (mut r, probe) = renderer(Api::Vulkan);
        probe.set_drawable(Extent::default());
        assert!(!r.begin_frame().unwrap());
        assert!(!r.in_frame());
        assert!(r.end_frame().unwrap_err().is_contract_violation());
    }

    #[test]
    fn two_triangles_one_draw() {
        for api in [Api::Vulkan, Api::OpenGl] {
            let (mut r, probe) = renderer(api);
            assert!(r.begin_frame().unwrap());
            r.push(full_quad()).unwrap();
            r.end_frame().unwrap();

            let draws = probe.last_draws();
            assert_eq!(draws.len(), 1, "{api}");
            assert_eq!(draws[0].indices, 0..6);
            assert_eq!(r.frame_stats().unwrap().draws, 1);
        }
    }

    // ── textures ──────────────────────────────────────────────────────────

    #[test]
    fn texture_loading_paths() {
        let (mut r, probe) = renderer(Api::Vulkan);
        let raw = r.load_texture_rgba(2, 3, vec![7; 24]).unwrap();
        assert_eq!(r.texture_info(raw), Some(TextureInfo { width: 2, height: 3, channels: 4 }));

        let mut png = Vec::new();
        image::RgbaImage::from_raw(1, 1, vec![0, 0, 0, 255])
            .unwrap()
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let decoded = r.load_texture_bytes(&png).unwrap();
        assert_ne!(raw, decoded);

        assert!(r.begin_frame().unwrap());
        r.push(full_quad().with_texture(decoded)).unwrap();
        r.end_frame().unwrap();
        let descriptor = probe.last_draws()[0].texture.unwrap();
        assert_eq!(probe.texture(descriptor).map(|(desc, _)| (desc.width, desc.height)), Some((1, 1)));
    }

    #[test]
    fn short_pixel_buffer_is_rejected() {
        let (mut r, _) = renderer(Api::Vulkan);
        let err = r.load_texture_rgba(4, 4, vec![0; 10]).unwrap_err();
        assert!(matches!(err, RenderError::Texture(TextureError::SizeMismatch { expected: 64, actual: 10 })));
    }

    #[test]
    fn sampler_config_reaches_device() {
        let device = HeadlessDevice::new(FULL);
        let probe = device.probe();
        let config = RendererConfig { sampler: crate::config::SamplerConfig::pixelated(), ..RendererConfig::default() };
        let mut r = Renderer::init(config, device).unwrap();
        let t = r.load_texture(&ImageData::solid(1, 1, Color::WHITE).unwrap()).unwrap();

        assert!(r.begin_frame().unwrap());
        r.push(full_quad().with_texture(t)).unwrap();
        r.end_frame().unwrap();
        let descriptor = probe.last_draws()[0].texture.unwrap();
        let (_, sampler) = probe.texture(descriptor).unwrap();
        assert_eq!(sampler, crate::config::SamplerConfig::pixelated());
    }

    // ── clear color ───────────────────────────────────────────────────────

    #[test]
    fn clear_color_is_recorded() {
        let (mut r, probe) = renderer(Api::Vulkan);
        let teal = Color::from_rgba8(0, 128, 128, 255);
        r.set_clear_color(teal);
        assert!(r.begin_frame().unwrap());
        r.end_frame().unwrap();

        let list = probe.last_submission().unwrap();
        assert!(matches!(
            list.commands()[0],
            crate::device::Command::BeginPass { clear, .. } if clear == teal
        ));
    }

    // ── overlay ───────────────────────────────────────────────────────────

    #[derive(Default)]
    struct Log {
        calls: Vec<&'static str>,
        extent: Option<Extent>,
    }

    struct Corner(Rc<RefCell<Log>>);

    impl DebugOverlay for Corner {
        fn init(&mut self) {
            self.0.borrow_mut().calls.push("init");
        }

        fn new_frame(&mut self, extent: Extent) {
            let mut log = self.0.borrow_mut();
            log.calls.push("new_frame");
            log.extent = Some(extent);
        }

        fn end_frame(&mut self) -> Vec<Batch> {
            self.0.borrow_mut().calls.push("end_frame");
            let r = Rect::new(0.0, 0.0, 16.0, 16.0);
            vec![Batch::quad(r, Color::BLACK, r)]
        }

        fn shutdown(&mut self) {
            self.0.borrow_mut().calls.push("shutdown");
        }
    }

    #[test]
    fn overlay_hooks_wrap_each_frame() {
        let (mut r, probe) = renderer(Api::Vulkan);
        let log = Rc::new(RefCell::new(Log::default()));
        r.set_overlay(Box::new(Corner(Rc::clone(&log)))).unwrap();

        assert!(r.begin_frame().unwrap());
        r.push(full_quad().with_z(50)).unwrap();
        r.end_frame().unwrap();
        r.shutdown().unwrap();

        let log = log.borrow();
        assert_eq!(log.calls, vec!["init", "new_frame", "end_frame", "shutdown"]);
        assert_eq!(log.extent, Some(FULL));
        assert_eq!(probe.last_draws().len(), 2);
        assert_eq!(probe.live_count(), 0);
    }

    struct Broken;

    impl DebugOverlay for Broken {
        fn new_frame(&mut self, _: Extent) {}

        fn end_frame(&mut self) -> Vec<Batch> {
            vec![Batch::new(vec![], vec![], Rect::new(0.0, 0.0, 8.0, 8.0))]
        }
    }

    #[test]
    fn invalid_overlay_batch_still_ends_the_frame() {
        for api in [Api::Vulkan, Api::OpenGl] {
            let (mut r, probe) = renderer(api);
            r.set_overlay(Box::new(Broken)).unwrap();

            assert!(r.begin_frame().unwrap());
            r.push(full_quad()).unwrap();
            assert!(matches!(
                r.end_frame(),
                Err(RenderError::Contract(ContractViolation::EmptyBatch))
            ));
            assert!(!r.in_frame());
            assert_eq!(r.frame_counter(), 1, "{api}");
            assert_eq!(probe.last_draws().len(), 1);

            // the next frame starts normally, with or without the overlay
            assert!(r.begin_frame().unwrap());
            assert!(r.end_frame().is_err());
            r.remove_overlay();
            assert!(r.begin_frame().unwrap());
            r.end_frame().unwrap();
            r.shutdown().unwrap();
            assert_eq!(probe.live_count(), 0);
        }
    }

    // ── shutdown ──────────────────────────────────────────────────────────

    #[test]
    fn drop_releases_device_objects() {
        let (r, probe) = renderer(Api::OpenGl);
        drop(r);
        assert_eq!(probe.live_count(), 0);
    }
}
