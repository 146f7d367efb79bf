use std::collections::HashMap;

use crate::batch::{Batcher, FlushStats};
use crate::config::{DrawOrder, RendererConfig};
use crate::device::{DescriptorId, Device, DeviceResult, TextureDesc, TextureParts};
use crate::error::{ContractViolation, RenderError};
use crate::geometry::{Batch, BlendDescriptor, BlendRegistry, TextureHandle};
use crate::paint::{Color, ImageData, TextureInfo};
use crate::sync::DeletionQueue;

struct TextureEntry {
    parts: TextureParts,
    info: TextureInfo,
}

/// State every device-backed variant carries: blend registry, texture table,
/// fallback texture, batcher and frame flags.
pub(crate) struct Shared {
    pub config: RendererConfig,
    pub blends: BlendRegistry,
    textures: HashMap<TextureHandle, TextureEntry>,
    next_texture: u32,
    /// Descriptor of the 1×1 opaque white texture bound by untextured batches.
    fallback: Option<DescriptorId>,
    pub batcher: Batcher,
    pub clear: Color,
    pub overlay: bool,
    pub recording: bool,
    pub last_flush: Option<FlushStats>,
}

impl Shared {
    pub fn new(config: RendererConfig, order: DrawOrder) -> Self {
        let mut blends = BlendRegistry::new();
        blends.register(BlendDescriptor::ALPHA);
        Self {
            clear: config.clear_color,
            config,
            blends,
            textures: HashMap::new(),
            next_texture: 0,
            fallback: None,
            batcher: Batcher::new(order),
            overlay: false,
            recording: false,
            last_flush: None,
        }
    }

    /// Uploads the fallback texture and hands its parts to `owner`.
    pub fn create_fallback<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        owner: &mut DeletionQueue,
    ) -> DeviceResult<()> {
        let parts = device.create_texture(TextureDesc { width: 1, height: 1 }, &[255; 4], &self.config.sampler)?;
        owner.extend(parts.resources());
        self.fallback = Some(parts.descriptor);
        Ok(())
    }

    /// Checks a batch against live objects and returns the descriptor to bind.
    pub fn resolve(&self, batch: &Batch) -> Result<DescriptorId, RenderError> {
        batch.validate()?;
        if !self.blends.contains(batch.blend) {
            return Err(ContractViolation::UnknownBlendState(batch.blend).into());
        }
        match batch.texture {
            Some(handle) => self
                .textures
                .get(&handle)
                .map(|e| e.parts.descriptor)
                .ok_or_else(|| ContractViolation::UnknownTexture(handle).into()),
            None => self.fallback.ok_or(RenderError::NotInitialized),
        }
    }

    pub fn push(&mut self, batch: Batch) -> Result<(), RenderError> {
        if !self.recording {
            return Err(ContractViolation::PushOutsideFrame.into());
        }
        let descriptor = self.resolve(&batch)?;
        self.batcher.push(batch, descriptor);
        Ok(())
    }

    pub fn push_overlay(&mut self, batches: Vec<Batch>) -> Result<(), RenderError> {
        self.require_overlay_frame()?;
        let descriptors = batches.iter().map(|b| self.resolve(b)).collect::<Result<Vec<_>, _>>()?;
        for (batch, descriptor) in batches.into_iter().zip(descriptors) {
            self.batcher.push_overlay(batch, descriptor);
        }
        Ok(())
    }

    pub fn require_overlay_frame(&self) -> Result<(), ContractViolation> {
        if !self.overlay {
            return Err(ContractViolation::OverlayNotInitialized);
        }
        if !self.recording {
            return Err(ContractViolation::PushOutsideFrame);
        }
        Ok(())
    }

    pub fn create_texture<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        image: &ImageData,
    ) -> Result<TextureHandle, RenderError> {
        let desc = TextureDesc { width: image.width(), height: image.height() };
        let parts = device.create_texture(desc, image.pixels(), &self.config.sampler)?;

        self.next_texture += 1;
        let handle = TextureHandle(self.next_texture);
        self.textures.insert(handle, TextureEntry { parts, info: TextureInfo::from(image) });
        log::debug!("{handle} created: {}x{}", image.width(), image.height());
        Ok(handle)
    }

    /// Removes a texture from the table; the caller schedules its parts.
    pub fn take_texture(&mut self, handle: TextureHandle) -> Result<TextureParts, ContractViolation> {
        self.textures
            .remove(&handle)
            .map(|e| e.parts)
            .ok_or(ContractViolation::UnknownTexture(handle))
    }

    pub fn texture_info(&self, handle: TextureHandle) -> Option<TextureInfo> {
        self.textures.get(&handle).map(|e| e.info)
    }

    /// Removes every live texture, oldest first.
    pub fn drain_textures(&mut self) -> Vec<TextureParts> {
        let mut entries: Vec<_> = self.textures.drain().collect();
        entries.sort_by_key(|(handle, _)| *handle);
        entries.into_iter().map(|(_, e)| e.parts).collect()
    }

    /// Forgets per-init state after shutdown.
    pub fn reset(&mut self) {
        self.fallback = None;
        self.overlay = false;
        self.recording = false;
        self.batcher.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{Extent, Rect};
    use crate::device::HeadlessDevice;
    use crate::geometry::BlendHandle;

    fn shared() -> (Shared, HeadlessDevice) {
        let mut d = HeadlessDevice::new(Extent::new(64, 64));
        let mut s = Shared::new(RendererConfig::default(), DrawOrder::ZOrder);
        let mut owner = DeletionQueue::new();
        s.create_fallback(&mut d, &mut owner).unwrap();
        (s, d)
    }

    fn quad() -> Batch {
        Batch::quad(Rect::new(0.0, 0.0, 4.0, 4.0), Color::WHITE, Rect::new(0.0, 0.0, 64.0, 64.0))
    }

    #[test]
    fn default_blend_is_registered() {
        let (s, _) = shared();
        assert_eq!(s.blends.get(BlendHandle::DEFAULT), Some(&BlendDescriptor::ALPHA));
    }

    #[test]
    fn untextured_batch_binds_fallback() {
        let (s, _) = shared();
        assert_eq!(s.resolve(&quad()).ok(), s.fallback);
    }

    #[test]
    fn destroyed_texture_is_rejected() {
        let (mut s, mut d) = shared();
        let img = ImageData::solid(2, 2, Color::WHITE).unwrap();
        let t = s.create_texture(&mut d, &img).unwrap();
        assert!(s.resolve(&quad().with_texture(t)).is_ok());

        s.take_texture(t).unwrap();
        let err = s.resolve(&quad().with_texture(t)).unwrap_err();
        assert!(matches!(err, RenderError::Contract(ContractViolation::UnknownTexture(h)) if h == t));
    }

    #[test]
    fn push_requires_recording() {
        let (mut s, _) = shared();
        assert!(matches!(
            s.push(quad()),
            Err(RenderError::Contract(ContractViolation::PushOutsideFrame))
        ));
        s.recording = true;
        assert!(s.push(quad()).is_ok());
        assert_eq!(s.batcher.len(), 1);
    }

    #[test]
    fn unknown_blend_is_rejected() {
        let (mut s, _) = shared();
        s.recording = true;
        let err = s.push(quad().with_blend(BlendHandle(7))).unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn overlay_batches_need_overlay_init() {
        let (mut s, _) = shared();
        s.recording = true;
        assert!(matches!(
            s.push_overlay(vec![quad()]),
            Err(RenderError::Contract(ContractViolation::OverlayNotInitialized))
        ));
        s.overlay = true;
        assert!(s.push_overlay(vec![quad()]).is_ok());
    }

    #[test]
    fn invalid_overlay_batch_queues_nothing() {
        let (mut s, _) = shared();
        s.recording = true;
        s.overlay = true;
        let empty = Batch::new(vec![], vec![], Rect::new(0.0, 0.0, 8.0, 8.0));
        assert!(matches!(
            s.push_overlay(vec![quad(), empty]),
            Err(RenderError::Contract(ContractViolation::EmptyBatch))
        ));
        assert!(s.batcher.is_empty());
    }
}
