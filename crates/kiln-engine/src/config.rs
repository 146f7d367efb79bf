//! Renderer configuration.

use std::time::Duration;

use crate::backend::Api;
use crate::paint::Color;

/// Texel filter used for minification and magnification.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum Filter {
    Nearest,
    #[default]
    Linear,
}

/// Behavior for texture coordinates outside `0..1`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum AddressMode {
    #[default]
    ClampToEdge,
    Repeat,
    MirrorRepeat,
}

/// Sampler applied to every texture created by the renderer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SamplerConfig {
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    /// Clamped to `1..=16`. Values above 1 require linear filtering.
    pub max_anisotropy: u16,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            min_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            address_u: AddressMode::ClampToEdge,
            address_v: AddressMode::ClampToEdge,
            max_anisotropy: 1,
        }
    }
}

impl SamplerConfig {
    /// Nearest filtering everywhere, for pixel art.
    pub fn pixelated() -> Self {
        Self {
            min_filter: Filter::Nearest,
            mag_filter: Filter::Nearest,
            ..Self::default()
        }
    }
}

/// How batches are ordered before their draws are recorded.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum DrawOrder {
    /// Push order, z keys ignored.
    Submission,
    /// Stable sort by z key; equal keys keep push order.
    #[default]
    ZOrder,
}

/// Renderer configuration.
///
/// Defaults match a double-buffered desktop setup.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Backend family, chosen once at init.
    pub api: Api,

    pub sampler: SamplerConfig,

    /// Number of frame slots (frames the CPU may record ahead of the GPU).
    ///
    /// Values below 1 are treated as 1. Only the Vulkan-style backend honors
    /// values above 1.
    pub frames_in_flight: usize,

    /// Upper bound on a slot fence wait. A timeout skips the frame.
    pub fence_timeout: Duration,

    /// Upper bound on presentable image acquisition. A timeout skips the frame.
    pub acquire_timeout: Duration,

    /// Vertex capacity each slot's geometry buffer starts with.
    pub initial_vertex_capacity: usize,

    /// Index capacity each slot's geometry buffer starts with.
    pub initial_index_capacity: usize,

    pub clear_color: Color,

    /// Requested draw ordering. The immediate backend always draws in
    /// submission order.
    pub draw_order: DrawOrder,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            api: Api::Vulkan,
            sampler: SamplerConfig::default(),
            frames_in_flight: 2,
            fence_timeout: Duration::from_nanos(9_999_999_999),
            acquire_timeout: Duration::from_nanos(9_999_999_999),
            initial_vertex_capacity: 50_000,
            initial_index_capacity: 50_000,
            clear_color: Color::BLACK,
            draw_order: DrawOrder::ZOrder,
        }
    }
}

impl RendererConfig {
    pub fn with_api(mut self, api: Api) -> Self {
        self.api = api;
        self
    }

    /// Effective slot count (at least 1).
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.frames_in_flight.max(1)
    }
}
