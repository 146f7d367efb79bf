//! Kiln engine crate.
//!
//! Cross-API 2D rendering core: callers push batches of solid or textured
//! geometry each frame and a backend gets them onto the screen, tolerating
//! resize, minimize and transient driver failures.
//!
//! Layers, leaves first:
//! - [`geometry`]: vertices, batches, blend descriptors, handles
//! - [`device`]: explicit-sync GPU contract with wgpu and headless devices
//! - [`sync`]: deletion tiers, frame slots, swapchain lifecycle
//! - [`batch`]: merges a frame's batches into draws
//! - [`backend`]: the Vulkan-, OpenGL- and D3D-style variants
//! - [`renderer`]: facade owning one backend
//! - [`window`]: winit runtime driving a renderer

pub mod backend;
pub mod batch;
pub mod config;
pub mod coords;
pub mod core;
pub mod device;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod paint;
pub mod renderer;
pub mod sync;
pub mod window;

pub use backend::Api;
pub use config::RendererConfig;
pub use error::{ContractViolation, RenderError};
pub use renderer::Renderer;
