use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};

use crate::config::{AddressMode, Filter, SamplerConfig};
use crate::coords::Extent;
use crate::geometry::{BlendDescriptor, BlendFactor, BlendOp, FragmentVariant, Vertex};

use super::surface::{self, NativeSurface, SurfaceErrorAction};
use super::{
    AcquireOutcome, BufferId, BufferUsage, Command, CommandList, CommandPoolId, DepthBufferId,
    DescriptorId, Device, DeviceError, DeviceInit, DeviceResult, FenceId, FenceStatus,
    FramebufferId, ImageId, ImageViewId, PipelineId, PipelineLayoutId, PresentOutcome, Resource,
    SamplerId, SemaphoreId, SwapchainId, SwapchainInfo, TextureDesc, TextureParts,
};

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct ViewportUniform {
    size: [f32; 2],
    _pad: [f32; 2], // 16-byte alignment
}

const VERTEX_ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
    0 => Float32x2, // pos
    1 => Float32x2, // uv
    2 => Unorm8x4   // packed color
];

fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: Vertex::SIZE,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRS,
    }
}

/// Presentable image currently held by the renderer.
struct AcquiredFrame {
    index: u32,
    suboptimal: bool,
    texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
}

enum ViewTarget {
    /// Resolved to the acquired surface texture at pass begin.
    Swapchain(u32),
    Texture(wgpu::TextureView),
}

enum FenceState {
    Signaled,
    Unsignaled,
    Pending(wgpu::SubmissionIndex),
}

/// [`Device`] backed by wgpu.
///
/// wgpu tracks hazards and semaphores internally, so semaphores are plain ids
/// here and fences map to queue submission indices. Swapchain images are not
/// exposed by wgpu; image views of a swapchain resolve to whichever surface
/// texture was acquired last.
pub struct WgpuDevice {
    window: Arc<dyn NativeSurface>,

    /// wgpu instance used to create the adapter and surface.
    _instance: wgpu::Instance,

    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,

    /// Active surface configuration. Width/height follow the last swapchain.
    config: wgpu::SurfaceConfiguration,
    depth_format: wgpu::TextureFormat,

    shader: wgpu::ShaderModule,
    viewport_bgl: wgpu::BindGroupLayout,
    texture_bgl: wgpu::BindGroupLayout,
    viewport_ubo: wgpu::Buffer,
    viewport_group: wgpu::BindGroup,

    next_id: u32,
    swapchains: HashMap<SwapchainId, SwapchainInfo>,
    frame: Option<AcquiredFrame>,
    next_image: u32,

    views: HashMap<ImageViewId, ViewTarget>,
    depth_buffers: HashMap<DepthBufferId, wgpu::Texture>,
    framebuffers: HashMap<FramebufferId, (ImageViewId, DepthBufferId)>,
    layouts: HashMap<PipelineLayoutId, wgpu::PipelineLayout>,
    pipelines: HashMap<PipelineId, wgpu::RenderPipeline>,
    pools: HashSet<CommandPoolId>,
    semaphores: HashSet<SemaphoreId>,
    fences: HashMap<FenceId, FenceState>,
    buffers: HashMap<BufferId, wgpu::Buffer>,
    images: HashMap<ImageId, wgpu::Texture>,
    samplers: HashMap<SamplerId, wgpu::Sampler>,
    descriptors: HashMap<DescriptorId, wgpu::BindGroup>,
}

impl WgpuDevice {
    /// Creates a device presenting into `window`.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu. The surface is
    /// configured on the first `create_swapchain`, so a minimized window is
    /// accepted here.
    pub async fn new(window: Arc<dyn NativeSurface>, init: DeviceInit) -> Result<Self> {
        let DeviceInit {
            prefer_srgb,
            present_mode,
            alpha_mode,
            power_preference,
            required_features,
            required_limits,
            desired_maximum_frame_latency,
            depth_format,
        } = init;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(Arc::clone(&window))
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("kiln device"),
                required_features,
                required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let caps = surface.get_capabilities(&adapter);
        let format = surface::choose_surface_format(&caps, prefer_srgb)
            .context("no supported surface formats")?;
        let alpha_mode = surface::choose_alpha_mode(&caps, alpha_mode);

        let size = window.drawable_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency,
        };

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("kiln batch shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/batch.wgsl").into()),
        });

        let viewport_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kiln viewport bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<ViewportUniform>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let texture_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kiln texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let viewport_ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("kiln viewport ubo"),
            size: std::mem::size_of::<ViewportUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let viewport_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kiln viewport bind group"),
            layout: &viewport_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: viewport_ubo.as_entire_binding(),
            }],
        });

        log::debug!("wgpu device ready: format={format:?} present_mode={present_mode:?}");

        Ok(Self {
            window,
            _instance: instance,
            surface,
            device,
            queue,
            config,
            depth_format,
            shader,
            viewport_bgl,
            texture_bgl,
            viewport_ubo,
            viewport_group,
            next_id: 0,
            swapchains: HashMap::new(),
            frame: None,
            next_image: 0,
            views: HashMap::new(),
            depth_buffers: HashMap::new(),
            framebuffers: HashMap::new(),
            layouts: HashMap::new(),
            pipelines: HashMap::new(),
            pools: HashSet::new(),
            semaphores: HashSet::new(),
            fences: HashMap::new(),
            buffers: HashMap::new(),
            images: HashMap::new(),
            samplers: HashMap::new(),
            descriptors: HashMap::new(),
        })
    }

    /// Returns the active surface format.
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    fn issue(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn image_count(&self) -> u32 {
        self.config.desired_maximum_frame_latency.max(1) + 1
    }

    fn color_view(&self, id: ImageViewId) -> DeviceResult<&wgpu::TextureView> {
        match self.views.get(&id) {
            Some(ViewTarget::Texture(view)) => Ok(view),
            Some(ViewTarget::Swapchain(image)) => match &self.frame {
                Some(frame) if frame.index == *image => Ok(&frame.view),
                _ => Err(DeviceError::Backend(format!("swapchain image {image} is not acquired"))),
            },
            None => Err(unknown(id)),
        }
    }

    /// Replays `commands` into `encoder`.
    fn encode(&self, encoder: &mut wgpu::CommandEncoder, commands: &CommandList) -> DeviceResult<()> {
        let mut pass: Option<wgpu::RenderPass<'static>> = None;

        for cmd in commands.commands() {
            match cmd {
                Command::BeginPass { framebuffer, extent, clear } => {
                    // the encoder stays locked until the previous pass ends
                    drop(pass.take());
                    let (color, _) = self.framebuffers.get(framebuffer).ok_or_else(|| unknown(framebuffer))?;
                    let view = self.color_view(*color)?;

                    let u = ViewportUniform {
                        size: [extent.width.max(1) as f32, extent.height.max(1) as f32],
                        _pad: [0.0; 2],
                    };
                    self.queue.write_buffer(&self.viewport_ubo, 0, bytemuck::bytes_of(&u));

                    let mut rpass = encoder
                        .begin_render_pass(&wgpu::RenderPassDescriptor {
                            label: Some("kiln batch pass"),
                            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                                view,
                                resolve_target: None,
                                ops: wgpu::Operations {
                                    load: wgpu::LoadOp::Clear(wgpu::Color {
                                        r: clear.r as f64,
                                        g: clear.g as f64,
                                        b: clear.b as f64,
                                        a: clear.a as f64,
                                    }),
                                    store: wgpu::StoreOp::Store,
                                },
                                depth_slice: None,
                            })],
                            depth_stencil_attachment: None,
                            timestamp_writes: None,
                            occlusion_query_set: None,
                            multiview_mask: None,
                        })
                        .forget_lifetime();
                    rpass.set_bind_group(0, &self.viewport_group, &[]);
                    pass = Some(rpass);
                }
                Command::BindPipeline(id) => {
                    let pipeline = self.pipelines.get(id).ok_or_else(|| unknown(id))?;
                    active(&mut pass)?.set_pipeline(pipeline);
                }
                Command::BindVertexBuffer(id) => {
                    let buffer = self.buffers.get(id).ok_or_else(|| unknown(id))?;
                    active(&mut pass)?.set_vertex_buffer(0, buffer.slice(..));
                }
                Command::BindIndexBuffer(id) => {
                    let buffer = self.buffers.get(id).ok_or_else(|| unknown(id))?;
                    active(&mut pass)?.set_index_buffer(buffer.slice(..), wgpu::IndexFormat::Uint16);
                }
                Command::BindTexture(id) => {
                    let group = self.descriptors.get(id).ok_or_else(|| unknown(id))?;
                    active(&mut pass)?.set_bind_group(1, group, &[]);
                }
                Command::SetScissor(s) => {
                    active(&mut pass)?.set_scissor_rect(s.x, s.y, s.width, s.height);
                }
                Command::DrawIndexed { indices, base_vertex, .. } => {
                    active(&mut pass)?.draw_indexed(indices.clone(), *base_vertex, 0..1);
                }
                Command::EndPass => pass = None,
            }
        }

        Ok(())
    }
}

fn unknown(id: impl std::fmt::Display) -> DeviceError {
    DeviceError::UnknownResource(id.to_string())
}

fn active<'p>(
    pass: &'p mut Option<wgpu::RenderPass<'static>>,
) -> DeviceResult<&'p mut wgpu::RenderPass<'static>> {
    pass.as_mut()
        .ok_or_else(|| DeviceError::Backend("draw state recorded outside a pass".to_string()))
}

fn map_factor(f: BlendFactor) -> wgpu::BlendFactor {
    match f {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
    }
}

fn map_component(src: BlendFactor, dst: BlendFactor, op: BlendOp) -> wgpu::BlendComponent {
    let operation = match op {
        BlendOp::Add => wgpu::BlendOperation::Add,
        BlendOp::Subtract => wgpu::BlendOperation::Subtract,
        BlendOp::ReverseSubtract => wgpu::BlendOperation::ReverseSubtract,
        BlendOp::Min => wgpu::BlendOperation::Min,
        BlendOp::Max => wgpu::BlendOperation::Max,
    };
    // Min/Max ignore factors and wgpu requires them to be One.
    let (src_factor, dst_factor) = match op {
        BlendOp::Min | BlendOp::Max => (wgpu::BlendFactor::One, wgpu::BlendFactor::One),
        _ => (map_factor(src), map_factor(dst)),
    };
    wgpu::BlendComponent { src_factor, dst_factor, operation }
}

fn map_blend(desc: &BlendDescriptor) -> Option<wgpu::BlendState> {
    desc.enabled.then(|| wgpu::BlendState {
        color: map_component(desc.src_color, desc.dst_color, desc.color_op),
        alpha: map_component(desc.src_alpha, desc.dst_alpha, desc.alpha_op),
    })
}

fn map_filter(f: Filter) -> wgpu::FilterMode {
    match f {
        Filter::Nearest => wgpu::FilterMode::Nearest,
        Filter::Linear => wgpu::FilterMode::Linear,
    }
}

fn map_address(m: AddressMode) -> wgpu::AddressMode {
    match m {
        AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        AddressMode::Repeat => wgpu::AddressMode::Repeat,
        AddressMode::MirrorRepeat => wgpu::AddressMode::MirrorRepeat,
    }
}

impl Device for WgpuDevice {
    fn drawable_extent(&self) -> Extent {
        self.window.drawable_size()
    }

    fn create_swapchain(&mut self, extent: Extent) -> DeviceResult<SwapchainInfo> {
        if extent.is_degenerate() {
            return Err(DeviceError::Backend(format!(
                "cannot configure a {}x{} surface",
                extent.width, extent.height
            )));
        }

        self.frame = None;
        self.config.width = extent.width;
        self.config.height = extent.height;
        self.surface.configure(&self.device, &self.config);

        let id = SwapchainId(self.issue());
        let info = SwapchainInfo { id, extent, image_count: self.image_count() };
        self.swapchains.insert(id, info);
        self.next_image = 0;
        Ok(info)
    }

    fn create_image_view(&mut self, swapchain: SwapchainId, image: u32) -> DeviceResult<ImageViewId> {
        let info = self.swapchains.get(&swapchain).ok_or_else(|| unknown(swapchain))?;
        if image >= info.image_count {
            return Err(DeviceError::Backend(format!("{swapchain} has no image {image}")));
        }
        let id = ImageViewId(self.issue());
        self.views.insert(id, ViewTarget::Swapchain(image));
        Ok(id)
    }

    fn create_depth_buffer(&mut self, extent: Extent) -> DeviceResult<DepthBufferId> {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("kiln depth"),
            size: wgpu::Extent3d {
                width: extent.width.max(1),
                height: extent.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.depth_format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let id = DepthBufferId(self.issue());
        self.depth_buffers.insert(id, texture);
        Ok(id)
    }

    fn create_framebuffer(
        &mut self,
        color: ImageViewId,
        depth: DepthBufferId,
        _extent: Extent,
    ) -> DeviceResult<FramebufferId> {
        if !self.views.contains_key(&color) {
            return Err(unknown(color));
        }
        if !self.depth_buffers.contains_key(&depth) {
            return Err(unknown(depth));
        }
        let id = FramebufferId(self.issue());
        self.framebuffers.insert(id, (color, depth));
        Ok(id)
    }

    fn create_pipeline_layout(&mut self) -> DeviceResult<PipelineLayoutId> {
        let layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("kiln batch pipeline layout"),
            bind_group_layouts: &[&self.viewport_bgl, &self.texture_bgl],
            immediate_size: 0,
        });
        let id = PipelineLayoutId(self.issue());
        self.layouts.insert(id, layout);
        Ok(id)
    }

    fn create_pipeline(
        &mut self,
        layout: PipelineLayoutId,
        variant: FragmentVariant,
        blend: &BlendDescriptor,
    ) -> DeviceResult<PipelineId> {
        let pipeline_layout = self.layouts.get(&layout).ok_or_else(|| unknown(layout))?;
        let fs_entry = match variant {
            FragmentVariant::Solid => "fs_solid",
            FragmentVariant::Image => "fs_image",
        };

        // 2D batches are drawn in order without depth testing; the depth
        // buffer only exists as part of the swapchain's attachments.
        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("kiln batch pipeline"),
            layout: Some(pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[vertex_layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.shader,
                entry_point: Some(fs_entry),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.config.format,
                    blend: map_blend(blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let id = PipelineId(self.issue());
        self.pipelines.insert(id, pipeline);
        Ok(id)
    }

    fn create_command_pool(&mut self) -> DeviceResult<CommandPoolId> {
        let id = CommandPoolId(self.issue());
        self.pools.insert(id);
        Ok(id)
    }

    fn create_fence(&mut self, signaled: bool) -> DeviceResult<FenceId> {
        let id = FenceId(self.issue());
        let state = if signaled { FenceState::Signaled } else { FenceState::Unsignaled };
        self.fences.insert(id, state);
        Ok(id)
    }

    fn create_semaphore(&mut self) -> DeviceResult<SemaphoreId> {
        let id = SemaphoreId(self.issue());
        self.semaphores.insert(id);
        Ok(id)
    }

    fn create_buffer(&mut self, usage: BufferUsage, size: u64) -> DeviceResult<BufferId> {
        let (label, usage) = match usage {
            BufferUsage::Vertex => ("kiln vertex buffer", wgpu::BufferUsages::VERTEX),
            BufferUsage::Index => ("kiln index buffer", wgpu::BufferUsages::INDEX),
        };
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT),
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let id = BufferId(self.issue());
        self.buffers.insert(id, buffer);
        Ok(id)
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) -> DeviceResult<()> {
        let target = self.buffers.get(&buffer).ok_or_else(|| unknown(buffer))?;
        if data.is_empty() {
            return Ok(());
        }

        // Copies must be a multiple of COPY_BUFFER_ALIGNMENT.
        let padded = (data.len() as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        if offset + padded > target.size() {
            return Err(DeviceError::Backend(format!(
                "write of {} bytes at {offset} overruns {buffer} ({} bytes)",
                data.len(),
                target.size()
            )));
        }

        if padded == data.len() as u64 {
            self.queue.write_buffer(target, offset, data);
        } else {
            let mut bytes = data.to_vec();
            bytes.resize(padded as usize, 0);
            self.queue.write_buffer(target, offset, &bytes);
        }
        Ok(())
    }

    fn create_texture(
        &mut self,
        desc: TextureDesc,
        pixels: &[u8],
        sampler: &SamplerConfig,
    ) -> DeviceResult<TextureParts> {
        if pixels.len() != desc.byte_len() {
            return Err(DeviceError::Backend(format!(
                "texture upload expects {} bytes, got {}",
                desc.byte_len(),
                pixels.len()
            )));
        }

        let size = wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("kiln texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(desc.width * TextureDesc::CHANNELS),
                rows_per_image: Some(desc.height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let all_linear = sampler.min_filter == Filter::Linear && sampler.mag_filter == Filter::Linear;
        let anisotropy_clamp = if all_linear { sampler.max_anisotropy.clamp(1, 16) } else { 1 };
        let wgpu_sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("kiln texture sampler"),
            address_mode_u: map_address(sampler.address_u),
            address_mode_v: map_address(sampler.address_v),
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: map_filter(sampler.mag_filter),
            min_filter: map_filter(sampler.min_filter),
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            anisotropy_clamp,
            ..Default::default()
        });

        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kiln texture bind group"),
            layout: &self.texture_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&wgpu_sampler),
                },
            ],
        });

        let parts = TextureParts {
            image: ImageId(self.issue()),
            view: ImageViewId(self.issue()),
            sampler: SamplerId(self.issue()),
            descriptor: DescriptorId(self.issue()),
        };
        self.images.insert(parts.image, texture);
        self.views.insert(parts.view, ViewTarget::Texture(view));
        self.samplers.insert(parts.sampler, wgpu_sampler);
        self.descriptors.insert(parts.descriptor, group);
        Ok(parts)
    }

    fn wait_fence(&mut self, fence: FenceId, timeout: Duration) -> DeviceResult<FenceStatus> {
        let index = match self.fences.get(&fence) {
            Some(FenceState::Signaled) => return Ok(FenceStatus::Signaled),
            // Nothing was submitted against it; it can never signal.
            Some(FenceState::Unsignaled) => return Ok(FenceStatus::Timeout),
            Some(FenceState::Pending(index)) => index.clone(),
            None => return Err(unknown(fence)),
        };

        match self.device.poll(wgpu::PollType::Wait {
            submission_index: Some(index),
            timeout: Some(timeout),
        }) {
            Ok(_) => {
                self.fences.insert(fence, FenceState::Signaled);
                Ok(FenceStatus::Signaled)
            }
            Err(wgpu::PollError::Timeout) => Ok(FenceStatus::Timeout),
            Err(e) => Err(DeviceError::Backend(e.to_string())),
        }
    }

    fn reset_fence(&mut self, fence: FenceId) -> DeviceResult<()> {
        let state = self.fences.get_mut(&fence).ok_or_else(|| unknown(fence))?;
        *state = FenceState::Unsignaled;
        Ok(())
    }

    fn acquire_image(
        &mut self,
        swapchain: SwapchainId,
        signal: SemaphoreId,
        _timeout: Duration,
    ) -> DeviceResult<AcquireOutcome> {
        let info = *self.swapchains.get(&swapchain).ok_or_else(|| unknown(swapchain))?;
        if !self.semaphores.contains(&signal) {
            return Err(unknown(signal));
        }
        if let Some(frame) = &self.frame {
            return Ok(AcquireOutcome::Acquired {
                index: frame.index,
                suboptimal: frame.suboptimal,
            });
        }

        // wgpu applies the surface's own acquire timeout.
        match self.surface.get_current_texture() {
            Ok(texture) => {
                let suboptimal = texture.suboptimal;
                let view = texture
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                let index = self.next_image;
                self.next_image = (index + 1) % info.image_count;
                self.frame = Some(AcquiredFrame { index, suboptimal, texture, view });
                Ok(AcquireOutcome::Acquired { index, suboptimal })
            }
            Err(err) => match surface::classify_surface_error(&err) {
                SurfaceErrorAction::Reconfigure => Ok(AcquireOutcome::OutOfDate),
                SurfaceErrorAction::SkipFrame => Ok(AcquireOutcome::Timeout),
                SurfaceErrorAction::Fatal => Err(DeviceError::OutOfMemory),
            },
        }
    }

    fn reset_command_pool(&mut self, pool: CommandPoolId) -> DeviceResult<()> {
        if self.pools.contains(&pool) {
            Ok(())
        } else {
            Err(unknown(pool))
        }
    }

    fn submit(
        &mut self,
        pool: CommandPoolId,
        commands: &CommandList,
        _wait: Option<SemaphoreId>,
        _signal: Option<SemaphoreId>,
        fence: Option<FenceId>,
    ) -> DeviceResult<()> {
        if !self.pools.contains(&pool) {
            return Err(unknown(pool));
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("kiln frame encoder"),
            });
        self.encode(&mut encoder, commands)?;
        let index = self.queue.submit(std::iter::once(encoder.finish()));

        if let Some(fence) = fence {
            let state = self.fences.get_mut(&fence).ok_or_else(|| unknown(fence))?;
            *state = FenceState::Pending(index);
        }
        Ok(())
    }

    fn present(
        &mut self,
        swapchain: SwapchainId,
        image: u32,
        _wait: Option<SemaphoreId>,
    ) -> DeviceResult<PresentOutcome> {
        if !self.swapchains.contains_key(&swapchain) {
            return Err(unknown(swapchain));
        }
        let Some(AcquiredFrame { index, suboptimal, texture, view }) = self.frame.take() else {
            return Err(DeviceError::Backend("present without an acquired image".to_string()));
        };
        if index != image {
            log::debug!("present of image {image} while image {index} is held");
        }

        drop(view);
        self.window.pre_present_notify();
        texture.present();

        Ok(if suboptimal { PresentOutcome::Suboptimal } else { PresentOutcome::Presented })
    }

    fn wait_idle(&mut self) -> DeviceResult<()> {
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map_err(|e| DeviceError::Backend(e.to_string()))?;

        for state in self.fences.values_mut() {
            if matches!(state, FenceState::Pending(_)) {
                *state = FenceState::Signaled;
            }
        }
        Ok(())
    }

    fn destroy(&mut self, resource: Resource) {
        let found = match resource {
            Resource::Swapchain(id) => {
                self.frame = None;
                self.swapchains.remove(&id).is_some()
            }
            Resource::ImageView(id) => self.views.remove(&id).is_some(),
            Resource::DepthBuffer(id) => self.depth_buffers.remove(&id).map(|t| t.destroy()).is_some(),
            Resource::Framebuffer(id) => self.framebuffers.remove(&id).is_some(),
            Resource::PipelineLayout(id) => self.layouts.remove(&id).is_some(),
            Resource::Pipeline(id) => self.pipelines.remove(&id).is_some(),
            Resource::CommandPool(id) => self.pools.remove(&id),
            Resource::Fence(id) => self.fences.remove(&id).is_some(),
            Resource::Semaphore(id) => self.semaphores.remove(&id),
            Resource::Buffer(id) => self.buffers.remove(&id).map(|b| b.destroy()).is_some(),
            Resource::Image(id) => self.images.remove(&id).map(|t| t.destroy()).is_some(),
            Resource::Sampler(id) => self.samplers.remove(&id).is_some(),
            Resource::Descriptor(id) => self.descriptors.remove(&id).is_some(),
        };
        if !found {
            log::warn!("destroy of unknown {resource}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_matches_vertex_struct() {
        let layout = vertex_layout();
        assert_eq!(layout.array_stride, 20);
        assert_eq!(layout.attributes[2].offset, 16);
        assert_eq!(layout.attributes[2].format, wgpu::VertexFormat::Unorm8x4);
    }

    #[test]
    fn disabled_blend_maps_to_replace() {
        assert!(map_blend(&BlendDescriptor::OPAQUE).is_none());
        let alpha = map_blend(&BlendDescriptor::ALPHA).map(|b| b.color.dst_factor);
        assert_eq!(alpha, Some(wgpu::BlendFactor::OneMinusSrcAlpha));
    }

    #[test]
    fn min_max_force_unit_factors() {
        let c = map_component(BlendFactor::SrcAlpha, BlendFactor::Zero, BlendOp::Max);
        assert_eq!(c.src_factor, wgpu::BlendFactor::One);
        assert_eq!(c.dst_factor, wgpu::BlendFactor::One);
    }
}
