use crate::config::DrawOrder;
use crate::coords::Extent;
use crate::device::{BufferUsage, Command, DescriptorId, Device, FramebufferId};
use crate::error::{ContractViolation, RenderError};
use crate::geometry::{Batch, Vertex};
use crate::paint::Color;
use crate::sync::{DeletionQueue, FrameSlot, Swapchain};

/// Vertices one base-vertex segment can address with 16-bit indices.
const SEGMENT_VERTICES: u32 = u16::MAX as u32 + 1;

/// Counters from one flush.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct FlushStats {
    pub batches: usize,
    pub draws: usize,
    /// Batches skipped because their clip rect missed the target.
    pub culled: usize,
    pub vertices: usize,
    pub indices: usize,
    /// Base-vertex segments used; more than one once the frame passes 65536
    /// vertices.
    pub segments: usize,
    pub vertex_growth: bool,
    pub index_growth: bool,
}

/// Where a flush draws to.
pub struct FlushTarget<'a> {
    pub swapchain: &'a Swapchain,
    pub framebuffer: FramebufferId,
    pub extent: Extent,
    pub clear: Color,
}

#[derive(Debug)]
struct Pending {
    batch: Batch,
    /// Resolved at push time so a texture destroyed mid-frame still binds.
    texture: DescriptorId,
}

/// Per-batch placement inside the frame's geometry buffers.
struct Span {
    first_index: u32,
    index_count: u32,
    base_vertex: i32,
    first_vertex: u32,
    vertex_count: u32,
}

/// Accumulates a frame's batches and turns them into one pass of draws.
#[derive(Debug, Default)]
pub struct Batcher {
    pending: Vec<Pending>,
    overlay: Vec<Pending>,
    order: DrawOrder,
}

impl Batcher {
    pub fn new(order: DrawOrder) -> Self {
        Self { pending: Vec::new(), overlay: Vec::new(), order }
    }

    /// Queues a validated batch bound to `texture`.
    pub fn push(&mut self, batch: Batch, texture: DescriptorId) {
        self.pending.push(Pending { batch, texture });
    }

    /// Queues a batch drawn after every regular batch, regardless of z.
    pub fn push_overlay(&mut self, batch: Batch, texture: DescriptorId) {
        self.overlay.push(Pending { batch, texture });
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pending.len() + self.overlay.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops everything queued.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.overlay.clear();
    }

    /// Uploads the frame's geometry into `slot` and records one pass that
    /// clears the target and draws every queued batch.
    ///
    /// Buffers replaced by growth move from `owner` to `retire`. The queue is
    /// empty afterwards, whether or not recording succeeded.
    pub fn flush<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        target: &FlushTarget<'_>,
        slot: &mut FrameSlot,
        retire: &mut DeletionQueue,
        owner: &mut DeletionQueue,
    ) -> Result<FlushStats, RenderError> {
        let mut batches = std::mem::take(&mut self.pending);
        if self.order == DrawOrder::ZOrder {
            // stable: equal keys keep push order
            batches.sort_by_key(|p| p.batch.sort_key());
        }
        batches.append(&mut self.overlay);

        let mut stats = FlushStats { batches: batches.len(), ..FlushStats::default() };

        // ── layout ────────────────────────────────────────────────────────

        let vertex_total: usize = batches.iter().map(|p| p.batch.vertices.len()).sum();
        let index_total: usize = batches.iter().map(|p| p.batch.indices.len()).sum();

        let mut vertices: Vec<u8> = Vec::with_capacity(vertex_total * Vertex::SIZE as usize);
        let mut indices: Vec<u16> = Vec::with_capacity(index_total + 1);
        let mut spans = Vec::with_capacity(batches.len());

        let mut cursor: u32 = 0;
        let mut segment_base: u32 = 0;
        if !batches.is_empty() {
            stats.segments = 1;
        }

        for p in &batches {
            let count = p.batch.vertices.len() as u32;
            if cursor - segment_base + count > SEGMENT_VERTICES {
                segment_base = cursor;
                stats.segments += 1;
            }
            // fits: cursor - segment_base + count <= 65536 and count >= 1
            let offset = (cursor - segment_base) as u16;

            let first_index = indices.len() as u32;
            indices.extend(p.batch.indices.iter().map(|&i| i + offset));
            vertices.extend_from_slice(bytemuck::cast_slice(&p.batch.vertices));

            spans.push(Span {
                first_index,
                index_count: p.batch.indices.len() as u32,
                base_vertex: segment_base as i32,
                first_vertex: cursor,
                vertex_count: count,
            });
            cursor += count;
        }

        stats.vertices = vertex_total;
        stats.indices = index_total;

        // Uploads are padded to 4 bytes.
        if indices.len() % 2 == 1 {
            indices.push(0);
        }
        let index_bytes: &[u8] = bytemuck::cast_slice(&indices);

        // ── upload ────────────────────────────────────────────────────────

        let geometry = &mut slot.geometry;
        stats.vertex_growth =
            geometry.reserve(device, BufferUsage::Vertex, vertices.len() as u64, retire, owner)?;
        stats.index_growth =
            geometry.reserve(device, BufferUsage::Index, index_bytes.len() as u64, retire, owner)?;

        if !vertices.is_empty() {
            device.write_buffer(geometry.vertex, 0, &vertices)?;
            device.write_buffer(geometry.index, 0, index_bytes)?;
        }

        // ── record ────────────────────────────────────────────────────────

        let commands = &mut slot.commands;
        commands.record(Command::BeginPass {
            framebuffer: target.framebuffer,
            extent: target.extent,
            clear: target.clear,
        });

        if !batches.is_empty() {
            commands.record(Command::BindVertexBuffer(geometry.vertex));
            commands.record(Command::BindIndexBuffer(geometry.index));
        }

        let mut bound_pipeline = None;
        let mut bound_texture = None;

        for (p, span) in batches.iter().zip(&spans) {
            let scissor = p.batch.clip.to_scissor(target.extent);
            if scissor.is_empty() {
                stats.culled += 1;
                continue;
            }

            let pipeline = target
                .swapchain
                .pipeline(p.batch.blend, p.batch.variant)
                .ok_or(ContractViolation::UnknownBlendState(p.batch.blend))?;
            if bound_pipeline != Some(pipeline) {
                commands.record(Command::BindPipeline(pipeline));
                bound_pipeline = Some(pipeline);
            }
            if bound_texture != Some(p.texture) {
                commands.record(Command::BindTexture(p.texture));
                bound_texture = Some(p.texture);
            }

            commands.record(Command::SetScissor(scissor));
            commands.record(Command::DrawIndexed {
                indices: span.first_index..span.first_index + span.index_count,
                base_vertex: span.base_vertex,
                vertices: span.first_vertex..span.first_vertex + span.vertex_count,
            });
            stats.draws += 1;
        }

        commands.record(Command::EndPass);
        Ok(stats)
    }
}
