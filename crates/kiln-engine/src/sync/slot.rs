use crate::device::{
    BufferId, BufferUsage, CommandList, CommandPoolId, Device, DeviceResult, FenceId, Resource,
    SemaphoreId,
};

use super::DeletionQueue;

/// Vertex and index buffers a slot streams batch geometry into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryBuffers {
    pub vertex: BufferId,
    pub vertex_capacity: u64,
    pub index: BufferId,
    pub index_capacity: u64,
}

impl GeometryBuffers {
    /// Allocates both buffers and registers them in `owner`.
    pub fn create<D: Device + ?Sized>(
        device: &mut D,
        vertex_bytes: u64,
        index_bytes: u64,
        owner: &mut DeletionQueue,
    ) -> DeviceResult<Self> {
        let vertex_capacity = vertex_bytes.max(64);
        let index_capacity = index_bytes.max(64);

        let vertex = device.create_buffer(BufferUsage::Vertex, vertex_capacity)?;
        owner.push(Resource::Buffer(vertex));
        let index = device.create_buffer(BufferUsage::Index, index_capacity)?;
        owner.push(Resource::Buffer(index));

        Ok(Self { vertex, vertex_capacity, index, index_capacity })
    }

    /// Grows the buffer for `usage` so it holds at least `required` bytes.
    ///
    /// Never shrinks. The old buffer moves from `owner` to `retire`, which the
    /// caller flushes once the GPU can no longer read it. Returns whether a new
    /// buffer was allocated.
    pub fn reserve<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        usage: BufferUsage,
        required: u64,
        retire: &mut DeletionQueue,
        owner: &mut DeletionQueue,
    ) -> DeviceResult<bool> {
        let (buffer, capacity) = match usage {
            BufferUsage::Vertex => (&mut self.vertex, &mut self.vertex_capacity),
            BufferUsage::Index => (&mut self.index, &mut self.index_capacity),
        };
        if required <= *capacity {
            return Ok(false);
        }

        let new_capacity = required.next_power_of_two();
        let grown = device.create_buffer(usage, new_capacity)?;

        let old = Resource::Buffer(*buffer);
        owner.forget(old);
        retire.push(old);
        owner.push(Resource::Buffer(grown));

        log::debug!("{usage:?} buffer grown: {} -> {new_capacity} bytes", *capacity);
        *buffer = grown;
        *capacity = new_capacity;
        Ok(true)
    }
}

/// Everything one frame in flight needs.
#[derive(Debug)]
pub struct FrameSlot {
    pub pool: CommandPoolId,
    /// Signaled when the slot's last submission finished on the GPU.
    pub fence: FenceId,
    pub image_acquired: SemaphoreId,
    pub render_complete: SemaphoreId,
    pub commands: CommandList,
    /// True while the fence tracks a submission. Cleared when the fence is
    /// reset for a frame, set again once that frame is submitted.
    pub valid: bool,
    pub geometry: GeometryBuffers,
}

impl FrameSlot {
    /// Creates the slot's objects and registers them in `owner`.
    ///
    /// The fence starts signaled so the first wait on it returns at once.
    pub fn create<D: Device + ?Sized>(
        device: &mut D,
        vertex_bytes: u64,
        index_bytes: u64,
        owner: &mut DeletionQueue,
    ) -> DeviceResult<Self> {
        let pool = device.create_command_pool()?;
        owner.push(Resource::CommandPool(pool));
        let fence = device.create_fence(true)?;
        owner.push(Resource::Fence(fence));
        let image_acquired = device.create_semaphore()?;
        owner.push(Resource::Semaphore(image_acquired));
        let render_complete = device.create_semaphore()?;
        owner.push(Resource::Semaphore(render_complete));
        let geometry = GeometryBuffers::create(device, vertex_bytes, index_bytes, owner)?;

        Ok(Self {
            pool,
            fence,
            image_acquired,
            render_complete,
            commands: CommandList::new(),
            valid: false,
            geometry,
        })
    }
}

/// Rotating set of frame slots. The current slot is `counter % len`.
#[derive(Debug)]
pub struct FrameRing {
    slots: Vec<FrameSlot>,
    counter: u64,
}

impl FrameRing {
    pub fn new(slots: Vec<FrameSlot>) -> Self {
        Self { slots, counter: 0 }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Completed frames since creation.
    #[inline]
    pub fn counter(&self) -> u64 {
        self.counter
    }

    #[inline]
    pub fn index(&self) -> usize {
        (self.counter % self.slots.len() as u64) as usize
    }

    /// Slot of the most recently completed frame.
    #[inline]
    pub fn previous_index(&self) -> usize {
        let n = self.slots.len() as u64;
        ((self.counter + n - 1) % n) as usize
    }

    #[inline]
    pub fn current(&self) -> &FrameSlot {
        &self.slots[self.index()]
    }

    #[inline]
    pub fn current_mut(&mut self) -> &mut FrameSlot {
        let i = self.index();
        &mut self.slots[i]
    }

    pub fn advance(&mut self) {
        self.counter += 1;
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut FrameSlot> {
        self.slots.iter_mut()
    }
}
