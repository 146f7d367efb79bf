use crate::device::{Device, Resource};

/// Ordered list of pending teardowns, flushed last-in-first-out.
///
/// Objects created later may depend on objects created earlier (a framebuffer
/// on its image view, a descriptor on its sampler), so destroying in reverse
/// registration order never frees a dependency before its dependents.
#[derive(Debug, Default)]
pub struct DeletionQueue {
    entries: Vec<Resource>,
}

impl DeletionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, resource: Resource) {
        self.entries.push(resource);
    }

    pub fn extend(&mut self, resources: impl IntoIterator<Item = Resource>) {
        self.entries.extend(resources);
    }

    /// Drops the most recent entry for `resource` without destroying it.
    ///
    /// Used when ownership of the object moves to another queue.
    pub fn forget(&mut self, resource: Resource) -> bool {
        match self.entries.iter().rposition(|r| *r == resource) {
            Some(i) => {
                self.entries.remove(i);
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn contains(&self, resource: Resource) -> bool {
        self.entries.contains(&resource)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Destroys every entry, newest first. Returns how many were destroyed.
    pub fn flush<D: Device + ?Sized>(&mut self, device: &mut D) -> usize {
        let count = self.entries.len();
        while let Some(resource) = self.entries.pop() {
            device.destroy(resource);
        }
        count
    }
}

/// The three lifetimes a device object can be tied to.
#[derive(Debug)]
pub struct DeletionTiers {
    /// Flushed at shutdown.
    pub program: DeletionQueue,
    /// Flushed before every swapchain rebuild and at shutdown.
    pub swapchain: DeletionQueue,
    per_frame: Vec<DeletionQueue>,
}

impl DeletionTiers {
    pub fn new(slots: usize) -> Self {
        Self {
            program: DeletionQueue::new(),
            swapchain: DeletionQueue::new(),
            per_frame: (0..slots.max(1)).map(|_| DeletionQueue::new()).collect(),
        }
    }

    /// Per-frame queue of slot `index`. Panics if `index` is not a slot.
    #[inline]
    pub fn slot(&mut self, index: usize) -> &mut DeletionQueue {
        &mut self.per_frame[index]
    }

    #[inline]
    pub fn slot_ref(&self, index: usize) -> &DeletionQueue {
        &self.per_frame[index]
    }

    /// Per-frame queue of slot `index` alongside the program queue, for
    /// moving ownership between them.
    #[inline]
    pub fn slot_and_program(&mut self, index: usize) -> (&mut DeletionQueue, &mut DeletionQueue) {
        (&mut self.per_frame[index], &mut self.program)
    }

    /// Flushes every per-frame queue. Only valid once the device is idle.
    pub fn flush_slots<D: Device + ?Sized>(&mut self, device: &mut D) -> usize {
        self.per_frame.iter_mut().map(|q| q.flush(device)).sum()
    }

    /// Flushes per-frame, swapchain, then program queues.
    pub fn flush_all<D: Device + ?Sized>(&mut self, device: &mut D) -> usize {
        self.flush_slots(device) + self.swapchain.flush(device) + self.program.flush(device)
    }
}
