use super::BlendHandle;

/// Blend factor applied to a source or destination term.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
    OneMinusDstColor,
    DstAlpha,
    OneMinusDstAlpha,
}

/// Equation combining the weighted source and destination terms.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Fixed-function blend configuration.
///
/// When `enabled` is false the factors and ops are ignored and fragments
/// overwrite the target.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BlendDescriptor {
    pub enabled: bool,
    pub src_color: BlendFactor,
    pub dst_color: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub color_op: BlendOp,
    pub alpha_op: BlendOp,
}

impl BlendDescriptor {
    /// Straight-alpha "over".
    pub const ALPHA: Self = Self {
        enabled: true,
        src_color: BlendFactor::SrcAlpha,
        dst_color: BlendFactor::OneMinusSrcAlpha,
        src_alpha: BlendFactor::One,
        dst_alpha: BlendFactor::OneMinusSrcAlpha,
        color_op: BlendOp::Add,
        alpha_op: BlendOp::Add,
    };

    /// Additive light accumulation.
    pub const ADDITIVE: Self = Self {
        enabled: true,
        src_color: BlendFactor::SrcAlpha,
        dst_color: BlendFactor::One,
        src_alpha: BlendFactor::One,
        dst_alpha: BlendFactor::Zero,
        color_op: BlendOp::Add,
        alpha_op: BlendOp::Add,
    };

    /// No blending.
    pub const OPAQUE: Self = Self {
        enabled: false,
        src_color: BlendFactor::One,
        dst_color: BlendFactor::Zero,
        src_alpha: BlendFactor::One,
        dst_alpha: BlendFactor::Zero,
        color_op: BlendOp::Add,
        alpha_op: BlendOp::Add,
    };
}

impl Default for BlendDescriptor {
    fn default() -> Self {
        Self::ALPHA
    }
}

/// Append-only table of blend descriptors.
///
/// A handle is the registration index, so handles issued earlier stay valid
/// forever and iteration order equals registration order.
#[derive(Debug, Clone, Default)]
pub struct BlendRegistry {
    entries: Vec<BlendDescriptor>,
}

impl BlendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `descriptor` and returns its handle.
    ///
    /// Identical descriptors are registered again under a new handle; callers
    /// are expected to create each blend state once.
    pub fn register(&mut self, descriptor: BlendDescriptor) -> BlendHandle {
        let handle = self.next_handle();
        self.entries.push(descriptor);
        handle
    }

    /// Handle the next `register` call will return.
    #[inline]
    pub fn next_handle(&self) -> BlendHandle {
        BlendHandle(self.entries.len() as u32)
    }

    #[inline]
    pub fn get(&self, handle: BlendHandle) -> Option<&BlendDescriptor> {
        self.entries.get(handle.index())
    }

    #[inline]
    pub fn contains(&self, handle: BlendHandle) -> bool {
        handle.index() < self.entries.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BlendHandle, &BlendDescriptor)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, d)| (BlendHandle(i as u32), d))
    }
}
