use core::ops::Range;

use crate::coords::{Extent, Scissor};
use crate::paint::Color;

use super::{BufferId, DescriptorId, FramebufferId, PipelineId};

/// One recorded device command.
///
/// Commands are recorded into a [`CommandList`] during a frame and replayed
/// by the device on submit.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BeginPass {
        framebuffer: FramebufferId,
        extent: Extent,
        clear: Color,
    },
    BindPipeline(PipelineId),
    BindVertexBuffer(BufferId),
    BindIndexBuffer(BufferId),
    BindTexture(DescriptorId),
    SetScissor(Scissor),
    DrawIndexed {
        /// Range in the bound index buffer.
        indices: Range<u32>,
        /// Added to every index before vertex fetch.
        base_vertex: i32,
        /// Absolute vertex range the draw reads (diagnostic only).
        vertices: Range<u32>,
    },
    EndPass,
}

/// Commands recorded for one frame slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandList {
    commands: Vec<Command>,
    recording: bool,
}

impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears previous contents and opens the list for recording.
    pub fn begin(&mut self) {
        self.commands.clear();
        self.recording = true;
    }

    pub fn end(&mut self) {
        self.recording = false;
    }

    #[inline]
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Appends a command. Ignored when the list is not recording.
    pub fn record(&mut self, command: Command) {
        if self.recording {
            self.commands.push(command);
        } else {
            log::debug!("command recorded outside begin/end ignored: {command:?}");
        }
    }

    #[inline]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::DrawIndexed { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_clears_previous_frame() {
        let mut list = CommandList::new();
        list.begin();
        list.record(Command::EndPass);
        list.end();
        assert_eq!(list.len(), 1);

        list.begin();
        assert!(list.is_empty());
        assert!(list.is_recording());
    }

    #[test]
    fn closed_list_ignores_records() {
        let mut list = CommandList::new();
        list.record(Command::EndPass);
        assert!(list.is_empty());
    }
}
