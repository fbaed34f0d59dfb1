use tracing::debug;

use crate::primitives::{DrawCommand, DrawSource};

/// Where draw commands go. A real presentation layer implements this.
pub trait RenderSink {
    fn begin_frame(&mut self, frame: u64, elapsed: f64);
    fn draw(&mut self, command: DrawCommand);
    fn end_frame(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFrame {
    pub number: u64,
    pub elapsed: f64,
    pub commands: Vec<DrawCommand>,
}

/// Keeps every frame in memory.
#[derive(Debug, Default)]
pub struct FrameRecorder {
    frames: Vec<RecordedFrame>,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[RecordedFrame] {
        &self.frames
    }

    pub fn last(&self) -> Option<&RecordedFrame> {
        self.frames.last()
    }
}

impl RenderSink for FrameRecorder {
    fn begin_frame(&mut self, frame: u64, elapsed: f64) {
        self.frames.push(RecordedFrame {
            number: frame,
            elapsed,
            commands: Vec::new(),
        });
    }

    fn draw(&mut self, command: DrawCommand) {
        if let Some(frame) = self.frames.last_mut() {
            frame.commands.push(command);
        }
    }

    fn end_frame(&mut self) {}
}

/// Logs a one-line summary per frame.
#[derive(Debug, Default)]
pub struct TracingSink {
    frame: u64,
    drawn: usize,
    placeholders: usize,
}

impl RenderSink for TracingSink {
    fn begin_frame(&mut self, frame: u64, _elapsed: f64) {
        self.frame = frame;
        self.drawn = 0;
        self.placeholders = 0;
    }

    fn draw(&mut self, command: DrawCommand) {
        self.drawn += 1;
        if command.source == DrawSource::Placeholder {
            self.placeholders += 1;
        }
    }

    fn end_frame(&mut self) {
        debug!(
            frame = self.frame,
            drawn = self.drawn,
            placeholders = self.placeholders,
            "Frame rendered"
        );
    }
}
