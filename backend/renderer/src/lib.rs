pub mod driver;
pub mod primitives;
pub mod sink;

pub use driver::{Fault, FaultKind, FrameDriver, FrameReport, ENTRY_POINT_PROPERTY};
pub use primitives::{builtin_mesh, placeholder_mesh, DrawCommand, DrawSource, PLACEHOLDER_COLOR};
pub use sink::{FrameRecorder, RecordedFrame, RenderSink, TracingSink};
