//! The studio ties the SceneForge services together.
//!
//! A `Studio` is constructed explicitly with a gateway and owns the object
//! store, the tool registry, the behavior compiler and the frame driver.
//! Generation requests are dispatched to spawned tasks and their outcomes
//! are applied at the start of the next tick, so rendering never waits on
//! the gateway.

pub mod events;
pub mod placement;
pub mod runner;
pub mod studio;

pub use events::{RequestId, StudioEvent, UiPanel};
pub use placement::spawn_position;
pub use runner::{run_frames, RunSummary};
pub use studio::{Studio, StudioOptions, StudioStats};
