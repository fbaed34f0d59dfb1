//! Behavior compiler for SceneForge.
//!
//! Generated behavior is Lua 5.4 source. `BehaviorCompiler` discovers the
//! entry point, evaluates the text in a whitelist-only environment and hands
//! back an `ObjectBehavior` (zero-argument factory) or a `ToolBehavior`
//! (`(context, parameters) -> result`). All execution runs under an
//! instruction budget and a VM memory ceiling.

pub mod bindings;
pub mod compiler;
pub mod entry;
pub mod error;
pub mod fragment;
pub mod sandbox;

pub use compiler::{BehaviorCompiler, ObjectBehavior, ToolBehavior};
pub use entry::{find_entry_point, BehaviorKind};
pub use error::{CompileError, ScriptError};
pub use fragment::{MeshSpec, MountedFragment, Shape, Vec3};
pub use sandbox::ScriptLimits;
