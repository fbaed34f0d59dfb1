pub mod context;
pub mod error;
pub mod generation;
pub mod object;
pub mod registry;
pub mod tool;
pub mod traits;

pub use context::CapabilityContext;
pub use error::{RegistryError, SceneError};
pub use generation::{GenerationKind, GenerationOutcome, GenerationRequest, GenerationTarget};
pub use object::{
    CanvasObject, ObjectDraft, ObjectId, ObjectKind, ObjectOrigin, ObjectPatch, Position,
    Properties, PropertyValue, Provenance,
};
pub use registry::{ObjectRegistry, ObjectStore};
pub use tool::Tool;
pub use traits::{GenerationGateway, KeyValueStore};
