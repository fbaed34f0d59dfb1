pub mod error;
pub mod prompt;
pub mod registry;

pub use error::ToolError;
pub use prompt::tool_prompt;
pub use registry::ToolRegistry;
