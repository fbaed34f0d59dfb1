pub mod canned;
pub mod extract;
pub mod llm;
pub mod prompts;
pub mod providers;

pub use canned::CannedGateway;
pub use llm::{LlmGateway, LlmProvider, LlmRequest, LlmResponse};
pub use providers::ProviderRegistry;
