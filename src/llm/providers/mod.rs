//! Concrete model-provider implementations, one module per provider family.

pub mod anthropic;
pub mod azure_openai;
pub mod base;
pub mod bedrock;
pub mod google;
pub mod mistral;
pub mod openai;
pub mod openai_compatible;

pub use anthropic::AnthropicChatModel;
pub use azure_openai::AzureOpenAiProvider;
pub use base::{HttpProviderClient, OpenAiCompatible};
pub use bedrock::BedrockProvider;
pub use google::GoogleProvider;
pub use mistral::MistralProvider;
pub use openai::OpenAiProvider;
