//! Concrete [`InferenceProvider`](crate::gateway::inference::InferenceProvider)
//! backends. Each one owns its own `reqwest::Client` and reads its
//! credentials directly from the environment at construction time.

mod anthropic;
mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;
