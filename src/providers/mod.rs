//! Provider adapter trait and the shared HTTP plumbing adapters build on.
//!
//! `ProviderAdapter` generalizes the inherited `ClientWrapper` trait (`send_message`,
//! `send_message_stream`, `model_name`) to the OpenAI chat-completion envelope this
//! gateway speaks externally, adding `supports_model`/`get_supported_models` for the
//! router.

pub mod anthropic;
pub mod common;
pub mod fake;
pub mod openai;

use crate::error::GatewayError;
use crate::messages::{ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse};
use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatCompletionChunk, GatewayError>> + Send>>;

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse, GatewayError>;

    async fn stream(&self, request: &ChatCompletionRequest) -> Result<ChunkStream, GatewayError>;

    fn supports_model(&self, model: &str) -> bool {
        self.get_supported_models().iter().any(|m| m == model)
    }

    fn get_supported_models(&self) -> Vec<String>;
}
