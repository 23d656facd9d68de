pub mod openai;
pub mod prompt;
pub mod sse;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::web::models::Message;

pub use openai::OpenAiModel;

/// Text fragments of one generated reply, in arrival order.
pub type FragmentStream = BoxStream<'static, Result<String, ModelError>>;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode model response: {0}")]
    Decode(String),

    #[error("model API reported an error: {0}")]
    Upstream(String),
}

/// Everything the hosted model needs for one reply.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<Message>,
}

/// A hosted language model that streams its reply.
///
/// Connection and status failures are returned from `stream_chat` itself,
/// before any fragment is produced. Failures after that point arrive as
/// `Err` items on the stream.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn stream_chat(&self, request: CompletionRequest) -> Result<FragmentStream, ModelError>;
}
