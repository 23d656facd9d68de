use std::collections::VecDeque;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use log::{debug, info};
use reqwest::Client;
use serde_json::json;

use super::sse::{parse_event, CompletionEvent, SseDecoder};
use super::{ChatModel, CompletionRequest, FragmentStream, ModelError};
use crate::web::models::{Message, Role};

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct OpenAiModel {
    base_url: String,
    api_key: String,
    model: String,
    client: Client,
}

impl OpenAiModel {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        info!("Using model {} at {}", model, base_url);
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiModel {
    async fn stream_chat(&self, request: CompletionRequest) -> Result<FragmentStream, ModelError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(Message::new(Role::System, request.system));
        messages.extend(request.messages);

        let payload = json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
        });

        debug!("Sending {} messages to {}", messages.len(), url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(fragments(response.bytes_stream().boxed()))
    }
}

struct StreamState {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    done: bool,
}

/// Turns a raw event-stream body into text fragments, ending at `[DONE]`
/// or when the body closes.
fn fragments(body: BoxStream<'static, reqwest::Result<Bytes>>) -> FragmentStream {
    let state = StreamState {
        body,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            while let Some(data) = state.pending.pop_front() {
                match parse_event(&data) {
                    Ok(CompletionEvent::Delta(Some(text))) => return Some((Ok(text), state)),
                    Ok(CompletionEvent::Delta(None)) => continue,
                    Ok(CompletionEvent::Done) => return None,
                    Err(e) => {
                        state.pending.clear();
                        state.done = true;
                        return Some((Err(e), state));
                    }
                }
            }

            if state.done {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let payloads = state.decoder.push(&chunk);
                    state.pending.extend(payloads);
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(ModelError::Transport(e)), state));
                }
                None => {
                    state.done = true;
                    let payloads = state.decoder.finish();
                    state.pending.extend(payloads);
                }
            }
        }
    })
    .boxed()
}
