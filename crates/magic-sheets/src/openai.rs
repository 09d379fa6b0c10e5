//! OpenAI-compatible chat completion client

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::completion::{ChatMessage, CompletionRequest, CompletionService, TextStream, ToolResponse};
use crate::config::AssistantConfig;
use crate::error::CompletionError;
use crate::tools::RawToolCall;
use crate::transport::SseDecoder;

/// Completion service speaking the `/chat/completions` API
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    config: AssistantConfig,
}

impl OpenAiClient {
    pub fn new(config: AssistantConfig) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("magic-sheets/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response, CompletionError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(CompletionError::MissingApiKey)?;

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn first_message(&self, body: &Value) -> Result<ResponseMessage, CompletionError> {
        let response: ChatResponse = self.post(body).await?.json().await?;
        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| CompletionError::Decode("response has no choices".into()))
    }
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct WireToolCall {
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// Text carried by one streamed chunk, if any
fn chunk_text(data: &str) -> Result<Option<String>, CompletionError> {
    let chunk: StreamChunk = serde_json::from_str(data)?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|text| !text.is_empty()))
}

struct StreamState {
    bytes: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

/// Turn a provider event stream into text deltas, stopping at `[DONE]`
fn text_deltas(bytes: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>) -> TextStream {
    let state = StreamState {
        bytes,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(data) = state.pending.pop_front() {
                if data.trim() == "[DONE]" {
                    return None;
                }
                match chunk_text(&data) {
                    Ok(Some(text)) => return Some((Ok(text), state)),
                    Ok(None) => continue,
                    Err(err) => {
                        state.pending.clear();
                        state.finished = true;
                        return Some((Err(err), state));
                    }
                }
            }

            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.push(&chunk);
                    state.pending.extend(events);
                }
                Some(Err(err)) => {
                    state.finished = true;
                    return Some((Err(CompletionError::from(err)), state));
                }
                None => {
                    state.finished = true;
                    let rest = state.decoder.finish();
                    state.pending.extend(rest);
                }
            }
        }
    })
    .boxed()
}

#[async_trait]
impl CompletionService for OpenAiClient {
    async fn stream_text(&self, request: &CompletionRequest) -> Result<TextStream, CompletionError> {
        let body = json!({
            "model": self.config.model,
            "messages": request.messages(),
            "stream": true,
        });

        info!(model = %self.config.model, history = request.history.len(), "streaming completion");
        let response = self.post(&body).await?;
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        Ok(text_deltas(bytes))
    }

    async fn select_tool(
        &self,
        request: &CompletionRequest,
        assistant_text: &str,
        tools: &Value,
    ) -> Result<ToolResponse, CompletionError> {
        let mut messages = request.messages();
        if !assistant_text.is_empty() {
            messages.push(ChatMessage::assistant(assistant_text));
        }

        let body = json!({
            "model": self.config.model,
            "messages": messages,
            "tools": tools,
            "stream": false,
        });

        let message = self.first_message(&body).await?;
        let tool_calls: Vec<RawToolCall> = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| RawToolCall::new(call.function.name, call.function.arguments))
            .collect();

        debug!(tool_calls = tool_calls.len(), "tool selection finished");
        Ok(ToolResponse {
            assistant_text: message.content.unwrap_or_default(),
            tool_calls,
        })
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, CompletionError> {
        let body = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": temperature,
        });
        let message = self.first_message(&body).await?;
        Ok(message.content.unwrap_or_default())
    }
}
