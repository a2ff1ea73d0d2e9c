// SPDX-License-Identifier: MIT
//! OpenAI-compatible chat-completions adapter.
//!
//! Works against any endpoint speaking the `/chat/completions` protocol.
//! Non-streaming requests go through exponential-backoff retry; streaming
//! parses `data:` SSE lines incrementally from the chunked response body,
//! ending at `[DONE]`. The cancel token is honored between chunks — the
//! engine racing the token against the stream drops the connection, this
//! check is the cooperative half.

use super::{Backend, BackendOptions, ChunkStream};
use crate::error::BackendError;
use crate::retry::{retry_with_backoff, RetryConfig};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    retry: RetryConfig,
}

impl OpenAiBackend {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn send(
        &self,
        prompt: &str,
        opts: &BackendOptions,
        stream: bool,
    ) -> Result<reqwest::Response, BackendError> {
        let body = ChatRequest {
            model: &opts.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            max_tokens: opts.max_tokens,
            temperature: opts.temperature,
            stream,
        };
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: condense(&message),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Backend for OpenAiBackend {
    async fn generate(&self, prompt: &str, opts: &BackendOptions) -> Result<String, BackendError> {
        debug!(model = %opts.model, prompt_bytes = prompt.len(), "chat completion request");
        retry_with_backoff(&self.retry, &opts.cancel, || async {
            let response = self.send(prompt, opts, false).await?;
            let body: ChatResponse = response
                .json()
                .await
                .map_err(|err| BackendError::MalformedResponse(err.to_string()))?;
            body.choices
                .into_iter()
                .next()
                .map(|choice| choice.message.content)
                .ok_or_else(|| {
                    BackendError::MalformedResponse("response contained no choices".into())
                })
        })
        .await
    }

    async fn stream_generate(
        &self,
        prompt: &str,
        opts: &BackendOptions,
    ) -> Result<ChunkStream, BackendError> {
        debug!(model = %opts.model, prompt_bytes = prompt.len(), "chat completion stream");
        let response = self.send(prompt, opts, true).await?;
        Ok(sse_chunks(response, opts.cancel.clone()).boxed())
    }

    fn streamable(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "openai"
    }
}

struct SseState {
    response: reqwest::Response,
    buffer: String,
    done: bool,
    cancel: crate::cancel::CancelToken,
}

/// Parse `data:` SSE events out of a chunked response body.
fn sse_chunks(
    response: reqwest::Response,
    cancel: crate::cancel::CancelToken,
) -> impl futures_util::Stream<Item = Result<String, BackendError>> {
    let state = SseState {
        response,
        buffer: String::new(),
        done: false,
        cancel,
    };

    futures_util::stream::unfold(state, |mut st| async move {
        loop {
            if st.done {
                return None;
            }
            if st.cancel.is_cancelled() {
                st.done = true;
                return Some((Err(BackendError::Stream("request cancelled".into())), st));
            }

            // drain complete lines already buffered
            if let Some(newline) = st.buffer.find('\n') {
                let line = st.buffer[..newline].trim().to_string();
                st.buffer.drain(..=newline);
                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim();
                if data == "[DONE]" {
                    st.done = true;
                    return None;
                }
                match serde_json::from_str::<StreamChunk>(data) {
                    Ok(event) => {
                        let text = event
                            .choices
                            .into_iter()
                            .next()
                            .and_then(|choice| choice.delta.content)
                            .unwrap_or_default();
                        if text.is_empty() {
                            continue;
                        }
                        trace!(bytes = text.len(), "stream chunk");
                        return Some((Ok(text), st));
                    }
                    Err(err) => {
                        st.done = true;
                        return Some((
                            Err(BackendError::MalformedResponse(format!(
                                "bad stream event: {err}"
                            ))),
                            st,
                        ));
                    }
                }
            }

            // need more bytes from the wire
            match st.response.chunk().await {
                Ok(Some(bytes)) => st.buffer.push_str(&String::from_utf8_lossy(&bytes)),
                Ok(None) => {
                    st.done = true;
                    return None;
                }
                Err(err) => {
                    st.done = true;
                    return Some((Err(BackendError::Http(err)), st));
                }
            }
        }
    })
}

/// Keep API error bodies log-sized.
fn condense(message: &str) -> String {
    let trimmed = message.trim();
    match trimmed.char_indices().nth(500) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

// ─── Wire types ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
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
    content: String,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Deserialize)]
struct Delta {
    content: Option<String>,
}
