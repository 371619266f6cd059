//! Client for the local Ollama HTTP API.
//!
//! Exposes the two streaming call styles the chatbot uses: the chat API
//! (`/api/chat`, the primary path) and the generate API (`/api/generate`,
//! the fallback for models that predate chat support). Both return NDJSON
//! bodies: one JSON object per line, ending with a `"done":true` marker.

use std::pin::Pin;
use std::time::Duration;

use anyhow::{anyhow, Result};
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::chat::{ChatMessage, ChatRole};
use crate::config;

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

/// One NDJSON line from either streaming endpoint. The two call styles
/// use different field names for their payload; `done` marks the final
/// line of a stream.
#[derive(Deserialize)]
struct ChunkBody {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    done: bool,
}

#[derive(Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Deserialize)]
struct OllamaModelsResponse {
    models: Vec<OllamaModel>,
}

/// One unit of partial assistant output, decoded once per NDJSON line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    /// Chat API shape: `{"message":{"content":…}}`.
    Chat(String),
    /// Generate API shape: `{"response":…}`.
    Completion(String),
    /// Anything else, including unparseable lines. Contributes no text.
    Unknown,
}

impl StreamChunk {
    pub fn text(&self) -> &str {
        match self {
            StreamChunk::Chat(text) | StreamChunk::Completion(text) => text,
            StreamChunk::Unknown => "",
        }
    }
}

/// A lazy, single-pass sequence of streamed chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

/// Decode a single NDJSON line. The chat-shape field wins when both are
/// somehow present; a line with neither shape is `Unknown`.
fn decode_line(line: &str) -> StreamChunk {
    match serde_json::from_str::<ChunkBody>(line) {
        Ok(body) => {
            if let Some(message) = body.message {
                StreamChunk::Chat(message.content)
            } else if let Some(response) = body.response {
                StreamChunk::Completion(response)
            } else {
                StreamChunk::Unknown
            }
        }
        Err(_) => StreamChunk::Unknown,
    }
}

/// Pull complete lines out of the buffer, leaving any partial trailing
/// line in place for the next byte chunk. Blank lines are skipped.
fn drain_lines(buf: &mut String) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buf.find('\n') {
        let line = buf[..pos].trim_end_matches('\r').to_string();
        buf.drain(..=pos);
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    lines
}

/// Wrap an HTTP response body into a stream of decoded chunks,
/// buffering partial NDJSON lines across byte chunks.
fn ndjson_chunks(response: reqwest::Response) -> ChunkStream {
    let mut bytes = response.bytes_stream();
    Box::pin(async_stream::stream! {
        let mut buf = String::new();
        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(b) => b,
                // A mid-stream read error ends the turn with whatever
                // text arrived so far.
                Err(_) => return,
            };
            buf.push_str(&String::from_utf8_lossy(&chunk));
            for line in drain_lines(&mut buf) {
                yield decode_line(&line);
            }
        }
        let remaining = buf.trim().to_string();
        if !remaining.is_empty() {
            yield decode_line(&remaining);
        }
    })
}

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Self {
        // Connect timeout so an unreachable server fails the turn promptly.
        // No read timeout: generation length is unbounded.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.to_string(),
        }
    }

    /// Primary call: the chat API with full message history.
    pub async fn chat_stream(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<ChunkStream> {
        let url = format!("{}/api/chat", self.base_url);

        let request = ChatRequest {
            model: model.to_string(),
            messages,
            stream: true,
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Ollama chat request failed with status: {}. Make sure Ollama is running with: ollama serve",
                response.status()
            ));
        }

        Ok(ndjson_chunks(response))
    }

    /// Fallback call: the generate API with a single formatted prompt.
    pub async fn generate_stream(&self, model: &str, prompt: &str) -> Result<ChunkStream> {
        let url = format!("{}/api/generate", self.base_url);

        let request = GenerateRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            stream: true,
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Ollama generate request failed with status: {}. Make sure Ollama is running with: ollama serve",
                response.status()
            ));
        }

        Ok(ndjson_chunks(response))
    }

    /// One turn's worth of backend calls: chat API first, then the
    /// generate API with the formatted prompt template. Errors from
    /// both paths are combined; there is no further retry.
    pub async fn respond(
        &self,
        model: &str,
        prompt: &str,
        history: &[ChatMessage],
    ) -> Result<ChunkStream> {
        let mut messages = vec![ChatMessage::new(ChatRole::System, config::SYSTEM_PROMPT)];
        messages.extend_from_slice(history);
        messages.push(ChatMessage::new(ChatRole::User, prompt));

        match self.chat_stream(model, messages).await {
            Ok(stream) => Ok(stream),
            Err(chat_err) => {
                match self
                    .generate_stream(model, &config::format_prompt(prompt))
                    .await
                {
                    Ok(stream) => Ok(stream),
                    Err(gen_err) => Err(anyhow!(
                        "chat API failed ({chat_err}); generate fallback also failed ({gen_err})"
                    )),
                }
            }
        }
    }

    /// Startup probe: list the tags the local server has pulled.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("Failed to list models: {}", response.status()));
        }

        let models_response: OllamaModelsResponse = response.json().await?;
        let model_names: Vec<String> = models_response
            .models
            .into_iter()
            .map(|model| model.name)
            .collect();

        Ok(model_names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_chat_shape() {
        let chunk = decode_line(
            r#"{"model":"tinyllama:latest","message":{"role":"assistant","content":"Hel"},"done":false}"#,
        );
        assert_eq!(chunk, StreamChunk::Chat("Hel".to_string()));
    }

    #[test]
    fn decode_completion_shape() {
        let chunk = decode_line(r#"{"model":"tinyllama:latest","response":"Hi","done":false}"#);
        assert_eq!(chunk, StreamChunk::Completion("Hi".to_string()));
    }

    #[test]
    fn decode_unknown_shape() {
        assert_eq!(
            decode_line(r#"{"status":"loading model"}"#),
            StreamChunk::Unknown
        );
        assert_eq!(decode_line("not json at all"), StreamChunk::Unknown);
    }

    #[test]
    fn done_marker_with_empty_content_yields_no_text() {
        let chunk = decode_line(
            r#"{"model":"tinyllama:latest","message":{"role":"assistant","content":""},"done":true,"done_reason":"stop"}"#,
        );
        assert_eq!(chunk.text(), "");
    }

    #[test]
    fn chat_chunks_concatenate_in_order() {
        let lines = [
            r#"{"message":{"content":"Hel"},"done":false}"#,
            r#"{"message":{"content":"lo"},"done":false}"#,
        ];
        let text: String = lines
            .iter()
            .map(|l| decode_line(l).text().to_string())
            .collect();
        assert_eq!(text, "Hello");
    }

    #[test]
    fn completion_chunks_concatenate_in_order() {
        let lines = [r#"{"response":"Hi"}"#, r#"{"response":" there"}"#];
        let text: String = lines
            .iter()
            .map(|l| decode_line(l).text().to_string())
            .collect();
        assert_eq!(text, "Hi there");
    }

    #[test]
    fn drain_lines_buffers_partial_lines() {
        let mut buf = String::from("{\"response\":\"a\"}\n{\"resp");
        let lines = drain_lines(&mut buf);
        assert_eq!(lines, vec![r#"{"response":"a"}"#.to_string()]);
        assert_eq!(buf, "{\"resp");

        buf.push_str("onse\":\"b\"}\n");
        let lines = drain_lines(&mut buf);
        assert_eq!(lines, vec![r#"{"response":"b"}"#.to_string()]);
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_lines_skips_blank_and_strips_cr() {
        let mut buf = String::from("{\"response\":\"a\"}\r\n\n{\"response\":\"b\"}\r\n");
        let lines = drain_lines(&mut buf);
        assert_eq!(
            lines,
            vec![
                r#"{"response":"a"}"#.to_string(),
                r#"{"response":"b"}"#.to_string()
            ]
        );
    }
}
