use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::dispatcher::ChatService;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Serialize, Deserialize, Debug, Clone)]
struct Part {
    text: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

impl Content {
    fn turn(role: &str, text: &str) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

fn extract_reply(response: GenerateResponse) -> Result<String> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Gemini returned no candidates"))?;

    let reply: String = candidate
        .content
        .parts
        .into_iter()
        .map(|part| part.text)
        .collect();

    if reply.is_empty() {
        return Err(anyhow!("Gemini returned an empty reply"));
    }
    Ok(reply)
}

/// One conversation with the Gemini API. The session owns the turn
/// history; the rest of the program never sees prior turns and relies
/// on the session for multi-turn context. Cloning shares the history.
#[derive(Clone)]
pub struct ChatSession {
    client: Client,
    api_key: String,
    model: String,
    history: Arc<Mutex<Vec<Content>>>,
}

impl ChatSession {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one user turn and return the model's reply. The history
    /// only grows when the exchange succeeds, so a failed call can be
    /// retried by the user without a dangling turn.
    pub async fn send(&self, text: &str) -> Result<String> {
        let mut history = self.history.lock().await;

        let mut contents = history.clone();
        contents.push(Content::turn("user", text));
        let request = GenerateRequest {
            contents: contents.clone(),
        };

        let url = format!("{}/models/{}:generateContent", BASE_URL, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Gemini API error {}: {}", status, body));
        }

        let reply = extract_reply(response.json().await?)?;

        contents.push(Content::turn("model", &reply));
        *history = contents;
        Ok(reply)
    }
}

#[async_trait]
impl ChatService for ChatSession {
    async fn send(&self, text: &str) -> Result<String> {
        ChatSession::send(self, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_reply_from_response() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{
                "candidates": [{
                    "content": {
                        "role": "model",
                        "parts": [{"text": "hi "}, {"text": "there"}]
                    },
                    "finishReason": "STOP"
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(extract_reply(response).unwrap(), "hi there");
    }

    #[test]
    fn missing_candidates_is_an_error() {
        let response: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(extract_reply(response).is_err());
    }
}
