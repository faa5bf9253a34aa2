use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::SummaryConfig;
use crate::domain::error::Error;
use crate::domain::summarizer::Summarizer;

/// Client for an OpenAI-compatible `/v1/chat/completions` endpoint.
///
/// Unlike the embedding client this one does not retry: comparison calls
/// are user-facing and synchronous, so a failure surfaces immediately as
/// `Error::Summarization`.
pub struct ChatSummarizer {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
    min_words: usize,
    max_words: usize,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl ChatSummarizer {
    pub fn new(config: &SummaryConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Summarization(format!("failed to build http client: {}", e)))?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            min_words: config.summary_min_words,
            max_words: config.summary_max_words,
        })
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, Error> {
        let url = format!("{}/chat/completions", self.api_base);
        let mut request = self.http.post(&url).json(&ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Summarization(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Summarization(format!(
                "provider returned status {}",
                status
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Summarization(format!("malformed provider response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| Error::Summarization("provider returned no choices".to_string()))
    }
}

#[async_trait]
impl Summarizer for ChatSummarizer {
    async fn summarize(&self, text: &str) -> Result<String, Error> {
        let system = format!(
            "You summarize scientific papers for researchers. \
             Write a clear prose summary of {}-{} words covering the goal, \
             methods and findings of the paper.",
            self.min_words, self.max_words
        );
        self.complete(&system, text).await
    }

    async fn compare(&self, summary_a: &str, summary_b: &str) -> Result<String, Error> {
        let system = "You compare scientific papers for researchers. Given two \
                      paper summaries, describe where the papers agree, where \
                      they differ, and what each contributes beyond the other."
            .to_string();
        let user = format!("Paper 1:\n{}\n\nPaper 2:\n{}", summary_a, summary_b);
        self.complete(&system, &user).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn summarizer_for(server: &MockServer) -> ChatSummarizer {
        ChatSummarizer::new(&SummaryConfig {
            api_base: server.uri(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 5,
            max_context_chars: 1000,
            summary_min_words: 150,
            summary_max_words: 250,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn summarize_returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"model": "gpt-4o-mini"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "A tidy summary."}}]
            })))
            .mount(&server)
            .await;

        let summary = summarizer_for(&server)
            .summarize("velvet bean is a legume")
            .await
            .unwrap();
        assert_eq!(summary, "A tidy summary.");
    }

    #[tokio::test]
    async fn provider_failure_is_summarization_error_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let result = summarizer_for(&server).summarize("text").await;
        assert!(matches!(result, Err(Error::Summarization(msg)) if msg.contains("503")));
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let result = summarizer_for(&server).compare("a", "b").await;
        assert!(matches!(result, Err(Error::Summarization(_))));
    }
}
