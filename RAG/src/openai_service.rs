use crate::models::*;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

pub struct OpenAiChat {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OpenAiChat {
    pub fn new(api_key: &str, base_url: &str, model: &str, temperature: f32) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature,
        }
    }
}

fn first_choice(response: ChatCompletionResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| anyhow::anyhow!("OpenAI API returned no choices"))
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            temperature: self.temperature,
            messages,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("chat completion request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow::anyhow!("OpenAI API error ({}): {}", status, error_text));
        }

        let completion: ChatCompletionResponse = response.json().await?;
        first_choice(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn answer_is_first_choice_content() {
        let response: ChatCompletionResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "Go to Settings."}},
                {"index": 1, "message": {"role": "assistant", "content": "ignored"}}
            ]
        }))
        .unwrap();

        assert_eq!(first_choice(response).unwrap(), "Go to Settings.");
    }

    #[test]
    fn no_choices_is_an_error() {
        let response: ChatCompletionResponse =
            serde_json::from_value(json!({"choices": []})).unwrap();

        assert!(first_choice(response).is_err());
    }

    #[test]
    fn request_carries_model_and_temperature() {
        let messages = vec![ChatMessage::system("ctx"), ChatMessage::user("hi")];
        let request = ChatCompletionRequest {
            model: "gpt-4-1106-preview",
            temperature: 0.0,
            messages: &messages,
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "model": "gpt-4-1106-preview",
                "temperature": 0.0,
                "messages": [
                    {"role": "system", "content": "ctx"},
                    {"role": "user", "content": "hi"}
                ]
            })
        );
    }
}
