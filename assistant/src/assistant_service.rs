use crate::models::*;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use std::io::Write;

const API_VERSION: &str = "2024-07";
pub const DEFAULT_CONTROLLER_HOST: &str = "https://api.pinecone.io";
/// Used when the assistant description does not name a data host.
pub const DEFAULT_DATA_HOST: &str = "https://prod-1-data.ke.pinecone.io";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssistantApi: Send + Sync {
    async fn chat(&self, messages: &[Message]) -> Result<ChatResponse>;
}

pub struct PineconeAssistant {
    client: Client,
    api_key: String,
    name: String,
    data_host: String,
}

impl PineconeAssistant {
    /// Looks the assistant up on the control plane to find where to chat with it.
    pub async fn connect(api_key: &str, controller_host: &str, name: &str) -> Result<Self> {
        let client = Client::new();
        let url = format!(
            "{}/assistant/assistants/{}",
            controller_host.trim_end_matches('/'),
            name
        );

        let response = send(client.get(&url), api_key)
            .await
            .with_context(|| format!("failed to describe assistant {}", name))?;

        let description: AssistantDescription = response.json().await?;
        log::info!(
            "Assistant {} status: {}",
            description.name,
            description.status.as_deref().unwrap_or("unknown")
        );

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            name: name.to_string(),
            data_host: data_host(description.host.as_deref()),
        })
    }
}

/// Sends a Pinecone-authenticated request, turning non-2xx replies into errors.
async fn send(builder: RequestBuilder, api_key: &str) -> Result<Response> {
    let response = builder
        .header("Api-Key", api_key)
        .header("X-Pinecone-API-Version", API_VERSION)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(anyhow::anyhow!("Pinecone API error ({}): {}", status, error_text));
    }

    Ok(response)
}

fn data_host(host: Option<&str>) -> String {
    match host.map(str::trim).filter(|h| !h.is_empty()) {
        Some(host) if host.starts_with("http://") || host.starts_with("https://") => {
            host.trim_end_matches('/').to_string()
        }
        Some(host) => format!("https://{}", host.trim_end_matches('/')),
        None => DEFAULT_DATA_HOST.to_string(),
    }
}

#[async_trait]
impl AssistantApi for PineconeAssistant {
    async fn chat(&self, messages: &[Message]) -> Result<ChatResponse> {
        let url = format!("{}/assistant/chat/{}", self.data_host, self.name);
        let request = ChatRequest {
            messages,
            stream: false,
        };

        let response = send(self.client.post(&url).json(&request), &self.api_key)
            .await
            .context("assistant chat request failed")?;

        Ok(response.json().await?)
    }
}

/// Sends one user message and writes the reply's content to `out`.
pub async fn ask(api: &dyn AssistantApi, content: &str, out: &mut dyn Write) -> Result<String> {
    let messages = [Message::user(content)];
    let response = api.chat(&messages).await?;

    log::debug!(
        "Assistant reply {:?} from {:?} (finish reason {:?}, {} citations)",
        response.id,
        response.model,
        response.finish_reason,
        response.citations.len()
    );

    writeln!(out, "{}", response.message.content)?;
    Ok(response.message.content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(content: &str) -> ChatResponse {
        serde_json::from_value(json!({
            "id": "resp-1",
            "finish_reason": "stop",
            "message": {"role": "assistant", "content": content},
            "model": "gpt-4o-2024-05-13",
            "citations": [{"position": 12, "references": []}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn ask_prints_exactly_the_message_content() {
        let mut api = MockAssistantApi::new();
        api.expect_chat()
            .times(1)
            .withf(|messages: &[Message]| {
                messages == [Message::user("How old is the earth?")]
            })
            .returning(|_| Ok(response("About 4.54 billion years.")));

        let mut out = Vec::new();
        let reply = ask(&api, "How old is the earth?", &mut out).await.unwrap();

        assert_eq!(reply, "About 4.54 billion years.");
        assert_eq!(String::from_utf8(out).unwrap(), "About 4.54 billion years.\n");
    }

    #[tokio::test]
    async fn chat_errors_print_nothing() {
        let mut api = MockAssistantApi::new();
        api.expect_chat()
            .returning(|_| Err(anyhow::anyhow!("Pinecone API error (404 Not Found)")));

        let mut out = Vec::new();
        assert!(ask(&api, "hello", &mut out).await.is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn chat_request_disables_streaming() {
        let messages = [Message::user("hi")];
        let request = ChatRequest {
            messages: &messages,
            stream: false,
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"messages": [{"role": "user", "content": "hi"}], "stream": false})
        );
    }

    #[test]
    fn data_host_gets_scheme_or_default() {
        assert_eq!(
            data_host(Some("prod-1-data.ke.pinecone.io")),
            "https://prod-1-data.ke.pinecone.io"
        );
        assert_eq!(data_host(Some("http://localhost:8080/")), "http://localhost:8080");
        assert_eq!(data_host(Some("")), DEFAULT_DATA_HOST);
        assert_eq!(data_host(None), DEFAULT_DATA_HOST);
    }
}
