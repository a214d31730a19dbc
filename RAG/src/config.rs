use anyhow::Result;
use std::env;
use std::time::Duration;

pub const DEFAULT_PDF_PATH: &str = "pdf/knowledgebase.pdf";
pub const DEFAULT_INDEX_NAME: &str = "help-scout-assistant";
pub const DEFAULT_NAMESPACE: &str = "helpscoutassistantknowledgebase";
pub const DEFAULT_EMBEDDING_MODEL: &str = "multilingual-e5-large";
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1024;
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4-1106-preview";
pub const DEFAULT_PINECONE_HOST: &str = "https://api.pinecone.io";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct Config {
    pub pinecone_api_key: String,
    pub pinecone_cloud: String,
    pub pinecone_region: String,
    pub pinecone_host: String,
    pub openai_api_key: String,
    pub openai_base_url: String,

    pub pdf_path: String,
    pub index_name: String,
    pub namespace: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub chat_model: String,
    pub temperature: f32,
    pub top_k: usize,

    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub separator: String,

    pub poll_interval: Duration,
    pub ready_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let pinecone_api_key = env::var("PINECONE_API_KEY")
            .map_err(|_| anyhow::anyhow!("PINECONE_API_KEY environment variable not set"))?;
        let openai_api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        Ok(Self {
            pinecone_api_key,
            pinecone_cloud: env_or("PINECONE_CLOUD", "aws"),
            pinecone_region: env_or("PINECONE_REGION", "us-east-1"),
            pinecone_host: env_or("PINECONE_CONTROLLER_HOST", DEFAULT_PINECONE_HOST),
            openai_api_key,
            openai_base_url: env_or("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
            ..Self::with_keys(String::new(), String::new())
        })
    }

    /// Defaults for everything but the credentials.
    pub fn with_keys(pinecone_api_key: String, openai_api_key: String) -> Self {
        Self {
            pinecone_api_key,
            pinecone_cloud: "aws".to_string(),
            pinecone_region: "us-east-1".to_string(),
            pinecone_host: DEFAULT_PINECONE_HOST.to_string(),
            openai_api_key,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            pdf_path: DEFAULT_PDF_PATH.to_string(),
            index_name: DEFAULT_INDEX_NAME.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.0,
            top_k: 4,
            chunk_size: 1000,
            chunk_overlap: 200,
            separator: "\n".to_string(),
            poll_interval: Duration::from_secs(1),
            ready_timeout: Duration::from_secs(60),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
