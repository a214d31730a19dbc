use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One page of a loaded PDF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub source: String,
    pub page: usize,
    pub total_pages: usize,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub content: String,
    pub source: String,
    pub page: usize,
    pub start_index: usize,
}

impl DocumentChunk {
    /// Metadata stored next to the vector; `text` carries the chunk itself.
    pub fn metadata(&self) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("text".to_string(), Value::from(self.content.clone()));
        metadata.insert("source".to_string(), Value::from(self.source.clone()));
        metadata.insert("page".to_string(), Value::from(self.page));
        metadata.insert("start_index".to_string(), Value::from(self.start_index));
        metadata
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub score: f32,
    pub content: String,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RagAnswer {
    pub answer: String,
    pub context: Vec<RetrievedChunk>,
}

// Pinecone control plane

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexList {
    #[serde(default)]
    pub indexes: Vec<IndexDescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescription {
    pub name: String,
    pub dimension: usize,
    pub metric: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub status: IndexStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStatus {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateIndexRequest {
    pub name: String,
    pub dimension: usize,
    pub metric: String,
    pub spec: IndexSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub serverless: ServerlessSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerlessSpec {
    pub cloud: String,
    pub region: String,
}

// Pinecone data plane

#[derive(Debug, Serialize)]
pub struct UpsertRequest<'a> {
    pub vectors: &'a [VectorRecord],
    pub namespace: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertResponse {
    #[serde(default)]
    pub upserted_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest<'a> {
    pub namespace: &'a str,
    pub vector: &'a [f32],
    pub top_k: usize,
    pub include_metadata: bool,
    pub include_values: bool,
}

#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub matches: Vec<QueryMatch>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    #[serde(default)]
    pub namespaces: std::collections::HashMap<String, NamespaceStats>,
    #[serde(default)]
    pub total_vector_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceStats {
    #[serde(default)]
    pub vector_count: u64,
}

// Pinecone inference

#[derive(Debug, Serialize)]
pub struct EmbedRequest<'a> {
    pub model: &'a str,
    pub parameters: EmbedParameters,
    pub inputs: Vec<EmbedInput<'a>>,
}

#[derive(Debug, Serialize)]
pub struct EmbedParameters {
    pub input_type: &'static str,
    pub truncate: &'static str,
}

#[derive(Debug, Serialize)]
pub struct EmbedInput<'a> {
    pub text: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct EmbedResponse {
    pub data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
pub struct EmbedData {
    pub values: Vec<f32>,
}

// OpenAI chat completions

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub temperature: f32,
    pub messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}
