use crate::batching::for_each_batch;
use crate::models::*;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::future::Future;

pub const API_VERSION: &str = "2024-07";
const UPSERT_BATCH_SIZE: usize = 32;

/// Index management on the Pinecone control plane.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IndexAdmin: Send + Sync {
    async fn list_index_names(&self) -> Result<Vec<String>>;

    async fn describe_index(&self, name: &str) -> Result<IndexDescription>;

    async fn create_index(&self, request: &CreateIndexRequest) -> Result<IndexDescription>;
}

/// Vector operations against one index host.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IndexData: Send + Sync {
    /// Returns how many vectors the service acknowledged.
    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<u64>;

    async fn query(&self, namespace: &str, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>>;

    async fn namespace_vector_count(&self, namespace: &str) -> Result<u64>;
}

pub(crate) fn with_pinecone_headers(builder: RequestBuilder, api_key: &str) -> RequestBuilder {
    builder
        .header("Api-Key", api_key)
        .header("X-Pinecone-API-Version", API_VERSION)
}

pub(crate) async fn ensure_success(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();
    Err(anyhow::anyhow!("Pinecone API error ({}): {}", status, error_text))
}

/// Uses the freshly created index, or describes it when creation reported
/// that it already exists (`None`).
pub(crate) async fn create_or_existing<C, D, DFut>(created: C, describe: D) -> Result<IndexDescription>
where
    C: Future<Output = Result<Option<IndexDescription>>>,
    D: FnOnce() -> DFut,
    DFut: Future<Output = Result<IndexDescription>>,
{
    match created.await? {
        Some(description) => Ok(description),
        None => describe().await,
    }
}

/// Upserts in batches and adds up the acknowledged counts.
pub(crate) async fn upsert_in_batches<'a, F, Fut>(records: &'a [VectorRecord], send: F) -> Result<u64>
where
    F: FnMut(&'a [VectorRecord]) -> Fut,
    Fut: Future<Output = Result<u64>>,
{
    let counts = for_each_batch(records, UPSERT_BATCH_SIZE, send).await?;
    Ok(counts.into_iter().sum())
}

/// Index hosts come back without a scheme.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[derive(Clone)]
pub struct PineconeClient {
    client: Client,
    api_key: String,
    host: String,
}

impl PineconeClient {
    pub fn new(api_key: &str, host: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            host: normalize_host(host),
        }
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Data-plane connection for an index described by the control plane.
    pub fn index(&self, description: &IndexDescription) -> Result<IndexConnection> {
        if description.host.is_empty() {
            return Err(anyhow::anyhow!(
                "index {} has no host yet",
                description.name
            ));
        }

        Ok(IndexConnection {
            client: self.client.clone(),
            api_key: self.api_key.clone(),
            host: normalize_host(&description.host),
        })
    }
}

#[async_trait]
impl IndexAdmin for PineconeClient {
    async fn list_index_names(&self) -> Result<Vec<String>> {
        let url = format!("{}/indexes", self.host);
        let response = with_pinecone_headers(self.client.get(&url), &self.api_key)
            .send()
            .await
            .context("failed to list Pinecone indexes")?;

        let list: IndexList = ensure_success(response).await?.json().await?;
        Ok(list.indexes.into_iter().map(|index| index.name).collect())
    }

    async fn describe_index(&self, name: &str) -> Result<IndexDescription> {
        let url = format!("{}/indexes/{}", self.host, name);
        let response = with_pinecone_headers(self.client.get(&url), &self.api_key)
            .send()
            .await
            .with_context(|| format!("failed to describe index {}", name))?;

        Ok(ensure_success(response).await?.json().await?)
    }

    async fn create_index(&self, request: &CreateIndexRequest) -> Result<IndexDescription> {
        let name = request.name.as_str();
        create_or_existing(self.post_create(request), move || self.describe_index(name)).await
    }
}

impl PineconeClient {
    /// `None` when the index already exists.
    async fn post_create(&self, request: &CreateIndexRequest) -> Result<Option<IndexDescription>> {
        let url = format!("{}/indexes", self.host);
        let response = with_pinecone_headers(self.client.post(&url), &self.api_key)
            .json(request)
            .send()
            .await
            .with_context(|| format!("failed to create index {}", request.name))?;

        if response.status() == StatusCode::CONFLICT {
            log::warn!("Index {} was created concurrently", request.name);
            return Ok(None);
        }

        Ok(Some(ensure_success(response).await?.json().await?))
    }
}

#[derive(Clone)]
pub struct IndexConnection {
    client: Client,
    api_key: String,
    host: String,
}

impl IndexConnection {
    async fn post<T: serde::Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response> {
        let url = format!("{}{}", self.host, path);
        let response = with_pinecone_headers(self.client.post(&url), &self.api_key)
            .json(body)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?;

        ensure_success(response).await
    }
}

#[async_trait]
impl IndexData for IndexConnection {
    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<u64> {
        let upserted = upsert_in_batches(records, move |batch| async move {
            let request = UpsertRequest {
                vectors: batch,
                namespace,
            };
            let response: UpsertResponse = self.post("/vectors/upsert", &request).await?.json().await?;
            Ok(response.upserted_count)
        })
        .await?;

        log::info!("Upserted {} vectors into namespace {}", upserted, namespace);
        Ok(upserted)
    }

    async fn query(&self, namespace: &str, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>> {
        let request = QueryRequest {
            namespace,
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
        };
        let response: QueryResponse = self.post("/query", &request).await?.json().await?;

        let mut matches = response.matches;
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(matches)
    }

    async fn namespace_vector_count(&self, namespace: &str) -> Result<u64> {
        let stats: IndexStats = self
            .post("/describe_index_stats", &serde_json::json!({}))
            .await?
            .json()
            .await?;

        Ok(stats
            .namespaces
            .get(namespace)
            .map(|ns| ns.vector_count)
            .unwrap_or(0))
    }
}
