use crate::batching::for_each_batch;
use crate::models::*;
use crate::pinecone_service::{ensure_success, with_pinecone_headers, PineconeClient};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

/// Most inputs the inference endpoint accepts in one call.
const EMBED_BATCH_SIZE: usize = 96;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Embeddings: Send + Sync {
    fn dimension(&self) -> usize;

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embeddings served by Pinecone's hosted inference API.
pub struct PineconeEmbeddings {
    client: Client,
    api_key: String,
    host: String,
    model: String,
    dimension: usize,
}

impl PineconeEmbeddings {
    pub fn new(pinecone: &PineconeClient, model: &str, dimension: usize) -> Self {
        log::info!("Using embedding model {} ({} dimensions)", model, dimension);

        Self {
            client: pinecone.http().clone(),
            api_key: pinecone.api_key().to_string(),
            host: pinecone.host().to_string(),
            model: model.to_string(),
            dimension,
        }
    }

    async fn embed(&self, texts: &[&str], input_type: &'static str) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: &self.model,
            parameters: EmbedParameters {
                input_type,
                truncate: "END",
            },
            inputs: texts.iter().map(|text| EmbedInput { text: *text }).collect(),
        };

        let url = format!("{}/embed", self.host);
        let response = with_pinecone_headers(self.client.post(&url), &self.api_key)
            .json(&request)
            .send()
            .await
            .context("embedding request failed")?;

        let embed_response: EmbedResponse = ensure_success(response).await?.json().await?;
        let vectors: Vec<Vec<f32>> = embed_response.data.into_iter().map(|d| d.values).collect();
        check_batch(texts.len(), &vectors, self.dimension)?;

        Ok(vectors)
    }
}

/// One vector per input, each of the model's dimension.
fn check_batch(expected: usize, vectors: &[Vec<f32>], dimension: usize) -> Result<()> {
    if vectors.len() != expected {
        return Err(anyhow::anyhow!(
            "embedding service returned {} vectors for {} inputs",
            vectors.len(),
            expected
        ));
    }

    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        return Err(anyhow::anyhow!(
            "embedding has {} dimensions, expected {}",
            bad.len(),
            dimension
        ));
    }

    Ok(())
}

#[async_trait]
impl Embeddings for PineconeEmbeddings {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batches = for_each_batch(texts, EMBED_BATCH_SIZE, move |batch| async move {
            let batch: Vec<&str> = batch.iter().map(String::as_str).collect();
            self.embed(&batch, "passage").await
        })
        .await?;
        let embeddings: Vec<Vec<f32>> = batches.into_iter().flatten().collect();

        log::info!("Generated {} embeddings", embeddings.len());
        Ok(embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text], "query")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("no embedding returned for query"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn embed_request_shape() {
        let request = EmbedRequest {
            model: "multilingual-e5-large",
            parameters: EmbedParameters {
                input_type: "passage",
                truncate: "END",
            },
            inputs: vec![EmbedInput { text: "hello" }],
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "model": "multilingual-e5-large",
                "parameters": {"input_type": "passage", "truncate": "END"},
                "inputs": [{"text": "hello"}]
            })
        );
    }

    #[tokio::test]
    async fn documents_are_embedded_in_batches_of_96() {
        let texts: Vec<String> = (0..97).map(|i| format!("passage {i}")).collect();
        let mut batch_sizes = Vec::new();

        let batches = for_each_batch(&texts, EMBED_BATCH_SIZE, |batch| {
            batch_sizes.push(batch.len());
            let vectors = vec![vec![0.0_f32; 4]; batch.len()];
            async move { Ok(vectors) }
        })
        .await
        .unwrap();

        assert_eq!(batch_sizes, vec![96, 1]);
        assert_eq!(batches.into_iter().flatten().count(), 97);
    }

    #[test]
    fn batch_count_mismatch_is_rejected() {
        let vectors = vec![vec![0.0; 3]];

        assert!(check_batch(2, &vectors, 3).is_err());
        assert!(check_batch(1, &vectors, 3).is_ok());
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let vectors = vec![vec![0.0; 3], vec![0.0; 4]];

        assert!(check_batch(2, &vectors, 3).is_err());
    }
}
