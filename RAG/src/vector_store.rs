use crate::embedding_service::Embeddings;
use crate::models::*;
use crate::pinecone_service::IndexData;
use crate::readiness::{poll_until, PollPolicy};
use anyhow::Result;
use std::sync::Arc;
use uuid::Uuid;

/// Embedding-backed store over one namespace of a Pinecone index.
pub struct VectorStore {
    embeddings: Arc<dyn Embeddings>,
    index: Arc<dyn IndexData>,
    namespace: String,
}

impl VectorStore {
    pub fn new(embeddings: Arc<dyn Embeddings>, index: Arc<dyn IndexData>, namespace: &str) -> Self {
        Self {
            embeddings,
            index,
            namespace: namespace.to_string(),
        }
    }

    /// Embeds and upserts the chunks, returning how many vectors were stored.
    pub async fn add_documents(&self, chunks: &[DocumentChunk]) -> Result<u64> {
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let embeddings = self.embeddings.embed_documents(&texts).await?;

        let records: Vec<VectorRecord> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, values)| VectorRecord {
                id: Uuid::new_v4().to_string(),
                values,
                metadata: chunk.metadata(),
            })
            .collect();

        let upserted = self.index.upsert(&self.namespace, &records).await?;
        println!("Upserted knowledgebase to {}!", self.namespace);

        Ok(upserted)
    }

    pub async fn vector_count(&self) -> Result<u64> {
        self.index.namespace_vector_count(&self.namespace).await
    }

    /// Waits until the namespace reports at least `expected` vectors.
    pub async fn wait_until_visible(&self, expected: u64, policy: PollPolicy) -> Result<u64> {
        let index = self.index.as_ref();
        let namespace = self.namespace.as_str();

        poll_until(
            &format!("{} vectors are visible in {}", expected, namespace),
            policy,
            move || async move {
                let count = index.namespace_vector_count(namespace).await?;
                log::debug!("Namespace {} holds {} vectors", namespace, count);
                Ok((count >= expected).then_some(count))
            },
        )
        .await
    }

    pub async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let vector = self.embeddings.embed_query(query).await?;
        let matches = self.index.query(&self.namespace, &vector, k).await?;

        let chunks: Vec<RetrievedChunk> = matches
            .into_iter()
            .filter_map(|found| {
                let metadata = found.metadata.unwrap_or_default();
                let text = metadata
                    .get("text")
                    .and_then(|text| text.as_str())
                    .map(str::to_string);
                match text {
                    Some(content) => Some(RetrievedChunk {
                        id: found.id,
                        score: found.score,
                        content,
                        metadata,
                    }),
                    None => {
                        log::warn!("Match {} has no text metadata, skipping", found.id);
                        None
                    }
                }
            })
            .collect();

        log::info!("Found {} relevant chunks", chunks.len());
        Ok(chunks)
    }
}
