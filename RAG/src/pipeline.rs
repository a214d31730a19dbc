use crate::config::Config;
use crate::document_processor::{DocumentProcessor, TextSplitter};
use crate::embedding_service::{Embeddings, PineconeEmbeddings};
use crate::index_provisioner::{ensure_index, IndexSettings};
use crate::models::*;
use crate::openai_service::OpenAiChat;
use crate::pinecone_service::PineconeClient;
use crate::query_service::QueryService;
use crate::readiness::PollPolicy;
use crate::vector_store::VectorStore;
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

/// Upserts the chunks and waits until the new vectors can be queried.
pub async fn ingest(store: &VectorStore, chunks: &[DocumentChunk], policy: PollPolicy) -> Result<u64> {
    let baseline = store.vector_count().await?;
    let upserted = store.add_documents(chunks).await?;

    store.wait_until_visible(baseline + upserted, policy).await?;
    Ok(upserted)
}

/// Loads the knowledge base, indexes it and answers `user_query`.
pub async fn run(config: &Config, user_query: &str) -> Result<RagAnswer> {
    log::info!("Initializing RAG pipeline...");
    let policy = PollPolicy::new(config.poll_interval, config.ready_timeout);

    let processor = DocumentProcessor::new(TextSplitter::from_config(config)?);
    let chunks = processor.process_pdf(Path::new(&config.pdf_path))?;

    let pinecone = PineconeClient::new(&config.pinecone_api_key, &config.pinecone_host);
    let embeddings = Arc::new(PineconeEmbeddings::new(
        &pinecone,
        &config.embedding_model,
        config.embedding_dimension,
    ));

    let settings = IndexSettings {
        name: config.index_name.clone(),
        dimension: embeddings.dimension(),
        cloud: config.pinecone_cloud.clone(),
        region: config.pinecone_region.clone(),
    };
    let description = ensure_index(&pinecone, &settings, policy).await?;
    let index = Arc::new(pinecone.index(&description)?);

    let store = Arc::new(VectorStore::new(embeddings, index, &config.namespace));
    ingest(&store, &chunks, policy).await?;

    let chat_model = Arc::new(OpenAiChat::new(
        &config.openai_api_key,
        &config.openai_base_url,
        &config.chat_model,
        config.temperature,
    ));
    let query_service = QueryService::new(store, chat_model, config.top_k);

    query_service.search_query(user_query).await
}
