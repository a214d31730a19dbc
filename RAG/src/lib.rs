pub mod config;
pub mod models;
pub mod document_processor;
pub mod embedding_service;
pub mod pinecone_service;
pub mod index_provisioner;
pub mod readiness;
pub mod batching;
pub mod vector_store;
pub mod openai_service;
pub mod query_service;
pub mod pipeline;

pub use config::Config;
pub use models::*;
pub use document_processor::{DocumentProcessor, TextSplitter};
pub use embedding_service::{Embeddings, PineconeEmbeddings};
pub use pinecone_service::{IndexAdmin, IndexConnection, IndexData, PineconeClient};
pub use vector_store::VectorStore;
pub use openai_service::{ChatModel, OpenAiChat};
pub use query_service::QueryService;
