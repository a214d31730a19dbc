use crate::models::*;
use crate::pinecone_service::IndexAdmin;
use crate::readiness::{poll_until, PollPolicy};
use anyhow::Result;

pub const METRIC: &str = "cosine";

#[derive(Debug, Clone)]
pub struct IndexSettings {
    pub name: String,
    pub dimension: usize,
    pub cloud: String,
    pub region: String,
}

impl IndexSettings {
    fn create_request(&self) -> CreateIndexRequest {
        CreateIndexRequest {
            name: self.name.clone(),
            dimension: self.dimension,
            metric: METRIC.to_string(),
            spec: IndexSpec {
                serverless: ServerlessSpec {
                    cloud: self.cloud.clone(),
                    region: self.region.clone(),
                },
            },
        }
    }
}

/// Makes sure the index exists and is ready, creating it when absent.
pub async fn ensure_index(
    admin: &dyn IndexAdmin,
    settings: &IndexSettings,
    policy: PollPolicy,
) -> Result<IndexDescription> {
    let existing = admin.list_index_names().await?;

    if existing.iter().any(|name| name == &settings.name) {
        println!("Existing target index: {}", settings.name);
    } else {
        admin.create_index(&settings.create_request()).await?;
        println!("Created new index: {}", settings.name);
    }

    let name = settings.name.as_str();
    let description = poll_until(&format!("index {} is ready", name), policy, move || async move {
        let description = admin.describe_index(name).await?;
        Ok(description.status.ready.then_some(description))
    })
    .await?;

    if description.dimension != settings.dimension {
        return Err(anyhow::anyhow!(
            "index {} has dimension {}, but the embedding model produces {}",
            description.name,
            description.dimension,
            settings.dimension
        ));
    }

    Ok(description)
}
