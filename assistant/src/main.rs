mod assistant_service;
mod models;

use anyhow::Result;
use assistant_service::{ask, PineconeAssistant, DEFAULT_CONTROLLER_HOST};
use clap::Parser;
use std::env;

/// Send one message to a hosted Pinecone assistant and print its reply.
#[derive(Parser, Debug)]
#[command(name = "helpscout_assistant", version)]
struct Cli {
    #[arg(long, default_value = "help-scout")]
    assistant: String,

    #[arg(long, default_value = "How old is the earth?")]
    message: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();
    let cli = Cli::parse();

    let api_key = env::var("PINECONE_API_KEY")
        .map_err(|_| anyhow::anyhow!("PINECONE_API_KEY environment variable not set"))?;
    let controller_host = env_or("PINECONE_CONTROLLER_HOST", DEFAULT_CONTROLLER_HOST);

    let assistant = PineconeAssistant::connect(&api_key, &controller_host, &cli.assistant).await?;
    ask(&assistant, &cli.message, &mut std::io::stdout()).await?;

    Ok(())
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
