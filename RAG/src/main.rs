use anyhow::Result;
use clap::Parser;
use helpscout_rag::config::{self, Config};
use helpscout_rag::pipeline;

/// Answer a question from the Help Scout knowledge base PDF.
#[derive(Parser, Debug)]
#[command(name = "helpscout_rag", version)]
struct Cli {
    /// The user's question
    query: String,

    /// PDF file used as the knowledge source
    #[arg(long, default_value = config::DEFAULT_PDF_PATH)]
    pdf: String,

    #[arg(long, default_value = config::DEFAULT_INDEX_NAME)]
    index_name: String,

    #[arg(long, default_value = config::DEFAULT_NAMESPACE)]
    namespace: String,

    /// Number of chunks handed to the chat model
    #[arg(long, default_value_t = 4)]
    top_k: usize,

    /// Also print the retrieved chunks
    #[arg(long)]
    show_context: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    config.pdf_path = cli.pdf;
    config.index_name = cli.index_name;
    config.namespace = cli.namespace;
    config.top_k = cli.top_k;

    let answer = pipeline::run(&config, &cli.query).await?;

    if cli.show_context {
        for (rank, chunk) in answer.context.iter().enumerate() {
            println!("[{}] score {:.3}\n{}\n", rank + 1, chunk.score, chunk.content);
        }
    }
    println!("{}", answer.answer);

    Ok(())
}
