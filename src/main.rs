use std::net::SocketAddr;
use std::sync::Arc;

use chat_rag::Result;
use chat_rag::config::Config;
use chat_rag::llm::OllamaClient;
use chat_rag::server::{AppState, router};
use clap::Parser;
use tracing::info;

#[derive(Parser)]
#[command(name = "chat-rag")]
#[command(about = "RAG chat service backed by a local Ollama runtime")]
#[command(version)]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8000")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = Config::from_env()?;
    config.ensure_directories()?;

    let client = Arc::new(OllamaClient::new(&config)?);
    let state = AppState {
        config: Arc::new(config),
        embedder: Arc::clone(&client) as Arc<dyn chat_rag::llm::Embedder>,
        generator: client,
    };

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(cli.bind).await?;
    info!("Listening on {}", cli.bind);

    axum::serve(listener, app).await?;

    Ok(())
}
