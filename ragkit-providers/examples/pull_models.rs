//! Download the configured language and embedding models
//!
//! Run with: cargo run --example pull_models --features ollama
//!
//! Set `RAGKIT_LANGUAGE_MODEL` / `RAGKIT_EMBEDDING_MODEL` to pull others.

use futures::StreamExt;
use ragkit_core::logging::init_stdout_logging;
use ragkit_core::prelude::*;
use ragkit_providers::ollama::Ollama;

#[tokio::main]
async fn main() -> Result<()> {
    let config = RagConfig::from_env()?;
    init_stdout_logging(&config.log_level)?;

    let ollama = Ollama::from_config(&config)?;

    // Language model: print progress ourselves
    let mut progress = ollama.pull_model(&config.language_model).await?;
    while let Some(status) = progress.next().await {
        let status = status?;
        match status.percent() {
            Some(percent) => println!("{} {:.1}%", status.status, percent),
            None => println!("{}", status.status),
        }
    }

    // Embedding model: let the provider log it
    ollama.ensure_models(&[config.embedding_model.as_str()]).await?;

    println!(
        "Models ready: {}, {}",
        config.language_model, config.embedding_model
    );
    Ok(())
}
