//! Multi-turn conversation with a local model
//!
//! Run with: cargo run --example chat_history --features ollama

use ragkit_core::logging::init_stdout_logging;
use ragkit_core::prelude::*;
use ragkit_providers::ollama::Ollama;

#[tokio::main]
async fn main() -> Result<()> {
    let config = RagConfig::from_env()?;
    init_stdout_logging(&config.log_level)?;

    let provider = Ollama::from_config(&config)?;

    let mut history = ChatHistory::with_system(
        "Answer any question put to you with a quote from one of the works of Douglas Adams.",
    );
    history.push_user("What is the meaning of life the universe and everything? Include citation.");
    history.push_assistant("Forty-two");
    history.push_user("In what book and chapter can I find this quote?");

    let history_len = history.len();
    let request = ChatRequest::new(config.language_model.clone(), history.messages().to_vec());
    let reply = provider.complete(request).await?;
    history.push_assistant(reply);

    for message in history.since(history_len) {
        println!("{}: {}", message.role.as_str(), message.text());
    }

    Ok(())
}
