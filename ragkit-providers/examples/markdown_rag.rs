//! Retrieval-augmented answers over a directory of markdown articles
//!
//! Run with:
//!   cargo run --example markdown_rag --features ollama -- <wiki-dir> "<question>"
//!
//! Every `*.md` file under the directory is embedded, the best matching
//! article is handed to the language model, and the answer is streamed.

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use ragkit_core::corpus::{article_schema, load_markdown_dir, PATH_FIELD};
use ragkit_core::logging::init_stdout_logging;
use ragkit_core::pipeline::StreamedQuery;
use ragkit_core::prelude::*;
use ragkit_providers::ollama::Ollama;
use tokio_util::sync::CancellationToken;

const COLLECTION: &str = "articles";

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let root = args.next().unwrap_or_else(|| "wiki".to_string());
    let question = args
        .next()
        .unwrap_or_else(|| "How do I write a new advanced search?".to_string());

    let config = RagConfig::from_env()?;
    init_stdout_logging(&config.log_level)?;

    let ollama = Arc::new(Ollama::from_config(&config)?);
    let dimensions = ollama.embed("probe").await?.len();

    let store = Arc::new(RecordStore::new());
    store.create_collection(COLLECTION, article_schema(dimensions))?;

    let pipeline = SearchPipeline::new(store, ollama.clone(), config.pipeline_config())
        .with_generator(ollama, config.language_model.clone());

    let started = Instant::now();
    let items = load_markdown_dir(&root)?;
    match pipeline.ingest(COLLECTION, items).await {
        Ok(report) => println!(
            "Generated collection from {} ({} articles) in {:?}",
            root,
            report.keys.len(),
            started.elapsed()
        ),
        // Partial corpora are still searchable
        Err(Error::Ingest(e)) => eprintln!("{}", e),
        Err(e) => return Err(e),
    }

    // Ctrl-C stops the answer, not the process
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let StreamedQuery { hits, answer } = pipeline.query_stream(COLLECTION, &question, 1).await?;
    let Some(top) = hits.first() else {
        println!("No articles matched.");
        return Ok(());
    };

    if let Some(answer) = answer {
        let mut stream = answer?.with_cancellation(cancel);
        let mut stdout = std::io::stdout();
        while let Some(chunk) = stream.next().await {
            match chunk? {
                StreamingChoice::Message(text) => {
                    print!("{}", text);
                    stdout.flush()?;
                }
                StreamingChoice::Done => break,
            }
        }
    }

    println!();
    println!();
    println!("Query: {}", question);
    println!(
        "Top article result was: {} (score {:.4})",
        top.record.text(PATH_FIELD).unwrap_or_default(),
        top.score
    );

    Ok(())
}
