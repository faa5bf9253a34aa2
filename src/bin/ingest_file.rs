use std::env;

use anyhow::Result;

use research_assist::infrastructure::source_resolver::IngestRequest;
use research_assist::{build_assistant, load_config};

/// Offline ingestion: runs the resolve → validate → embed → upsert pipeline
/// in the foreground for a local chunks file, then prints the collection
/// stats. Useful for seeding an index without the service running.
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: ingest-file <chunks.json>");
        std::process::exit(1);
    }

    let config = load_config()?;
    let assistant = build_assistant(&config).await?;

    let request = IngestRequest {
        chunks: None,
        file_path: Some(args[1].clone()),
    };

    let service = assistant.ingest_service();
    let chunks = service.prepare(request).await?;
    let count = chunks.len();
    log::info!("Validated {} chunks from {}", count, args[1]);

    service.embed_and_store(chunks).await?;
    let stats = assistant.stats().await?;
    println!(
        "Ingested {} chunks; collection '{}' now holds {} chunks.",
        count, stats.collection_name, stats.total_chunks
    );
    Ok(())
}
