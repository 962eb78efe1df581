//! `solverbot ingest` — Add a local PDF to the knowledge store.

use solverbot_agent::Ingestor;
use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    path: &Path,
    id: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| format!("Cannot read {}: {e}", path.display()))?;

    let document_id = id.unwrap_or_else(|| {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    });

    let stores = solverbot_memory::open(
        &config.memory.backend,
        &config.memory.resolved_database_url(),
    )
    .await?;
    let chars = Ingestor::new(stores.knowledge)
        .ingest_pdf(&document_id, bytes)
        .await?;

    println!("Ingested '{document_id}' ({chars} characters)");
    if chars == 0 {
        println!("   No text could be extracted; the document may be scanned images.");
    }

    Ok(())
}
