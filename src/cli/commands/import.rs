//! Import command handler

use std::path::Path;

use anyhow::Context;

use crate::config::Config;
use crate::db::Store;
use crate::models::catalog::CatalogImport;

pub async fn cmd_import(config: &Config, path: &str, dry_run: bool) -> anyhow::Result<()> {
    let import_path = Path::new(path);

    if !import_path.is_file() {
        println!("File does not exist: {path}");
        return Ok(());
    }

    let content = tokio::fs::read_to_string(import_path)
        .await
        .with_context(|| format!("Failed to read {path}"))?;
    let document: CatalogImport = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse import document {path}"))?;

    let chapter_count: usize = document.novels.iter().map(|n| n.chapters.len()).sum();
    println!(
        "Document: {} sources, {} novels, {} chapters",
        document.sources.len(),
        document.novels.len(),
        chapter_count
    );

    if dry_run {
        println!("Dry run, nothing written.");
        return Ok(());
    }

    let store = Store::new(&config.general.database_url).await?;
    let summary = store.import().import(&document).await?;

    println!("{:-<50}", "");
    println!("Sources upserted:  {}", summary.sources);
    println!("Novels upserted:   {}", summary.novels);
    println!("Chapters upserted: {}", summary.chapters);

    Ok(())
}
