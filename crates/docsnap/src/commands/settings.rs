//! Show the effective configuration.

use super::Settings;
use docsnap_storage::BlobStore;

/// Print the merged configuration and where it came from.
pub async fn show_config(settings: &Settings) -> anyhow::Result<()> {
    let history_config = settings.config.history_config();
    let data_dir = settings.config.data_dir()?;

    println!("{}", serde_json::to_string_pretty(&history_config)?);
    println!();
    println!("Data directory: {}", data_dir.display());

    let stored = settings.history_store()?.keys().await?;
    println!("Stored histories: {}", stored.len());

    if settings.sources.is_empty() {
        println!("Sources: (defaults)");
    } else {
        println!("Sources:");
        for source in &settings.sources {
            println!("  {}", source.display());
        }
    }
    Ok(())
}
