//! Write the client-side search index consumed by the search box plugin.

use anyhow::{Context, Result};
use quicksilver_blog::config::Config;
use quicksilver_blog::content::{build_search_index, FsContentStore};
use tracing::{info, warn};

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("quicksilver_blog=info".parse()?)
                .add_directive("search_index=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    let Some(posts_dir) = config.content_dir.clone() else {
        warn!("CONTENT_DIR is empty, nothing to index");
        return Ok(());
    };

    let store = FsContentStore::new(posts_dir, config.pages_dir.clone());
    let entries = build_search_index(&store).context("Failed to build search index")?;

    std::fs::create_dir_all(&config.static_dir)
        .with_context(|| format!("Failed to create {}", config.static_dir.display()))?;
    let path = config.static_dir.join("search-index.json");
    let json = serde_json::to_string(&entries)?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;

    info!("Indexed {} post(s) into {}", entries.len(), path.display());
    Ok(())
}
