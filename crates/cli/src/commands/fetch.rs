//! Fetch command - one feed sweep

use anyhow::Result;
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::wiring::App;

pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let app = App::build(AppConfig::load(config_path.as_deref())?).await?;

    let fetched = app.ingestor.sweep().await;
    let total = app.store.count_items().await?;

    println!("fetched={} items_in_db={}", fetched, total);
    Ok(())
}
