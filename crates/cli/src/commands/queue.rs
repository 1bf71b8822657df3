//! Queue command - show a day's slots

use anyhow::{Context, Result};
use newsroom_domain::{format_day, parse_day};
use std::path::PathBuf;

use crate::args::QueueArgs;
use crate::config::AppConfig;
use crate::wiring::App;

pub async fn execute(args: QueueArgs, config_path: Option<PathBuf>) -> Result<()> {
    let app = App::build(AppConfig::load(config_path.as_deref())?).await?;

    let day = match args.day.as_deref() {
        Some(raw) => parse_day(raw).with_context(|| format!("Invalid day '{}', expected YYYY-MM-DD", raw))?,
        None => app.publisher.today(),
    };

    let queue = app.store.get_queue(day).await?;
    println!("day={} slots={}", format_day(day), queue.len());
    for row in queue {
        match row.error {
            Some(error) => println!(
                "- {} {} {} {} ({})",
                row.slot, row.status, row.format, row.guid, error
            ),
            None => println!("- {} {} {} {}", row.slot, row.status, row.format, row.guid),
        }
    }

    Ok(())
}
