//! Post commands - publish a slot or a single item immediately

use anyhow::{Context, Result, bail};
use newsroom_domain::{SlotTime, usecases::PublishOutcome};
use std::path::PathBuf;

use crate::args::PostSlotArgs;
use crate::config::AppConfig;
use crate::wiring::App;

pub async fn execute_slot(args: PostSlotArgs, config_path: Option<PathBuf>) -> Result<()> {
    let slot: SlotTime = args
        .slot
        .parse()
        .with_context(|| format!("Invalid slot '{}'", args.slot))?;

    let app = App::build(AppConfig::load(config_path.as_deref())?).await?;
    let outcome = app.publisher.post_scheduled(slot).await?;

    report(outcome)
}

pub async fn execute_now(config_path: Option<PathBuf>) -> Result<()> {
    let app = App::build(AppConfig::load(config_path.as_deref())?).await?;

    let Some(target) = app.publisher.resolve_target().await? else {
        bail!("target_chat_id not set: use /settarget or TARGET_CHAT_ID");
    };
    let outcome = app.publisher.post_one(&target).await?;

    report(outcome)
}

fn report(outcome: PublishOutcome) -> Result<()> {
    println!("posted={} {}", outcome.is_posted(), outcome);
    if let PublishOutcome::Failed { error } = outcome {
        bail!("Publication failed: {}", error);
    }
    Ok(())
}
