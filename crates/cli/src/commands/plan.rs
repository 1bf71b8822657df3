//! Plan command - fill today's queue

use anyhow::Result;
use std::path::PathBuf;

use crate::args::PlanArgs;
use crate::config::AppConfig;
use crate::wiring::App;

pub async fn execute(args: PlanArgs, config_path: Option<PathBuf>) -> Result<()> {
    let app = App::build(AppConfig::load(config_path.as_deref())?).await?;
    let day = app.publisher.today();

    let outcome = if args.replan_failed {
        app.planner.replan_failed(day).await?
    } else {
        app.planner.ensure_daily_queue(day).await?
    };

    println!("planned={} {}", outcome.did_plan(), outcome);
    Ok(())
}
