//! Run command - long-lived bot or dashboard process

use anyhow::{Context, Result, bail};
use newsroom_adapters::dashboard::{self, DashboardState};
use newsroom_domain::usecases::{Scheduler, SchedulerConfig, scheduler::DEFAULT_MISFIRE_GRACE};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

use crate::args::RunArgs;
use crate::bot::{CommandHandler, run_polling};
use crate::config::{AppConfig, AppMode};
use crate::wiring::App;

pub async fn execute(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let mode = args.mode.unwrap_or(config.app_mode);

    let bot_mode = match mode {
        AppMode::Bot => true,
        AppMode::Dashboard => false,
        AppMode::Collector => bail!(
            "APP_MODE=collector needs a Telegram user client, which the Bot API does not provide"
        ),
    };

    let app = App::build(config).await?;
    app.seed_target().await?;

    tracing::info!(
        mode = ?mode,
        timezone = %app.config.timezone,
        slots = ?app.config.active_slots().iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        feeds = app.config.feeds.len(),
        db = %app.config.db_path.display(),
        "Starting newsroom"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
        }
        let _ = shutdown_tx.send(true);
    });

    if bot_mode {
        run_bot(app, shutdown_rx).await
    } else {
        run_dashboard(app, shutdown_rx).await
    }
}

async fn run_bot(app: App, shutdown: watch::Receiver<bool>) -> Result<()> {
    let me = app
        .bot
        .get_me()
        .await
        .context("Telegram rejected the bot token")?;
    tracing::info!(bot_id = me.id, username = ?me.username, "Connected to Telegram");

    let today = app.publisher.today();
    match app.planner.ensure_daily_queue(today).await {
        Ok(outcome) => tracing::info!(day = %today, outcome = %outcome, "Startup planning"),
        Err(e) => tracing::warn!(day = %today, error = %e, "Startup planning failed"),
    }

    let scheduler = Scheduler::new(
        app.publisher.clone(),
        app.clock.clone(),
        SchedulerConfig {
            timezone: app.config.timezone,
            slots: app.config.active_slots(),
            misfire_grace: DEFAULT_MISFIRE_GRACE,
        },
    );

    let handler = Arc::new(CommandHandler::new(
        app.store.clone(),
        app.planner.clone(),
        app.publisher.clone(),
        app.clock.clone(),
        app.config.active_slots(),
    ));

    tokio::join!(
        scheduler.run(shutdown.clone()),
        run_polling(app.bot.clone(), handler, shutdown),
    );

    tracing::info!("Shut down gracefully");
    Ok(())
}

async fn run_dashboard(app: App, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let state = DashboardState {
        store: app.store.clone(),
        publisher: app.publisher.clone(),
        clock: app.clock.clone(),
        post_times: app.config.active_slots(),
    };

    dashboard::serve(app.config.dashboard_port, state, async move {
        let _ = shutdown.wait_for(|stop| *stop).await;
    })
    .await
    .context("Dashboard server failed")?;

    tracing::info!("Shut down gracefully");
    Ok(())
}
