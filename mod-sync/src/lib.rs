//! Workshop mod update detection and translation reconciliation for Total War
//! translation projects.

mod cli;
pub mod config;
pub mod core;
pub mod data;
pub mod error;
pub mod logger;
pub mod models;
pub mod progress;
pub mod analysis;
pub mod management;
pub mod services;
pub mod tools;

#[cfg(test)]
pub mod test_support;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;

use crate::cli::{Cli, Commands};
use crate::config::SyncConfig;
use crate::core::task_control::TaskControl;
use crate::data::database::open_database;
use crate::logger::LoggingOptions;
use crate::management::ModUpdateDetector;

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn execute(command: Commands, config: SyncConfig) -> anyhow::Result<()> {
    let conn = open_database(&config.database_path()).await?;
    let detector = ModUpdateDetector::from_config(&config, conn)?;

    let task = TaskControl::new();
    let interrupt = task.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            logger::log_warn("Interrupted, cancelling", Some("cli"));
            interrupt.cancel();
        }
    });

    match command {
        Commands::Scan { game } => {
            let outcome = detector.scan_mods(&game, &task).await?;
            print_json(&outcome)
        }
        Commands::Dismiss { project_id } => {
            detector.dismiss_pending_changes(&project_id).await?;
            logger::log_info(&format!("Dismissed changes of {}", project_id), Some("cli"));
            Ok(())
        }
        Commands::Reanalyze { project_id } => {
            let report = detector.reanalyze_project(&project_id, &task).await?;
            print_json(&report)
        }
    }
}

/// Command line entry point
pub fn run() -> anyhow::Result<()> {
    let args = Cli::parse();

    let mut config = match &args.config {
        Some(path) => SyncConfig::load_from(path)?,
        None => SyncConfig::load()?,
    };
    if args.config.is_some() {
        config.apply_env_overrides();
    }
    if let Some(database) = args.database {
        config.database_path = Some(database);
    }

    logger::init_logging(&LoggingOptions {
        level: args.log_level.unwrap_or_else(|| config.log_level.clone()),
        ..LoggingOptions::default()
    });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(execute(args.command, config))
}
