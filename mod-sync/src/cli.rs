use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "twmt-mod-sync")]
#[command(about = "Detect Workshop mod updates and reconcile translation projects", long_about = None)]
pub struct Cli {
    /// Config file (defaults to sync_config.json in the app data folder)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database, overrides the configured path
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `twmt_mod_sync_lib=trace`
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan the Workshop folder of a game and update imported projects
    Scan {
        /// Game code, e.g. wh3
        game: String,
    },
    /// Mark the pending changes of a project as handled
    Dismiss { project_id: String },
    /// Re-extract a project's pack and apply every difference
    Reanalyze { project_id: String },
}
