pub mod import;
pub mod init;
pub mod migrate;
pub mod serve;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mediahub")]
#[command(version)]
#[command(about = "Share images, GIFs, soundbites and text snippets with live updates", long_about = None)]
pub struct Cli {
    #[arg(short, long, default_value = "mediahub.toml", env = "MEDIAHUB_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a config file and data directories
    Init {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Run the HTTP and realtime server
    Serve {
        #[arg(short = 'H', long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Apply pending database migrations
    Migrate {
        #[command(subcommand)]
        command: Option<MigrateCommand>,
    },
    /// Import a media-data.json file from the earlier JSON-file backend
    Import {
        file: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum MigrateCommand {
    /// Show applied and pending migrations
    Status,
}
