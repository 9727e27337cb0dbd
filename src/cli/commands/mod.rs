//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod file;
mod helpers;
mod init;
mod parse;
mod project;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use tablemark::app::App;
use tablemark::config::{load_settings_with_options, LoadOptions, Settings};

#[derive(Parser)]
#[command(name = "tablemark")]
#[command(about = "PDF table extraction for annotation workflows")]
#[command(version)]
pub struct Cli {
    /// Data directory (overrides config file)
    #[arg(long, short = 'd', global = true)]
    data: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Organization to act as
    #[arg(long, global = true, env = "TABLEMARK_ORG", default_value_t = 1)]
    org: i32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Manage projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Manage uploaded files
    File {
        #[command(subcommand)]
        command: FileCommands,
    },

    /// Extract tables from a PDF and wait for the result
    Parse {
        /// File ID
        file_id: i32,
    },

    /// Show the parse status of a file
    Status {
        /// File ID
        file_id: i32,

        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Show the tables extracted from a file
    Tables {
        /// File ID
        file_id: i32,

        /// Only show this table
        #[arg(long, short = 't')]
        table: Option<i32>,

        /// Print JSON instead of text grids
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Create a project
    Create {
        /// Project name
        name: String,
    },
    /// List projects
    List,
}

#[derive(Subcommand)]
enum FileCommands {
    /// Upload a file into a project
    Upload {
        /// Project ID
        project_id: i32,
        /// Path of the file to upload
        path: PathBuf,
        /// MIME type (detected from content when omitted)
        #[arg(long)]
        mime: Option<String>,
        /// Display name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Upload a new version of a file
    Replace {
        /// File ID
        file_id: i32,
        /// Path of the new content
        path: PathBuf,
        /// MIME type (detected from content when omitted)
        #[arg(long)]
        mime: Option<String>,
    },
    /// List files
    List {
        /// Only files in this project
        #[arg(long, short = 'p')]
        project: Option<i32>,
    },
    /// List versions of a file
    Versions {
        /// File ID
        file_id: i32,
    },
    /// Delete a file (kept on disk, hidden everywhere)
    Delete {
        /// File ID
        file_id: i32,
    },
}

/// Check if verbose mode is requested (before full parsing).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Prepare directories and start services.
async fn start_app(settings: &Settings) -> anyhow::Result<App> {
    settings.ensure_directories()?;
    Ok(App::start(settings).await?)
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        use_cwd: cli.cwd,
        data: cli.data,
    };
    let (settings, _config) = load_settings_with_options(options).await;
    let org = cli.org;

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Project { command } => match command {
            ProjectCommands::Create { name } => {
                project::cmd_project_create(&settings, org, &name).await
            }
            ProjectCommands::List => project::cmd_project_list(&settings, org).await,
        },
        Commands::File { command } => match command {
            FileCommands::Upload {
                project_id,
                path,
                mime,
                name,
            } => {
                file::cmd_file_upload(
                    &settings,
                    org,
                    project_id,
                    &path,
                    mime.as_deref(),
                    name.as_deref(),
                )
                .await
            }
            FileCommands::Replace {
                file_id,
                path,
                mime,
            } => file::cmd_file_replace(&settings, org, file_id, &path, mime.as_deref()).await,
            FileCommands::List { project } => file::cmd_file_list(&settings, org, project).await,
            FileCommands::Versions { file_id } => {
                file::cmd_file_versions(&settings, org, file_id).await
            }
            FileCommands::Delete { file_id } => {
                file::cmd_file_delete(&settings, org, file_id).await
            }
        },
        Commands::Parse { file_id } => parse::cmd_parse(&settings, org, file_id).await,
        Commands::Status { file_id, json } => {
            parse::cmd_status(&settings, org, file_id, json).await
        }
        Commands::Tables {
            file_id,
            table,
            json,
        } => parse::cmd_tables(&settings, org, file_id, table, json).await,
    }
}
