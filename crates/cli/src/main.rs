mod columns_cmd;
mod config_cmd;
mod context;
mod lookup_cmd;
mod session_cmd;
mod upload_cmd;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::lookup_cmd::EntityKind;

#[derive(Parser)]
#[command(name = "eduadmin", about = "eduadmin console CLI - sessions, lookups, table settings and uploads")]
struct Cli {
    /// Use this config file instead of ~/.config/eduadmin/eduadmin.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or set configuration
    Config {
        /// Set the console origin, e.g. https://admin.example.edu
        #[arg(long)]
        origin: Option<String>,

        /// Set the API path prefix
        #[arg(long)]
        api_prefix: Option<String>,

        /// Set the request timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Set the directory for persisted stores
        #[arg(long)]
        data_dir: Option<String>,
    },

    #[command(flatten)]
    Console(ConsoleCommand),
}

/// Commands that run against the persisted stores.
#[derive(Subcommand)]
enum ConsoleCommand {
    /// Store a session token
    Login {
        #[arg(long)]
        token: String,

        /// Display name to keep with the token; fetched from the profile when omitted
        #[arg(long)]
        name: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami {
        /// Re-read the profile from the server
        #[arg(long)]
        refresh: bool,
    },

    /// Search one kind of entity
    Search {
        kind: EntityKind,

        keyword: Option<String>,

        /// Course to scope question banks to
        #[arg(long)]
        course: Option<String>,
    },

    /// Resolve an identifier to its entity
    Resolve {
        kind: EntityKind,

        id: String,

        /// Course the question bank belongs to
        #[arg(long)]
        course: Option<String>,
    },

    /// Type search terms line by line; searches run after the debounce window
    Browse {
        kind: EntityKind,

        #[arg(long)]
        course: Option<String>,
    },

    /// Manage persisted column visibility
    Columns {
        #[command(subcommand)]
        action: ColumnsAction,
    },

    /// Upload a file to object storage
    Upload {
        file: PathBuf,

        /// Allowed extensions, e.g. --accept .jpg,.png
        #[arg(long, value_delimiter = ',')]
        accept: Vec<String>,

        #[arg(long, default_value_t = eduadmin_api_client::DEFAULT_MAX_SIZE_MB)]
        max_size_mb: u64,
    },
}

#[derive(Subcommand)]
enum ColumnsAction {
    /// Show the visibility overrides of a table
    Show { table: String },
    /// Show or hide one column
    Toggle {
        table: String,
        column: String,
        visible: columns_cmd::Switch,
    },
    /// Drop all overrides of a table
    Reset { table: String },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = config_cmd::resolve_path(cli.config)?;

    match cli.command {
        Commands::Config {
            origin,
            api_prefix,
            timeout_secs,
            data_dir,
        } => {
            let update = config_cmd::ConfigUpdate {
                origin,
                api_prefix,
                timeout_secs,
                data_dir,
            };
            if update.is_empty() {
                config_cmd::show_config(&config_path)
            } else {
                config_cmd::set_config(&config_path, update)
            }
        }
        Commands::Console(command) => {
            let ctx = context::AppContext::open(&config_path).await?;
            let result = run_console(&ctx, command).await;
            // Persist whatever the command changed, even when it failed.
            ctx.close().await?;
            result
        }
    }
}

async fn run_console(ctx: &context::AppContext, command: ConsoleCommand) -> anyhow::Result<()> {
    match command {
        ConsoleCommand::Login { token, name } => session_cmd::login(ctx, &token, name).await,
        ConsoleCommand::Logout => session_cmd::logout(ctx),
        ConsoleCommand::Whoami { refresh } => session_cmd::whoami(ctx, refresh).await,
        ConsoleCommand::Search {
            kind,
            keyword,
            course,
        } => lookup_cmd::search(ctx, kind, keyword.as_deref().unwrap_or_default(), course.as_deref()).await,
        ConsoleCommand::Resolve { kind, id, course } => {
            lookup_cmd::resolve(ctx, kind, &id, course.as_deref()).await
        }
        ConsoleCommand::Browse { kind, course } => lookup_cmd::browse(ctx, kind, course.as_deref()).await,
        ConsoleCommand::Columns { action } => match action {
            ColumnsAction::Show { table } => columns_cmd::show(ctx, &table),
            ColumnsAction::Toggle {
                table,
                column,
                visible,
            } => columns_cmd::toggle(ctx, &table, &column, visible.is_on()),
            ColumnsAction::Reset { table } => columns_cmd::reset(ctx, &table),
        },
        ConsoleCommand::Upload {
            file,
            accept,
            max_size_mb,
        } => upload_cmd::run_upload(ctx, &file, accept, max_size_mb).await,
    }
}
