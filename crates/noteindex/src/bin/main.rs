//! noteindex CLI

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use noteindex::{EngineConfig, NoteEngine};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Note index engine: manage a directory of linked markdown notes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Root directory holding the notes
    #[arg(short, long, env = "NOTEINDEX_ROOT")]
    root: Option<String>,

    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long, env = "NOTEINDEX_CONFIG")]
    config: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Human)]
    log_format: LogFormat,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Human,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List notes, newest first
    List,
    /// Show a note with its metadata and links
    Get { path: String },
    /// Create or replace a note (content from --content, --file or stdin)
    Put {
        path: String,
        #[arg(long, conflicts_with = "file")]
        content: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Delete a note
    Rm { path: String },
    /// Move a note
    Mv { from: String, to: String },
    /// List folders
    Folders,
    /// Create a folder
    Mkdir { path: String },
    /// Move a folder with everything in it
    Mvdir { from: String, to: String },
    /// Rename the last segment of a folder
    Renamedir { from: String, name: String },
    /// Delete a folder recursively
    Rmdir { path: String },
    /// Full-text search
    Search {
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Dump the link graph
    Graph {
        /// Print counts only
        #[arg(long)]
        stats: bool,
    },
    /// Notes linking to a note
    Backlinks { path: String },
    /// Links going out of a note
    Links { path: String },
    /// Notes with no links in or out
    Orphans,
    /// List plugins and their state
    Plugins,
    /// Enable or disable a plugin
    Toggle {
        name: String,
        #[arg(action = ArgAction::Set, value_parser = clap::builder::BoolishValueParser::new())]
        enabled: bool,
    },
    /// Rebuild every index from disk
    Rebuild,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_format, &args.log_level)?;

    let config = load_config(&args)?;
    log::info!("noteindex v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Root: {}", config.root.display());

    let engine = NoteEngine::open(config)
        .await
        .context("Failed to open note engine")?;
    let result = run(&engine, args.command).await;
    engine.close();
    result
}

async fn run(engine: &NoteEngine, command: Command) -> anyhow::Result<()> {
    match command {
        Command::List => print_json(&engine.list_notes().await?),
        Command::Get { path } => print_json(&engine.get_note(&path).await?),
        Command::Put {
            path,
            content,
            file,
        } => {
            let content = match (content, file) {
                (Some(content), _) => content,
                (None, Some(file)) => tokio::fs::read_to_string(&file)
                    .await
                    .with_context(|| format!("Failed to read {}", file.display()))?,
                (None, None) => std::io::read_to_string(std::io::stdin())
                    .context("Failed to read content from stdin")?,
            };
            print_json(&engine.create_or_update_note(&path, &content).await?)
        }
        Command::Rm { path } => {
            engine.delete_note(&path).await?;
            print_json(&serde_json::json!({ "deleted": path }))
        }
        Command::Mv { from, to } => {
            let to = engine.move_note(&from, &to).await?;
            print_json(&serde_json::json!({ "from": from, "to": to }))
        }
        Command::Folders => print_json(&engine.list_folders()?),
        Command::Mkdir { path } => print_json(&engine.create_folder(&path).await?),
        Command::Mvdir { from, to } => print_json(&engine.move_folder(&from, &to).await?),
        Command::Renamedir { from, name } => {
            print_json(&engine.rename_folder(&from, &name).await?)
        }
        Command::Rmdir { path } => print_json(&engine.delete_folder(&path).await?),
        Command::Search { query } => print_json(&engine.search(&query.join(" "))?),
        Command::Graph { stats: true } => print_json(&engine.graph_stats()),
        Command::Graph { stats: false } => print_json(&engine.get_graph()),
        Command::Backlinks { path } => print_json(&engine.backlinks(&path)?),
        Command::Links { path } => print_json(&engine.outgoing_links(&path)?),
        Command::Orphans => print_json(&engine.orphans()),
        Command::Plugins => print_json(&engine.list_plugins()),
        Command::Toggle { name, enabled } => {
            print_json(&engine.toggle_plugin(&name, enabled).await?)
        }
        Command::Rebuild => print_json(&engine.rebuild().await?),
    }
}

/// File (optional) < `NOTEINDEX_*` environment < command-line flags
fn load_config(args: &Args) -> anyhow::Result<EngineConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = &args.config {
        builder = builder.add_source(config::File::with_name(&shellexpand::tilde(path)));
    }
    let mut engine_config: EngineConfig = builder
        .add_source(
            config::Environment::with_prefix("NOTEINDEX")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to load configuration")?
        .try_deserialize()
        .context("Invalid configuration")?;

    if let Some(root) = &args.root {
        engine_config.root = PathBuf::from(root);
    }
    engine_config.root = expand(&engine_config.root);
    engine_config.plugin_state_file = engine_config.plugin_state_file.as_deref().map(expand);
    engine_config.validate()?;
    Ok(engine_config)
}

fn expand(path: &std::path::Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}

fn init_logging(format: LogFormat, level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Human => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
