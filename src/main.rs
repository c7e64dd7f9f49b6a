//! consult - command-line front end of the consultation pipeline.
//!
//! Runs the HTTP server, or drives the same pipeline directly against the
//! persistent conversation store:
//!   consult serve                         # HTTP API on 127.0.0.1:3001
//!   consult ingest brief.docx -c <id>     # Upload a document into a conversation
//!   consult estimate <id>                 # Export preview
//!   consult export <id> -f pdf            # Render eva-consultation-<id>.pdf
//!   consult list                          # Stored conversations

mod cli;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use consultation_pipeline::application::{
    format_metadata, format_summaries_json, format_summaries_table, format_upload,
    format_validation, human_bytes, import_json, ExportParams, OutputFormat, Pipeline,
};
use consultation_pipeline::domain::{AppConfig, UploadedFile};
use consultation_pipeline::http::{self, AppState};
use consultation_pipeline::infrastructure::{
    config_file_path, ensure_config_at, load_config_at, open_store,
};

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {e:#}", "Error:".red().bold());
        std::process::exit(1);
    }
}

/// Main application logic.
fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(config_file_path);
    let config = load_config_at(&config_path)?;

    match cli.command {
        Commands::Serve { port, host } => cmd_serve(config, port, host)?,
        Commands::Validate { file } => cmd_validate(&config, &file)?,
        Commands::Ingest { file, conversation } => cmd_ingest(&config, &file, conversation)?,
        Commands::Export {
            conversation_id,
            format,
            output,
            no_analysis,
            no_code,
            title,
        } => {
            let params = ExportParams {
                conversation_id: Some(conversation_id),
                format: Some(format),
                include_analysis: Some(!no_analysis),
                include_code: Some(!no_code),
                title,
            };
            cmd_export(&config, params, output)?;
        }
        Commands::Estimate { conversation_id } => cmd_estimate(&config, &conversation_id)?,
        Commands::List { format, limit } => cmd_list(&config, &format, limit)?,
        Commands::Import { file } => cmd_import(&config, &file)?,
        Commands::Config { init } => cmd_config(&config, &config_path, init)?,
    }

    Ok(())
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

fn pipeline(config: &AppConfig) -> anyhow::Result<Pipeline> {
    let store = open_store(config)?;
    Ok(Pipeline::new(store, config))
}

/// Read a local file as an upload. MIME type is left blank; the extension decides.
fn read_upload(path: &Path) -> anyhow::Result<UploadedFile> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().to_string());
    Ok(UploadedFile::new(name, "", bytes))
}

/// Run the HTTP server.
fn cmd_serve(mut config: AppConfig, port: Option<u16>, host: Option<String>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(host) = host {
        config.server.host = host;
    }

    let addr = config.bind_address();
    let state = AppState::new(pipeline(&config)?, config.upload.max_size_bytes);

    println!(
        "{} Serving on {} ({} store)",
        "🚀".bold(),
        format!("http://{addr}").cyan(),
        format!("{:?}", config.storage.backend).to_lowercase()
    );

    runtime()?.block_on(http::serve(state, &addr))?;
    Ok(())
}

/// Validate a file without processing it.
fn cmd_validate(config: &AppConfig, path: &Path) -> anyhow::Result<()> {
    let file = read_upload(path)?;
    let kind = pipeline(config)?.validate(&file)?;
    println!(
        "{}",
        format_validation(&file.original_name, kind, file.size_bytes)
    );
    Ok(())
}

/// Run the full upload pipeline.
fn cmd_ingest(config: &AppConfig, path: &Path, conversation: Option<String>) -> anyhow::Result<()> {
    let file = read_upload(path)?;
    let pipeline = pipeline(config)?;
    let outcome = runtime()?.block_on(pipeline.upload(file, conversation))?;
    print!("{}", format_upload(&outcome));
    Ok(())
}

/// Render an export to disk.
fn cmd_export(
    config: &AppConfig,
    params: ExportParams,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let pipeline = pipeline(config)?;
    let request = params.into_request(pipeline.default_title())?;
    let artifact = runtime()?.block_on(pipeline.export(request))?;

    let path = output.unwrap_or_else(|| PathBuf::from(&artifact.filename));
    fs::write(&path, &artifact.bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!(
        "{} Exported to {} ({})",
        "✓".green(),
        path.display().to_string().cyan(),
        human_bytes(artifact.bytes.len() as u64)
    );
    Ok(())
}

/// Print export metadata.
fn cmd_estimate(config: &AppConfig, conversation_id: &str) -> anyhow::Result<()> {
    let pipeline = pipeline(config)?;
    let meta = runtime()?.block_on(pipeline.metadata(conversation_id))?;
    print!("{}", format_metadata(conversation_id, &meta));
    Ok(())
}

/// List stored conversations.
fn cmd_list(config: &AppConfig, format: &str, limit: usize) -> anyhow::Result<()> {
    let format: OutputFormat = format.parse().map_err(anyhow::Error::msg)?;
    let mut summaries = open_store(config)?.list()?;
    summaries.truncate(limit);

    if summaries.is_empty() {
        println!("No conversations stored yet.");
        return Ok(());
    }

    match format {
        OutputFormat::Table => println!("{}", format_summaries_table(&summaries)),
        OutputFormat::Json => println!("{}", format_summaries_json(&summaries)?),
    }
    Ok(())
}

/// Load a JSON export into the store.
fn cmd_import(config: &AppConfig, path: &Path) -> anyhow::Result<()> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let (title, conversation) = import_json(&bytes)?;
    let id = conversation.id.clone();
    let count = conversation.messages.len();

    open_store(config)?.import(conversation)?;

    println!(
        "{} Imported \"{}\" as {} ({} messages)",
        "✓".green(),
        title,
        id.cyan(),
        count
    );
    Ok(())
}

/// Show configuration.
fn cmd_config(config: &AppConfig, path: &Path, init: bool) -> anyhow::Result<()> {
    if init {
        ensure_config_at(path)?;
    }

    let status = if path.exists() {
        "".normal()
    } else {
        " (not created, using defaults)".yellow()
    };
    println!("{} {}{}", "Config file:".bold(), path.display(), status);
    println!("{} {}", "Data dir:".bold(), config.data_dir().display());
    println!();
    println!(
        "{}",
        toml::to_string_pretty(config).context("Failed to serialize configuration")?
    );
    Ok(())
}

/// Setup logging with tracing-subscriber.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
