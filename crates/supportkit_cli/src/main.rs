use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use supportkit_core::config::DEFAULT_CONFIG_FILE;
use supportkit_core::report::{CHECK_EVENT_LOG, CHECK_SYSTEM_LOG, CHECK_USER_LOG};
use supportkit_core::{
    default_run_id, render_markdown, run_diagnostics, write_markdown, write_reports,
    DiagnosticOptions, SupportConfig, SupportReport,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "supportkit",
    version,
    about = "Generate remote IT support reports from local logs"
)]
struct Cli {
    /// TOML configuration file. Defaults to ./supportkit.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the logs and write JSON and Markdown reports (the default).
    Run(RunArgs),
    /// Render Markdown from an existing JSON report.
    Render(RenderArgs),
    /// Copy the input logs into a bundle directory for hand-off.
    Collect(CollectArgs),
}

#[derive(Args, Default)]
struct RunArgs {
    #[arg(long)]
    id: Option<String>,
    /// Directory that relative source paths are resolved against.
    #[arg(long)]
    base_dir: Option<PathBuf>,
    #[arg(long)]
    json_out: Option<PathBuf>,
    #[arg(long)]
    markdown_out: Option<PathBuf>,
}

#[derive(Args)]
struct RenderArgs {
    #[arg(long)]
    input: PathBuf,
    /// Write to this file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct CollectArgs {
    #[arg(long, default_value = "support_bundle")]
    out_dir: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => {
            let config = load_config(cli.config.as_deref())?;
            init_tracing(&config);
            handle_run(&config, args)
        }
        // `render` never reads the config.
        Commands::Render(args) => {
            init_tracing(&SupportConfig::default());
            handle_render(args)
        }
        Commands::Collect(args) => {
            let config = load_config(cli.config.as_deref())?;
            init_tracing(&config);
            handle_collect(&config, args)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<SupportConfig> {
    let config = match path {
        Some(path) => SupportConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => {
            let cwd = std::env::current_dir()?;
            SupportConfig::discover(&cwd)
                .with_context(|| format!("failed to load {DEFAULT_CONFIG_FILE}"))?
        }
    };
    config.validate()?;
    Ok(config)
}

/// Logs go to stderr; `RUST_LOG` wins over the config's `trace_filter`.
fn init_tracing(config: &SupportConfig) {
    let configured = config
        .telemetry
        .as_ref()
        .and_then(|t| t.trace_filter.clone())
        .unwrap_or_else(|| "warn".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

fn handle_run(config: &SupportConfig, args: RunArgs) -> Result<()> {
    let now = Utc::now();
    let run_id = args.id.unwrap_or_else(|| default_run_id(now));
    let base_dir = match args.base_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let options = DiagnosticOptions::new(base_dir, run_id).with_timestamp(now);

    let report = run_diagnostics(config, &options)?;
    let json_path = args.json_out.unwrap_or_else(|| config.report.json_path.clone());
    let markdown_path = args
        .markdown_out
        .unwrap_or_else(|| config.report.markdown_path.clone());
    let written = write_reports(&report, &json_path, &markdown_path)?;

    println!("{}", report.summary.text);
    println!("JSON report written to {}", written.json.display());
    println!("Markdown report written to {}", written.markdown.display());
    Ok(())
}

fn handle_render(args: RenderArgs) -> Result<()> {
    let data = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let report: SupportReport = serde_json::from_str(&data)
        .with_context(|| format!("{} is not a support report", args.input.display()))?;
    match args.output {
        Some(path) => {
            let written = write_markdown(&report, &path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Markdown report written to {}", written.display());
        }
        None => print!("{}", render_markdown(&report)),
    }
    Ok(())
}

fn handle_collect(config: &SupportConfig, args: CollectArgs) -> Result<()> {
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create {}", args.out_dir.display()))?;

    // Inputs are stored as `<role>/<file name>`.
    let sources = &config.sources;
    let mut collected = Vec::new();
    let mut missing = Vec::new();
    for (role, src) in [
        (CHECK_USER_LOG, &sources.user_log),
        (CHECK_SYSTEM_LOG, &sources.system_log),
        (CHECK_EVENT_LOG, &sources.event_log),
    ] {
        if !src.is_file() {
            tracing::warn!(role, path = %src.display(), "input not found, skipping");
            missing.push(src.clone());
            continue;
        }
        let file_name = src
            .file_name()
            .with_context(|| format!("{} has no file name", src.display()))?;
        let bundled = Path::new(role).join(file_name);
        copy_into(src, &args.out_dir.join(&bundled))?;
        collected.push(serde_json::json!({
            "role": role,
            "source": src,
            "bundled": bundled,
        }));
    }

    let metadata = serde_json::json!({
        "timestamp": Utc::now().to_rfc3339(),
        "collected": collected,
        "missing": missing,
    });
    let metadata_path = args.out_dir.join("metadata.json");
    fs::write(&metadata_path, serde_json::to_string_pretty(&metadata)?)
        .with_context(|| format!("failed to write {}", metadata_path.display()))?;
    println!(
        "Collected {} of 3 inputs into {}",
        collected.len(),
        args.out_dir.display()
    );
    Ok(())
}

fn copy_into(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::copy(src, dst)
        .with_context(|| format!("failed to copy {} to {}", src.display(), dst.display()))?;
    Ok(())
}
