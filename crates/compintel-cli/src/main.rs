use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use compintel_core::{
    client_from_settings, render_report, AnalysisRequest, LlmSettings, OutputFormat, ProviderKind,
    ReportPipeline,
};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "compintel",
    author,
    version,
    about = "Competitive intelligence report generator"
)]
struct Cli {
    /// TOML config file with an [llm] table (environment variables override it)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the report pipeline for one company
    Analyze(AnalyzeArgs),
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Company to analyze
    #[arg(long)]
    company: String,

    /// How many competitors to request (3-10)
    #[arg(long, default_value_t = 5)]
    competitors: u8,

    /// Include the SWOT analysis stage
    #[arg(long)]
    swot: bool,

    /// Record the benchmarking option in the exported result
    #[arg(long)]
    benchmarking: bool,

    /// Record the market-forecast option in the exported result
    #[arg(long)]
    forecast: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "human")]
    format: FormatArg,

    /// Write the rendered report to a file instead of stdout
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Human,
    Markdown,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Human => Self::Human,
            FormatArg::Markdown => Self::Markdown,
            FormatArg::Json => Self::Json,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze(args) => analyze(cli.config.as_deref(), &args).await,
    }
}

async fn analyze(config_path: Option<&Path>, args: &AnalyzeArgs) -> Result<()> {
    let request = AnalysisRequest::new(
        args.company.as_str(),
        args.competitors,
        args.swot,
        args.benchmarking,
        args.forecast,
    )?;

    let settings = resolve_settings(config_path)?;
    let kind: ProviderKind = settings.provider.parse()?;
    let model = settings
        .model
        .clone()
        .unwrap_or_else(|| kind.default_model().to_string());
    let client = client_from_settings(&settings)?;

    tracing::info!(provider = %settings.provider, model = %model, "starting analysis");
    let started = Instant::now();
    let pipeline = ReportPipeline::new(Arc::from(client), model);
    let result = match pipeline.run(&request).await {
        Ok(result) => result,
        Err(err) => {
            eprintln!("{} {err}", "analysis aborted:".red().bold());
            std::process::exit(1);
        }
    };

    let rendered = render_report(&result, args.format.into())?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("failed to write report to {}", path.display()))?;
            println!("report written to {}", path.display());
        }
        None => println!("{rendered}"),
    }

    let elapsed = Duration::from_millis(u64::try_from(started.elapsed().as_millis()).unwrap_or(0));
    eprintln!(
        "{} completed in {}",
        "ok".green().bold(),
        humantime::format_duration(elapsed)
    );
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    llm: FileLlm,
}

#[derive(Debug, Default, Deserialize)]
struct FileLlm {
    provider: Option<String>,
    api_key: Option<String>,
    endpoint: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

/// Resolve completion settings, layering `COMPINTEL_*` environment
/// variables over values from the optional config file.
fn resolve_settings(config_path: Option<&Path>) -> Result<LlmSettings> {
    let mut vars: HashMap<String, String> = HashMap::new();

    if let Some(path) = config_path {
        let file: FileConfig = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .with_context(|| format!("failed to read config file {}", path.display()))?
            .try_deserialize()
            .context("invalid config file structure")?;
        let llm = file.llm;
        if let Some(value) = llm.provider {
            vars.insert(LlmSettings::PROVIDER_VAR.to_string(), value);
        }
        if let Some(value) = llm.api_key {
            vars.insert(LlmSettings::API_KEY_VAR.to_string(), value);
        }
        if let Some(value) = llm.endpoint {
            vars.insert(LlmSettings::ENDPOINT_VAR.to_string(), value);
        }
        if let Some(value) = llm.model {
            vars.insert(LlmSettings::MODEL_VAR.to_string(), value);
        }
        if let Some(value) = llm.timeout_secs {
            vars.insert(LlmSettings::TIMEOUT_VAR.to_string(), value.to_string());
        }
    }

    vars.extend(std::env::vars().filter(|(key, _)| key.starts_with("COMPINTEL_")));
    LlmSettings::from_vars(vars)
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tokio=warn"));
    // Diagnostics go to stderr; stdout carries only the rendered report.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
