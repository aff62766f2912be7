//! subtrans - batch subtitle translation
//!
//! Entry point: resolves the configuration, credentials and file paths the
//! translation core relies on, then runs the workflow.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use subtrans::cli::{Args, Commands, ProviderArg};
use subtrans::config::{Config, ProviderConfig, ProviderKind};
use subtrans::error::SubtransError;
use subtrans::progress::ConsoleWriter;
use subtrans::translate::ClientFactory;
use subtrans::workflow::Workflow;

const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
const DEFAULT_CONFIG_FILE: &str = "subtrans.toml";
const MAX_FILENAME_LEN: usize = 255;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Keep the file writer guard alive until exit so buffered logs are flushed
    let console = ConsoleWriter::new();
    let _log_guard = setup_logging(args.verbose, console.clone())?;

    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Translate {
            input,
            output,
            target_lang,
            source_lang,
            provider,
            api_key,
            no_progress,
        } => {
            if !input.is_file() {
                return Err(SubtransError::FileNotFound(input.display().to_string()).into());
            }
            let output = normalize_output_path(&output)?;

            if let Some(lang) = target_lang {
                config.translate.target_language = lang;
            }
            if let Some(lang) = source_lang {
                config.translate.source_language = lang;
            }
            apply_provider_override(&mut config, provider);

            let key = resolve_api_key(api_key, &config.provider);
            let client = ClientFactory::create(&config.provider, key.as_deref())?;

            let interrupt = CancellationToken::new();
            spawn_interrupt_listener(interrupt.clone());

            let workflow = Workflow::new(config)?
                .with_progress_bar(!no_progress)
                .with_console(console)
                .with_interrupt(interrupt);
            let report = workflow.translate_file(client.as_ref(), &input, &output).await?;

            println!("\nTranslation summary for {}:", input.display());
            println!("  Translated: {}", report.summary.translated);
            println!("  Fallback:   {}", report.summary.fallback);
            println!("  Skipped:    {}", report.summary.skipped);
            println!("Output saved to {}", output.display());

            for outcome in report.outcomes.iter().filter(|o| o.error.is_some()) {
                warn!(
                    "Block {} ({}): {}",
                    outcome.position + 1,
                    outcome.index.as_deref().unwrap_or("-"),
                    outcome.error.as_deref().unwrap_or_default()
                );
            }
        }
        Commands::Check { provider, api_key } => {
            apply_provider_override(&mut config, provider);
            let key = resolve_api_key(api_key, &config.provider);
            let client = ClientFactory::create(&config.provider, key.as_deref())?;

            let workflow = Workflow::new(config)?;
            workflow.check_connection(client.as_ref()).await?;
            println!("Connection to {} succeeded", client.describe());
        }
        Commands::InitConfig { path, force } => {
            if path.exists() && !force {
                return Err(SubtransError::Config(format!(
                    "{} already exists; pass --force to overwrite",
                    path.display()
                ))
                .into());
            }
            Config::default().save_to_file(&path)?;
            println!("Default configuration written to {}", path.display());
        }
    }

    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool, console: ConsoleWriter) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = std::env::current_dir()?.join(".subtrans").join("log");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, "subtrans.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(console)
        .with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("subtrans.log").display());

    Ok(guard)
}

fn apply_provider_override(config: &mut Config, provider: Option<ProviderArg>) {
    if let Some(arg) = provider {
        let kind: ProviderKind = arg.into();
        if config.provider.kind != kind {
            config.provider = ProviderConfig::for_kind(kind);
        }
    }
}

/// Command-line flag first, then the environment, then the config file.
fn resolve_api_key(flag: Option<String>, provider: &ProviderConfig) -> Option<String> {
    flag.or_else(|| std::env::var(API_KEY_ENV).ok())
        .or_else(|| provider.api_key.clone())
        .filter(|key| !key.trim().is_empty())
}

/// Append ".srt" when the output has no such extension and reject overlong names.
fn normalize_output_path(output: &Path) -> Result<PathBuf, SubtransError> {
    let file_name = output
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| SubtransError::Config(format!("Invalid output filename: {}", output.display())))?;

    let file_name = if file_name.to_lowercase().ends_with(".srt") {
        file_name.to_string()
    } else {
        format!("{}.srt", file_name)
    };

    if file_name.len() > MAX_FILENAME_LEN {
        return Err(SubtransError::Config(format!(
            "Output filename is too long ({} > {} characters)",
            file_name.len(),
            MAX_FILENAME_LEN
        )));
    }

    Ok(output.with_file_name(file_name))
}

/// First Ctrl-C cancels the run without writing output; a second one exits at once.
fn spawn_interrupt_listener(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received; stopping without writing output (Ctrl-C again to quit)");
        token.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}
