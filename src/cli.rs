use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::ProviderKind;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate a subtitle file, keeping numbering and timing
    Translate {
        /// Input subtitle file
        #[arg(short, long)]
        input: PathBuf,

        /// Output subtitle file (".srt" is appended when missing)
        #[arg(short, long)]
        output: PathBuf,

        /// Target language code, overrides the config file
        #[arg(short, long)]
        target_lang: Option<String>,

        /// Source language code, overrides the config file
        #[arg(short, long)]
        source_lang: Option<String>,

        /// Translation provider, overrides the config file
        #[arg(long, value_enum)]
        provider: Option<ProviderArg>,

        /// API key, instead of ANTHROPIC_API_KEY
        #[arg(long)]
        api_key: Option<String>,

        /// Log each block instead of drawing a progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Send a test request to verify the provider and credentials
    Check {
        /// Translation provider, overrides the config file
        #[arg(long, value_enum)]
        provider: Option<ProviderArg>,

        /// API key, instead of ANTHROPIC_API_KEY
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Destination path
        #[arg(short, long, default_value = "subtrans.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProviderArg {
    Anthropic,
    Ollama,
}

impl From<ProviderArg> for ProviderKind {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Anthropic => ProviderKind::Anthropic,
            ProviderArg::Ollama => ProviderKind::Ollama,
        }
    }
}
