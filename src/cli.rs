use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "spicy-bridge")]
#[command(version = "0.1.0")]
#[command(about = "Loads precompiled Spicy parser modules and registers their analyzers", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true, help = "JSON configuration file; environment variables still apply on top")]
    pub config: Option<PathBuf>,

    #[arg(short = 'o', long, global = true, value_enum, default_value = "human", help = "Output format")]
    pub output_format: OutputFormat,

    #[arg(short = 'f', long, global = true, help = "Output file path")]
    pub output_file: Option<PathBuf>,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the module files that auto-discovery would load.
    Discover {
        #[arg(long, help = "Colon-separated directories to search instead of the defaults")]
        module_path: Option<String>,
    },

    /// Load modules against an in-memory host and print the resulting registry.
    Inspect {
        #[arg(help = "Module files to load in addition to discovered ones")]
        modules: Vec<PathBuf>,

        #[arg(long, help = "Skip auto-discovery and load only the given modules")]
        no_discover: bool,

        #[arg(long, help = "Version reported by the in-memory host (default: the configured compiled version)")]
        host_version: Option<u32>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, serde::Serialize, serde::Deserialize, PartialEq)]
pub enum OutputFormat {
    #[value(name = "human", help = "Human-readable colored output")]
    Human,
    #[value(name = "json", help = "JSON output")]
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Human => write!(f, "human"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
