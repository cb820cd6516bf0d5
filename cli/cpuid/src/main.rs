//! cpuid: decode CPUID register snapshots into vendor, topology, and flags.

mod commands;
mod config;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::CpuidConfig;

#[derive(Parser)]
#[command(name = "cpuid", version, about = "Decode CPUID register snapshots")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct the package/core/thread and cache topology
    Topology {
        /// Snapshot file (default: [input] default in cpuid.toml)
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Evaluate a feature-flag selector on every processor
    Flag {
        /// Selector such as "CPUID.01H:EDX.SSE2[bit 26]", or an alias from cpuid.toml
        spec: String,
        /// Snapshot file (default: [input] default in cpuid.toml)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Only evaluate the processor with this APIC id
        #[arg(long)]
        apic: Option<u32>,
    },
    /// Show vendor and model of every processor
    Vendor {
        /// Snapshot file (default: [input] default in cpuid.toml)
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// List the known leaves
    Leaves,
}

fn main() {
    let cli = Cli::parse();

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let (config, base_dir) = load_config_optional(&cwd)?;
    init_logging(&config.log.level);

    match cli.command {
        Commands::Topology { input } => {
            let input = resolve_input(input, &config, &base_dir)?;
            commands::topology::run(&input)
        }
        Commands::Flag { spec, input, apic } => {
            let input = resolve_input(input, &config, &base_dir)?;
            commands::flag::run(&config, &spec, &input, apic)
        }
        Commands::Vendor { input } => {
            let input = resolve_input(input, &config, &base_dir)?;
            commands::vendor::run(&input)
        }
        Commands::Leaves => commands::leaves::run(),
    }
}

/// Log to stderr so stdout stays machine-readable. `RUST_LOG` wins over the
/// configured level.
fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Load `cpuid.toml` from the current directory upward; defaults when absent.
fn load_config_optional(cwd: &Path) -> anyhow::Result<(CpuidConfig, PathBuf)> {
    match CpuidConfig::find_and_load(cwd)? {
        Some((config, dir)) => Ok((config, dir)),
        None => Ok((CpuidConfig::default(), cwd.to_path_buf())),
    }
}

fn resolve_input(
    input: Option<PathBuf>,
    config: &CpuidConfig,
    base_dir: &Path,
) -> anyhow::Result<PathBuf> {
    match input.or_else(|| config.default_input(base_dir)) {
        Some(path) => Ok(path),
        None => bail!("no snapshot given: pass --input or set [input] default in cpuid.toml"),
    }
}
