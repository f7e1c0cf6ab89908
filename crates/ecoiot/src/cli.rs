//! Clap derive structures for the `ecoiot` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// ecoiot -- poll and switch Ecowitt IoT devices behind a local gateway
#[derive(Debug, Parser)]
#[command(
    name = "ecoiot",
    version,
    about = "Poll and switch Ecowitt IoT devices from the command line",
    long_about = "Talks to an Ecowitt gateway over its local quick-command endpoint.\n\n\
        Reads the state of AC1100 smart plugs and WFC01 water timers and\n\
        switches them on or off.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "ECOIOT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Gateway address (overrides the config file)
    #[arg(long, short = 'H', global = true)]
    pub host: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "ECOIOT_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List configured devices (no network access)
    #[command(alias = "ls")]
    Devices,

    /// Poll the gateway once and show device state
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Switch a device on (always-on mode)
    On(SwitchArgs),

    /// Switch a device off
    Off(SwitchArgs),

    /// Poll on the configured interval and print every snapshot
    Watch,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Only show this device
    pub id: Option<String>,
}

#[derive(Debug, Args)]
pub struct SwitchArgs {
    /// Device id
    pub id: String,

    /// Return as soon as the device acknowledges, without re-reading its state
    #[arg(long)]
    pub no_wait: bool,
}
