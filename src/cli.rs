use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "xvr-grid",
    version,
    about = "Terminal 2x2 grid viewer for XVR camera channels"
)]
pub struct Cli {
    /// Channel config document to open on launch. Defaults to the one used
    /// last session.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Screen refresh interval in milliseconds.
    #[arg(long, default_value_t = 30)]
    pub tick_ms: u64,

    /// RTSP transport protocol to request.
    #[arg(long, value_enum, default_value_t = TransportMode::Tcp)]
    pub transport: TransportMode,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate a channel config document and print its stream endpoints.
    Check(CheckArgs),
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Config document to validate. Falls back to --config, then to the last
    /// session's document.
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum TransportMode {
    Tcp,
    Udp,
}
