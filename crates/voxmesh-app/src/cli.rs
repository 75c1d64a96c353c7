use std::path::PathBuf;

use clap::Parser;

/// voxmesh: join a full-mesh voice room from the terminal.
#[derive(Parser, Debug)]
#[command(name = "voxmesh", version, about)]
pub struct Args {
    /// Room to join.
    pub room: String,

    /// Display name shown to other participants.
    #[arg(short, long, default_value = "anonymous")]
    pub name: String,

    /// Fixed peer id. A random one is generated when omitted.
    #[arg(long)]
    pub peer_id: Option<String>,

    /// Bearer token sent with the out-of-band leave notice.
    #[arg(long)]
    pub token: Option<String>,

    /// Signaling relay URL override (ws:// or wss://).
    #[arg(long)]
    pub relay: Option<String>,

    /// Skip the HTTP leave notice on exit.
    #[arg(long)]
    pub no_leave_notice: bool,

    /// Join muted.
    #[arg(long)]
    pub muted: bool,

    /// Config file path override.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level override (debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn parse() -> Args {
    Args::parse()
}
