//! voxmesh-relay: signaling relay for full-mesh voice rooms.
//!
//! Accepts WebSocket connections, registers each client in its room on
//! `join`, and routes signaling envelopes between members. Audio never
//! passes through the relay; it only sees offers, answers, candidates, and
//! membership changes.

mod connection;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use voxmesh_voice::hub::RoomHub;

use crate::connection::serve;

#[derive(Parser)]
#[command(name = "voxmesh-relay", version, about = "Signaling relay for voxmesh voice rooms")]
struct Args {
    /// Port to listen on. Overrides `relay.port` from the config file.
    #[arg(short, long)]
    port: Option<u16>,

    /// Seconds without a heartbeat before a member is dropped (5-3600).
    #[arg(long, value_parser = clap::value_parser!(u64).range(5..=3600))]
    member_ttl: Option<u64>,

    /// Config file path override.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match voxmesh_config::load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("voxmesh-relay: {e}");
            std::process::exit(2);
        }
    };

    let level = &config.logging.level;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("voxmesh_relay={level},voxmesh_voice={level}").into()),
        )
        .init();

    let port = args.port.unwrap_or(config.relay.port);
    let ttl = Duration::from_secs(args.member_ttl.unwrap_or(config.relay.member_ttl_secs));
    let reap_every = Duration::from_secs(config.relay.reap_interval_secs);

    let addr = format!("0.0.0.0:{port}");
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Failed to bind TCP listener");
            std::process::exit(1);
        }
    };
    tracing::info!("voxmesh-relay listening on {}", addr);

    let hub = RoomHub::new();

    // Members whose heartbeats stopped are dropped and announced as left.
    let reaper_hub = hub.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(reap_every).await;
            for (room, peer) in reaper_hub.reap_stale(ttl).await {
                tracing::info!(room = %room, peer = %peer, "Reaped silent member");
            }
            let rooms = reaper_hub.room_count().await;
            let members = reaper_hub.member_count().await;
            tracing::debug!(
                rooms = rooms,
                members = members,
                "Reaper tick"
            );
        }
    });

    serve(listener, hub).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_ttl_within_bounds_is_accepted() {
        let args = Args::try_parse_from(["voxmesh-relay", "--member-ttl", "30"]).unwrap();
        assert_eq!(args.member_ttl, Some(30));
        let args = Args::try_parse_from(["voxmesh-relay", "--member-ttl", "5"]).unwrap();
        assert_eq!(args.member_ttl, Some(5));
    }

    #[test]
    fn member_ttl_out_of_bounds_is_rejected() {
        assert!(Args::try_parse_from(["voxmesh-relay", "--member-ttl", "0"]).is_err());
        assert!(Args::try_parse_from(["voxmesh-relay", "--member-ttl", "3601"]).is_err());
    }

    #[test]
    fn ttl_defaults_to_config() {
        let args = Args::try_parse_from(["voxmesh-relay"]).unwrap();
        assert_eq!(args.member_ttl, None);
    }
}
