mod capture;
mod cli;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;
use voxmesh_common::{ConfigError, PeerId, RoomId};
use voxmesh_config::VoxConfig;
use voxmesh_voice::{
    HttpLeaveNotifier, Identity, LeaveNotifier, NoopLeaveNotifier, PushSource, SessionDeps,
    SessionOptions, VoiceEvent, VoiceSession, WebRtcFactory, WsConnector,
};

/// How long to let the leave notice and teardown run after Ctrl-C.
const EXIT_GRACE: Duration = Duration::from_millis(500);

/// Runs before logging is set up, so a load failure is handed back for
/// the caller to report once the subscriber exists.
fn load_config(args: &cli::Args) -> (VoxConfig, Option<ConfigError>) {
    let (mut config, error) = match voxmesh_config::load_config(args.config.as_deref()) {
        Ok(config) => (config, None),
        Err(e) => (VoxConfig::default(), Some(e)),
    };
    if let Some(relay) = &args.relay {
        config.signaling.url = relay.clone();
    }
    (config, error)
}

/// `--log-level` wins over `[logging] level`.
fn log_level(args: &cli::Args, config: &VoxConfig) -> String {
    args.log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone())
}

fn identity(args: &cli::Args) -> Identity {
    let identity = match &args.peer_id {
        Some(id) => Identity::new(PeerId::new(id.as_str()), args.name.as_str()),
        None => Identity::generate(&args.name),
    };
    match &args.token {
        Some(token) => identity.with_access_token(token.as_str()),
        None => identity,
    }
}

fn print_event(event: &VoiceEvent) {
    match serde_json::to_string(event) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::warn!(error = %e, "Failed to encode event"),
    }
}

#[tokio::main]
async fn main() {
    let args = cli::parse();

    let (config, config_error) = load_config(&args);

    let log_directive = log_level(&args, &config);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("voxmesh={log_directive},voxmesh_voice={log_directive}").into()
        }))
        .init();

    tracing::info!("voxmesh v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Some(e) = config_error {
        tracing::warn!("Config load failed, using defaults: {e}");
    }
    tracing::info!(relay = %config.signaling.url, "Config loaded");

    let connections = match WebRtcFactory::new(&config.ice) {
        Ok(factory) => Arc::new(factory),
        Err(e) => {
            tracing::error!(error = %e, "Failed to set up WebRTC");
            std::process::exit(1);
        }
    };
    let mut remote_audio = connections.subscribe_remote();

    let media = Arc::new(PushSource::new(vec![config.media.input_device.clone()]));
    let pump = capture::spawn_silence_pump(media.clone());

    let leave_notifier: Arc<dyn LeaveNotifier> = if args.no_leave_notice {
        Arc::new(NoopLeaveNotifier)
    } else {
        Arc::new(HttpLeaveNotifier::new(&config.leave))
    };

    let (session, mut events) = VoiceSession::new(
        RoomId::new(args.room.as_str()),
        identity(&args),
        SessionDeps {
            media,
            signaling: Arc::new(WsConnector::from_config(&config.signaling)),
            connections,
            leave_notifier,
            membership: None,
        },
        SessionOptions::from(&config),
    );

    if args.muted {
        let _ = session.set_muted(true).await;
    }
    if let Err(e) = session.connect().await {
        eprintln!("voxmesh: {e}");
        std::process::exit(1);
    }

    let mut received: u64 = 0;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    print_event(&event);
                    if matches!(event, VoiceEvent::Disconnected { .. }) {
                        break;
                    }
                }
                None => break,
            },
            frame = remote_audio.recv() => match frame {
                Ok(frame) => {
                    received += 1;
                    if received % 500 == 0 {
                        tracing::debug!(peer = %frame.peer_id, frames = received, "Remote audio flowing");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Remote audio consumer lagging");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, leaving room");
                session.terminate();
                tokio::time::sleep(EXIT_GRACE).await;
                break;
            }
        }
    }

    pump.abort();
    tracing::info!("voxmesh exiting");
}
