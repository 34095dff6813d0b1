//! imlink client binary.
//!
//! Connects with the config in `imlink.yaml` (or the path given as the first
//! argument), authenticates with the token from `IMLINK_TOKEN`, and logs
//! every session event until the server hangs up or Ctrl-C.

use tracing_subscriber::{fmt, EnvFilter};

use imlink_client::{config, Client, Event, StaticToken};
use imlink_core::error::{ImlinkError, Result};

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "imlink.yaml".into());
    let cfg = config::load_from_file(&path)?;
    let token = std::env::var("IMLINK_TOKEN")
        .map_err(|_| ImlinkError::BadConfig("IMLINK_TOKEN must be set".into()))?;

    tracing::info!(addr = %cfg.connection.addr, "imlink-client starting");
    let client = Client::new(cfg, StaticToken::new(token)).await?;
    let mut session = client.connect().await?;
    let handle = session.handle();

    loop {
        tokio::select! {
            ev = session.recv() => match ev {
                Some(Event::Message { frame, origin }) => {
                    tracing::info!(seq = frame.seq, cmd = %frame.message.name(), ?origin, "message");
                }
                Some(Event::SyncBegin { scope }) => tracing::info!(?scope, "sync begin"),
                Some(Event::SyncEnd { scope, cursor, caught_up }) => {
                    tracing::info!(?scope, cursor, caught_up, "sync end");
                }
                Some(Event::Disconnected { reason }) => {
                    tracing::info!(%reason, "disconnected");
                    break;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                handle.close();
            }
        }
    }

    Ok(())
}
