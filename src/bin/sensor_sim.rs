use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use sensor_logger_rs::codec::HeaderLayout;
use sensor_logger_rs::simulator::{router, SimKind, SimSettings};
use std::time::Duration;
use tokio::net::TcpListener;

/// Serve a synthetic sensor stream over WebSocket.
#[derive(Parser, Debug)]
#[command(name = "sensor_sim")]
struct Args {
    /// main-new, main-old, camera-binary or camera-text
    #[arg(long, default_value = "main-new")]
    kind: SimKind,

    #[arg(long, default_value = "127.0.0.1:8181")]
    bind: String,

    /// Frames per second
    #[arg(long, default_value = "8.0")]
    fps: f64,

    /// Send headers without the "MC" marker
    #[arg(long, default_value_t = false)]
    no_magic: bool,

    /// Close each connection after this many frames
    #[arg(long)]
    frames: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    anyhow::ensure!(args.fps > 0.0, "--fps must be positive");

    let settings = SimSettings {
        kind: args.kind,
        layout: if args.no_magic {
            HeaderLayout::NoMagic
        } else {
            HeaderLayout::WithMagic
        },
        interval: Duration::from_secs_f64(1.0 / args.fps),
        frames: args.frames,
    };

    let listener = TcpListener::bind(&args.bind).await?;
    log::info!("[sim] {:?} at ws://{}/", settings.kind, listener.local_addr()?);
    axum::serve(listener, router(settings)).await?;
    Ok(())
}
