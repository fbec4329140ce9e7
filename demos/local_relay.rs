//! Local relay server with a logging media backend
//!
//! Run with: cargo run --example local_relay [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example local_relay                    # binds to 127.0.0.1:1234
//!   cargo run --example local_relay 0.0.0.0:8554       # binds to 0.0.0.0:8554
//!
//! Play the local capture:
//!   ffplay rtsp://127.0.0.1:1234/live
//!
//! Publish a stream under a fresh id:
//!   ffmpeg -re -i input.mp4 -f rtsp rtsp://127.0.0.1:1234/<uuid>

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use rtsp_relay::media::{CaptureTrack, MediaBackend, TrackStart};
use rtsp_relay::protocol::TrackKind;
use rtsp_relay::registry::RegistryEvent;
use rtsp_relay::{RelayServer, ServerConfig};

/// Pretends to capture H.264 video and logs what would be sent
struct LoggingMedia;

impl MediaBackend for LoggingMedia {
    fn configure_capture(&self) -> io::Result<Vec<CaptureTrack>> {
        Ok(vec![CaptureTrack {
            kind: TrackKind::Video,
            description: "m=video 0 RTP/AVP 96\r\na=rtpmap:96 H264/90000\r\na=fmtp:96 packetization-mode=1\r\n"
                .into(),
        }])
    }

    fn start_track(&self, start: &TrackStart<'_>) -> io::Result<()> {
        println!(
            "[{}] {:?} track {} -> {}:{} (local {})",
            start.session_id,
            start.role,
            start.track.index,
            start.remote,
            start.track.remote_ports,
            start.track.local_ports,
        );
        Ok(())
    }

    fn stop_track(&self, session_id: u64, index: u8) {
        println!("[{}] track {} stopped", session_id, index);
    }
}

fn print_usage() {
    eprintln!("Usage: local_relay [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 127.0.0.1:1234)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rtsp_relay=debug".parse()?)
                .add_directive("local_relay=debug".parse()?),
        )
        .init();

    let mut config = ServerConfig::default();
    if let Some(addr) = args.get(1) {
        config.bind_addr = addr.replace("localhost", "127.0.0.1").parse::<SocketAddr>()?;
    }
    let bind_addr = config.bind_addr;

    let server = RelayServer::spawn(config, LoggingMedia);
    server.start()?;
    let addr = server.add_listener(bind_addr).await?;

    println!("Relay listening on {}", addr);
    println!("Play:    ffplay rtsp://{}/live", addr);
    println!();

    let mut registry_events = server.registry().subscribe();
    let mut ticker = tokio::time::interval(Duration::from_secs(30));

    loop {
        tokio::select! {
            event = registry_events.recv() => match event {
                Ok(RegistryEvent::Added { id, name }) => println!("Published: {} ({})", name, id),
                Ok(RegistryEvent::Removed { id }) => println!("Unpublished: {}", id),
                Err(_) => {}
            },
            _ = ticker.tick() => {
                let stats = server.stats().await?;
                println!(
                    "Stats: channels={} sessions={} streams={} requests={} failed={}",
                    stats.active_channels,
                    stats.active_sessions,
                    stats.published_streams,
                    stats.requests_handled,
                    stats.requests_failed,
                );
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
        }
    }

    server.stop().await?;
    server.shutdown()?;
    Ok(())
}
