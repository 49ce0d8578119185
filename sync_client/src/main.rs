//! Standalone client binary.
//!
//! Usage:
//!   cargo run -p sync_client -- [--config client.json] [--addr 127.0.0.1:40000]
//!
//! Connects, waits for the welcome, then turns typed words into key presses
//! and prints the mirrored world whenever it changes.
//!
//! Console commands:
//!   up/down/left/right (or w/s/a/d) - Move; several per line are fine
//!   status                          - Show session status
//!   quit                            - Exit client

use std::env;
use std::io::{BufRead, Write};
use std::time::Duration;

use anyhow::Context;
use sync_client::{client::is_protocol_violation, input::parse_keys, SyncClient};
use sync_shared::{
    config::SyncConfig,
    world::{ParticipantId, World},
};
use tokio::sync::mpsc;
use tracing::{error, info};

const WELCOME_TIMEOUT: Duration = Duration::from_secs(5);

fn render(world: &World, own: Option<ParticipantId>) {
    println!("--- world ({} participants) ---", world.len());
    for p in world.values() {
        let marker = if Some(p.id) == own { "*" } else { " " };
        println!("{marker} {:>4}  x={:<6} y={}", p.id.0, p.x, p.y);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = SyncConfig::from_args(env::args().skip(1)).context("parse arguments")?;
    info!(server = %cfg.server_addr, "Starting client");

    let mut client = SyncClient::connect(&cfg).await.context("connect")?;
    let own_id = client.wait_for_welcome(WELCOME_TIMEOUT).await?;
    info!(participant = %own_id, "Joined");

    // Input is only wired up once the session is active.
    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Joined as {own_id}. Type up/down/left/right, 'status' or 'quit'.");
    render(client.session().world(), Some(own_id));
    let mut drawn = client.session().world_version();

    loop {
        tokio::select! {
            line = console_rx.recv() => {
                let Some(line) = line else { break };
                match line.as_str() {
                    "quit" | "exit" => break,
                    "status" => {
                        let s = client.session();
                        println!("State: {:?}", s.state());
                        println!("Participant: {own_id}");
                        println!("Server: {}", client.server_addr());
                        if let Some(me) = s.me() {
                            println!("Position: ({}, {})", me.x, me.y);
                        }
                        println!("World version: {}", s.world_version());
                    }
                    _ => match parse_keys(&line) {
                        Ok(keys) => {
                            for key in keys {
                                client.press_key(key).await?;
                            }
                        }
                        Err(bad) => println!("Unknown input '{bad}'"),
                    },
                }
            }
            event = client.next_event() => {
                match client.handle_event(event).await {
                    Ok(true) => {}
                    Ok(false) => {
                        println!("Disconnected from server.");
                        return Ok(());
                    }
                    Err(e) => {
                        if is_protocol_violation(&e) {
                            error!(error = %e, "Protocol violation");
                        }
                        return Err(e);
                    }
                }
                if client.session().world_version() != drawn {
                    drawn = client.session().world_version();
                    render(client.session().world(), Some(own_id));
                }
            }
        }
    }

    client.close().await;
    Ok(())
}
