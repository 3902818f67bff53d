//! A small terminal client demonstrating `pico_client::ClientDriver`'s
//! public API: connect, move a local pose with WASD-style input on stdin
//! lines, and print roster updates as they arrive.

use std::io::BufRead;
use std::sync::{Arc, Mutex};

use pico_client::ClientDriver;
use pico_protocol::Pose;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("PICORADAR_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let addr = args.next().unwrap_or_else(|| "127.0.0.1:11451".to_owned());
    let player_id = args.next().unwrap_or_else(|| "interactive".to_owned());
    let token = args
        .next()
        .unwrap_or_else(|| "secure_production_token_change_me_2025".to_owned());

    let driver = Arc::new(ClientDriver::new());
    driver.on_roster(|roster| {
        println!("--- roster update: {} player(s) ---", roster.players.len());
        for entry in &roster.players {
            println!(
                "  {} at ({:.1}, {:.1}, {:.1})",
                entry.player_id, entry.pose.position[0], entry.pose.position[1], entry.pose.position[2]
            );
        }
    });

    println!("connecting to {addr} as {player_id}...");
    if let Err(err) = driver.connect(&addr, &player_id, &token).await {
        eprintln!("failed to connect: {err}");
        std::process::exit(1);
    }
    println!("connected. enter w/a/s/d/q/e to move, blank line or 'quit' to exit.");

    let position = Arc::new(Mutex::new([0.0f32, 0.0, 0.0]));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    while let Some(line) = rx.recv().await {
        let command = line.trim();
        if command.is_empty() || command.eq_ignore_ascii_case("quit") {
            break;
        }

        let mut pos = position.lock().expect("position lock poisoned");
        for ch in command.chars() {
            match ch.to_ascii_lowercase() {
                'w' => pos[2] += 1.0,
                's' => pos[2] -= 1.0,
                'a' => pos[0] -= 1.0,
                'd' => pos[0] += 1.0,
                'q' => pos[1] += 1.0,
                'e' => pos[1] -= 1.0,
                _ => {}
            }
        }
        let timestamp_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        let pose = Pose {
            position: *pos,
            rotation: [0.0, 0.0, 0.0, 1.0],
            scene_id: "interactive".to_owned(),
            timestamp_ms,
        };
        drop(pos);
        driver.send_pose(pose);
    }

    println!("disconnecting...");
    driver.disconnect().await;
}
