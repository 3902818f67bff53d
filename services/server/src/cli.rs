//! Line-oriented stdin command loop: `status` prints the current player
//! count, `quit`/`exit` trigger the same graceful shutdown path as SIGINT.

use std::io::BufRead;

use tracing::info;

use crate::state::AppState;

pub async fn run(state: AppState) {
    let (tx, mut rx) = tokio::sync::mpsc::channel::<String>(8);

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    while let Some(line) = rx.recv().await {
        match line.trim() {
            "status" => {
                let count = state.registry.count();
                println!("{count} player(s) connected");
            }
            "quit" | "exit" => {
                info!("shutdown requested via stdin");
                state.shutdown.fire();
                return;
            }
            "" => {}
            other => println!("unrecognized command: {other}"),
        }
    }
}
