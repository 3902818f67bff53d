//! LAN discovery responder: bind once, loop forever, reply only to the
//! exact request literal, never treat garbage as an error.

use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

const DISCOVERY_REQUEST: &[u8] = b"PICO_RADAR_DISCOVERY_REQUEST";
const DISCOVERY_RESPONSE_PREFIX: &str = "PICO_RADAR_SERVER:";

/// Runs until the socket errors out (which only happens on shutdown of the
/// process hosting it; the listener never closes this socket itself).
pub async fn run(udp_port: u16, service_port: u16) -> std::io::Result<()> {
    let socket = UdpSocket::bind(("0.0.0.0", udp_port)).await?;
    info!(port = udp_port, "discovery responder listening");

    let mut buf = [0u8; 128];
    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(err) => {
                debug!(error = %err, "discovery recv error");
                continue;
            }
        };

        if &buf[..len] != DISCOVERY_REQUEST {
            continue;
        }

        let response = format!("{DISCOVERY_RESPONSE_PREFIX}0.0.0.0:{service_port}");
        if let Err(err) = socket.send_to(response.as_bytes(), peer).await {
            warn!(error = %err, %peer, "failed to reply to discovery probe");
        }
    }
}
