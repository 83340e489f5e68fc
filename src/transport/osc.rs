use crate::error::{ReplayError, Result};
use crate::transport::transmitter::{TransmitStats, Transmitter};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// OSC type tag for a message carrying a single float32 argument
const FLOAT_TYPE_TAG: &str = ",f";

/// Encode an OSC 1.0 message with one float argument
///
/// Layout: address string, type tag string, then the big-endian value.
/// Strings are NUL-terminated and padded to a multiple of four bytes.
pub fn encode_float_message(address: &str, value: f32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(padded_len(address) + padded_len(FLOAT_TYPE_TAG) + 4);
    write_padded(&mut buf, address);
    write_padded(&mut buf, FLOAT_TYPE_TAG);
    buf.extend_from_slice(&value.to_be_bytes());
    buf
}

fn padded_len(s: &str) -> usize {
    (s.len() / 4 + 1) * 4
}

fn write_padded(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    buf.resize(buf.len() + padded_len(s) - s.len(), 0);
}

/// OSC over UDP to a single fixed destination
pub struct UdpTransmitter {
    socket: UdpSocket,
    destination: String,
    sent: AtomicU64,
    failed: AtomicU64,
}

impl UdpTransmitter {
    /// Resolve `host:port` and bind a local socket connected to it
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let destination = format!("{}:{}", host, port);
        let unavailable = |reason: String| ReplayError::TransportUnavailable {
            destination: destination.clone(),
            reason,
        };

        let target: SocketAddr = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| unavailable(e.to_string()))?
            .next()
            .ok_or_else(|| unavailable("host did not resolve".to_string()))?;

        let local = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        socket
            .connect(target)
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        info!("Sending OSC to {} ({})", destination, target);

        Ok(Self {
            socket,
            destination,
            sent: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl Transmitter for UdpTransmitter {
    fn destination(&self) -> &str {
        &self.destination
    }

    async fn send(&self, address: &str, value: f32) {
        let packet = encode_float_message(address, value);
        match self.socket.send(&packet).await {
            Ok(_) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                // Warn once; a dead receiver would otherwise flood the log
                if self.failed.fetch_add(1, Ordering::Relaxed) == 0 {
                    warn!("OSC send to {} failed: {}", self.destination, e);
                } else {
                    debug!("OSC send {} failed: {}", address, e);
                }
            }
        }
    }

    fn stats(&self) -> TransmitStats {
        TransmitStats {
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
