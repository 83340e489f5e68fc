use crate::transport::transmitter::{TransmitStats, Transmitter};
use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};

/// One captured send
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub address: String,
    pub value: f32,
}

/// Transmitter that records every send instead of putting it on the wire
///
/// Used to verify playback without a receiver listening.
#[derive(Default)]
pub struct RecordingTransmitter {
    sent: Mutex<Vec<SentMessage>>,
}

impl RecordingTransmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything sent so far
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Get all transmitted messages and clear the buffer
    pub fn take_sent(&self) -> Vec<SentMessage> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[async_trait]
impl Transmitter for RecordingTransmitter {
    fn destination(&self) -> &str {
        "memory"
    }

    async fn send(&self, address: &str, value: f32) {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentMessage { address: address.to_string(), value });
    }

    fn stats(&self) -> TransmitStats {
        TransmitStats {
            sent: self.sent.lock().unwrap_or_else(PoisonError::into_inner).len() as u64,
            failed: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_in_order() {
        let tx = RecordingTransmitter::new();
        tx.send("/theta/AF3", 1.0).await;
        tx.send("/alpha/AF3", 2.0).await;

        assert_eq!(tx.stats().sent, 2);
        let sent = tx.take_sent();
        assert_eq!(sent[0], SentMessage { address: "/theta/AF3".into(), value: 1.0 });
        assert_eq!(sent[1].value, 2.0);
        assert!(tx.sent().is_empty());
    }
}
