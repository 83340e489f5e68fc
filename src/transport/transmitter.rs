use async_trait::async_trait;
use tracing::debug;

/// Send counters for a transmitter
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransmitStats {
    pub sent: u64,
    pub failed: u64,
}

/// Destination for addressed scalar values
///
/// Sends are best-effort. Implementations swallow (and log) their own
/// transport failures; nothing is reported back to the playback loop.
#[async_trait]
pub trait Transmitter: Send + Sync {
    /// Human-readable destination, e.g. `127.0.0.1:7000`
    fn destination(&self) -> &str;

    /// Send one value to `address`
    async fn send(&self, address: &str, value: f32);

    /// Counters since construction
    fn stats(&self) -> TransmitStats {
        TransmitStats::default()
    }

    /// True when sends are discarded because no transport could be set up
    fn is_inert(&self) -> bool {
        false
    }
}

/// Stand-in used when the real transport could not be constructed
pub struct InertTransmitter {
    destination: String,
}

impl InertTransmitter {
    pub fn new(destination: impl Into<String>) -> Self {
        Self { destination: destination.into() }
    }
}

#[async_trait]
impl Transmitter for InertTransmitter {
    fn destination(&self) -> &str {
        &self.destination
    }

    async fn send(&self, address: &str, value: f32) {
        debug!("Discarding {} = {} (no transport to {})", address, value, self.destination);
    }

    fn is_inert(&self) -> bool {
        true
    }
}
