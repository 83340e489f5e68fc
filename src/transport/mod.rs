#[cfg(test)]
pub mod mock;
pub mod osc;
pub mod transmitter;

#[cfg(test)]
pub use mock::{RecordingTransmitter, SentMessage};
pub use osc::UdpTransmitter;
pub use transmitter::{InertTransmitter, Transmitter};
