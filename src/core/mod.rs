pub mod channel;
pub mod segment;

pub use channel::{all_addresses, channel_address, CHANNEL_COUNT};
pub use segment::SegmentLabel;
