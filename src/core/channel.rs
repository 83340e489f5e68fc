//! Column position to OSC address mapping
//!
//! Each data column of a recording carries the power of one frequency band
//! at one electrode. Columns are laid out sensor-major: the five bands of
//! `AF3` come first, then the five bands of `F7`, and so on.

/// Frequency bands, in column order within one sensor
pub const BANDS: [&str; 5] = ["theta", "alpha", "betaL", "betaH", "gamma"];

/// Electrode positions, in column order
pub const SENSORS: [&str; 14] = [
    "AF3", "F7", "F3", "FC5", "T7", "P7", "O1", "O2", "P8", "T8", "FC6", "F4", "F8", "AF4",
];

/// Number of addressable channels (bands x sensors)
pub const CHANNEL_COUNT: usize = BANDS.len() * SENSORS.len();

/// Build the OSC address for a data column.
///
/// `column` is the position within the row, so column 0 (the timestamp)
/// is not a channel. Callers must keep `column` within `1..=CHANNEL_COUNT`.
pub fn channel_address(column: usize) -> String {
    let band = BANDS[(column - 1) % BANDS.len()];
    let sensor = SENSORS[(column - 1) / BANDS.len()];
    format!("/{}/{}", band, sensor)
}

/// Every channel address in column order
pub fn all_addresses() -> impl Iterator<Item = String> {
    (1..=CHANNEL_COUNT).map(channel_address)
}
