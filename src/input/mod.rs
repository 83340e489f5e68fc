pub mod csv;
pub mod recording;
pub mod states;

pub use self::csv::{parse_number, parse_row};
pub use self::recording::{format_hms, Recording};
