#[cfg(test)]
use std::sync::{Mutex, PoisonError};

/// Where the engine reports conditions the operator must see
///
/// The engine never presents anything itself; the front end decides how an
/// alert is shown and acknowledged. Returning from `alert` counts as the
/// acknowledgement.
pub trait AlertSink: Send + Sync {
    fn alert(&self, title: &str, message: &str);
}

/// Prints alerts to stderr
pub struct ConsoleAlerts;

impl AlertSink for ConsoleAlerts {
    fn alert(&self, title: &str, message: &str) {
        eprintln!("[mindsim] {}: {}", title, message);
    }
}

/// Keeps alerts in memory (for testing)
#[cfg(test)]
#[derive(Default)]
pub struct MemoryAlerts {
    alerts: Mutex<Vec<(String, String)>>,
}

#[cfg(test)]
impl MemoryAlerts {
    pub fn new() -> Self {
        Self::default()
    }

    /// All `(title, message)` pairs received so far
    pub fn alerts(&self) -> Vec<(String, String)> {
        self.alerts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[cfg(test)]
impl AlertSink for MemoryAlerts {
    fn alert(&self, title: &str, message: &str) {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((title.to_string(), message.to_string()));
    }
}
