//! RSSI hysteresis for a single beacon.
//!
//! The debouncer is a two-state machine (`Far`, `Near`) that turns a noisy
//! stream of signal readings into edge events. It starts `Far` and never
//! terminates.
//!
//! ```text
//!            rssi > threshold
//!   ┌─────┐ ─────────────────► ┌──────┐
//!   │ Far │       Enter        │ Near │
//!   └─────┘ ◄───────────────── └──────┘
//!            rssi <= threshold
//!                  Reset
//! ```

/// Edge emitted when the beacon crosses the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Beacon moved from far to near.
    Enter,
    /// Beacon moved from near to far.
    Reset,
}

/// Current zone of a watched beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Zone {
    /// Out of range (initial state).
    #[default]
    Far,
    /// Within range.
    Near,
}

/// Debounces signal readings for one watched device address.
#[derive(Debug, Clone)]
pub struct ProximityDebouncer {
    /// Watched address, upper-cased.
    address: String,
    /// Readings strictly above this count as near.
    threshold: i16,
    zone: Zone,
}

impl ProximityDebouncer {
    /// Create a debouncer for `address` in the `Far` zone.
    #[must_use]
    pub fn new(address: &str, threshold: i16) -> Self {
        Self {
            address: normalize_address(address),
            threshold,
            zone: Zone::Far,
        }
    }

    /// Feed one observation.
    ///
    /// Observations for other addresses and readings without a signal
    /// strength are ignored. The zone only changes when an edge is returned.
    pub fn observe(&mut self, device_address: &str, signal_strength: Option<i16>) -> Option<Edge> {
        if !self.matches(device_address) {
            return None;
        }
        let rssi = signal_strength?;

        match self.zone {
            Zone::Far if rssi > self.threshold => {
                self.zone = Zone::Near;
                Some(Edge::Enter)
            }
            Zone::Near if rssi <= self.threshold => {
                self.zone = Zone::Far;
                Some(Edge::Reset)
            }
            _ => None,
        }
    }

    /// Returns true if `device_address` is the watched address, ignoring case.
    #[must_use]
    pub fn matches(&self, device_address: &str) -> bool {
        device_address.trim().eq_ignore_ascii_case(&self.address)
    }

    /// The watched address, upper-cased.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The configured threshold in dBm.
    #[must_use]
    pub fn threshold(&self) -> i16 {
        self.threshold
    }

    /// The current zone.
    #[must_use]
    pub fn zone(&self) -> Zone {
        self.zone
    }
}

/// Canonical form of a MAC address used as a map key.
#[must_use]
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_uppercase()
}
