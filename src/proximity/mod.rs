//! BLE proximity trigger.
//!
//! The radio stack lives outside this crate. It reports every advertisement
//! it sees as an [`Advertisement`], either by calling
//! [`ProximityMonitor::on_advertisement`] directly or by writing JSON lines
//! into the [`feed`].
//!
//! Each watched beacon gets its own [`ProximityDebouncer`], so several
//! customers can be tracked independently. Advertisements are expected to be
//! handled one at a time by a single owner of the monitor.

mod debouncer;
pub mod feed;

pub use debouncer::{normalize_address, Edge, ProximityDebouncer, Zone};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// One advertisement as reported by the BLE scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advertisement {
    /// Device MAC address, any case.
    pub address: String,
    /// Received signal strength in dBm, if the scanner reported one.
    #[serde(default)]
    pub rssi: Option<i16>,
    /// Advertised local name.
    #[serde(default)]
    pub name: Option<String>,
}

/// A signal reading stamped with the time it was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProximityObservation {
    /// Device MAC address.
    pub device_address: String,
    /// Signal strength in dBm.
    pub signal_strength: Option<i16>,
    /// Advertised local name.
    pub name: Option<String>,
    /// When the observation was taken.
    pub observed_at: DateTime<Utc>,
}

impl From<&Advertisement> for ProximityObservation {
    fn from(adv: &Advertisement) -> Self {
        Self {
            device_address: adv.address.clone(),
            signal_strength: adv.rssi,
            name: adv.name.clone(),
            observed_at: Utc::now(),
        }
    }
}

/// An edge on one of the watched beacons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProximityEvent {
    /// Beacon address, upper-cased.
    pub address: String,
    /// Which way the threshold was crossed.
    pub edge: Edge,
    /// The reading that crossed it.
    pub rssi: i16,
    /// Advertised local name, if the beacon sent one.
    pub name: Option<String>,
    /// When the reading was taken.
    pub observed_at: DateTime<Utc>,
}

/// Tracks any number of beacons, one debouncer each.
#[derive(Debug, Clone, Default)]
pub struct ProximityMonitor {
    debouncers: HashMap<String, ProximityDebouncer>,
}

impl ProximityMonitor {
    /// Watch every address in `addresses` with the same threshold.
    #[must_use]
    pub fn new<S: AsRef<str>>(addresses: &[S], threshold: i16) -> Self {
        let debouncers = addresses
            .iter()
            .map(|address| {
                let debouncer = ProximityDebouncer::new(address.as_ref(), threshold);
                (debouncer.address().to_string(), debouncer)
            })
            .collect();
        Self { debouncers }
    }

    /// Handle a scanner callback.
    pub fn on_advertisement(&mut self, adv: &Advertisement) -> Option<ProximityEvent> {
        if let Some(name) = adv.name.as_deref() {
            debug!("[BLE] {} ({}) RSSI={:?}", adv.address, name, adv.rssi);
        }
        self.observe(&ProximityObservation::from(adv))
    }

    /// Route an observation to the debouncer for its address.
    pub fn observe(&mut self, observation: &ProximityObservation) -> Option<ProximityEvent> {
        let key = normalize_address(&observation.device_address);
        let debouncer = self.debouncers.get_mut(&key)?;
        let rssi = observation.signal_strength?;

        debouncer
            .observe(&key, Some(rssi))
            .map(|edge| ProximityEvent {
                address: key,
                edge,
                rssi,
                name: observation.name.clone(),
                observed_at: observation.observed_at,
            })
    }

    /// Current zone of a watched address.
    #[must_use]
    pub fn zone(&self, address: &str) -> Option<Zone> {
        self.debouncers
            .get(&normalize_address(address))
            .map(ProximityDebouncer::zone)
    }

    /// Number of watched addresses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.debouncers.len()
    }

    /// Returns true if no address is watched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.debouncers.is_empty()
    }
}
