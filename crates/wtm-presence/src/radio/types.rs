//! Radio driver abstraction and the events it reports.

use std::collections::HashMap;

use tokio::sync::mpsc;
use uuid::Uuid;

/// Power / authorization state of one radio role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RadioPower {
    #[default]
    Unknown,
    Resetting,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
}

impl RadioPower {
    pub fn is_on(self) -> bool {
        self == Self::PoweredOn
    }
}

/// Payload to broadcast: service-scoped data under a single service id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub service_id: Uuid,
    pub payload: Vec<u8>,
}

/// Callbacks from the platform radio stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    ScannerPower(RadioPower),
    AdvertiserPower(RadioPower),
    Discovered {
        service_data: HashMap<Uuid, Vec<u8>>,
        rssi: i16,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RadioError {
    #[error("radio role unsupported: {0}")]
    Unsupported(String),

    #[error("radio driver error: {0}")]
    Driver(String),
}

/// A short-range radio capable of advertising and scanning.
///
/// Calls are synchronous requests; outcomes and observations arrive on the
/// event stream handed out by [`RadioDriver::take_events`].
pub trait RadioDriver: Send + Sync {
    fn scanner_power(&self) -> RadioPower;

    fn advertiser_power(&self) -> RadioPower;

    /// Scan for advertisements carrying `service_id`.
    fn start_scanning(&self, service_id: Uuid) -> Result<(), RadioError>;

    fn stop_scanning(&self);

    /// Start broadcasting, replacing any previous advertisement.
    fn start_advertising(&self, advertisement: Advertisement) -> Result<(), RadioError>;

    fn stop_advertising(&self);

    /// The event stream. Yields `Some` exactly once.
    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<RadioEvent>>;
}
