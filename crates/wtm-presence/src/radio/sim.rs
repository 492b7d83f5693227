//! In-process radio medium.
//!
//! Every [`SimulatedRadio`] created from one [`SimulatedAir`] can hear the
//! others. Nothing propagates on its own: call [`SimulatedAir::sweep`] to
//! deliver each live advertisement to each matching scanner once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use uuid::Uuid;

use super::types::{Advertisement, RadioDriver, RadioError, RadioEvent, RadioPower};

/// Signal strength reported for simulated peers unless overridden.
pub const DEFAULT_SIM_RSSI: i16 = -50;

struct Station {
    events: mpsc::UnboundedSender<RadioEvent>,
    power: RadioPower,
    scanning: Option<Uuid>,
    advertising: Option<Advertisement>,
    rssi: i16,
}

#[derive(Default)]
struct Air {
    stations: HashMap<usize, Station>,
    next_id: usize,
}

/// Shared medium connecting simulated radios.
#[derive(Clone, Default)]
pub struct SimulatedAir {
    air: Arc<Mutex<Air>>,
}

impl SimulatedAir {
    pub fn new() -> Self {
        Self::default()
    }

    /// A powered-on radio heard by others at [`DEFAULT_SIM_RSSI`].
    pub fn radio(&self) -> SimulatedRadio {
        self.radio_with_rssi(DEFAULT_SIM_RSSI)
    }

    pub fn radio_with_rssi(&self, rssi: i16) -> SimulatedRadio {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut air = self.lock();
        let id = air.next_id;
        air.next_id += 1;
        air.stations.insert(
            id,
            Station {
                events: tx,
                power: RadioPower::PoweredOn,
                scanning: None,
                advertising: None,
                rssi,
            },
        );
        SimulatedRadio {
            air: self.clone(),
            id,
            events: Mutex::new(Some(rx)),
        }
    }

    /// Deliver every current advertisement to every other scanner listening
    /// for its service. Returns the number of discoveries delivered.
    pub fn sweep(&self) -> usize {
        let air = self.lock();
        let mut delivered = 0;
        for (scanner_id, scanner) in &air.stations {
            let Some(filter) = scanner.scanning else {
                continue;
            };
            for (advertiser_id, advertiser) in &air.stations {
                if advertiser_id == scanner_id {
                    continue;
                }
                let Some(ad) = &advertiser.advertising else {
                    continue;
                };
                if ad.service_id != filter {
                    continue;
                }
                let event = RadioEvent::Discovered {
                    service_data: HashMap::from([(ad.service_id, ad.payload.clone())]),
                    rssi: advertiser.rssi,
                };
                if scanner.events.send(event).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Air> {
        self.air.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// One device's radio on a [`SimulatedAir`].
pub struct SimulatedRadio {
    air: SimulatedAir,
    id: usize,
    events: Mutex<Option<mpsc::UnboundedReceiver<RadioEvent>>>,
}

impl SimulatedRadio {
    /// Flip both roles on or off, reporting the change like a real stack.
    pub fn set_power(&self, power: RadioPower) {
        let mut air = self.air.lock();
        if let Some(station) = air.stations.get_mut(&self.id) {
            station.power = power;
            if !power.is_on() {
                station.scanning = None;
                station.advertising = None;
            }
            let _ = station.events.send(RadioEvent::ScannerPower(power));
            let _ = station.events.send(RadioEvent::AdvertiserPower(power));
        }
    }

    /// Feed an arbitrary event to whoever consumes this radio.
    pub fn inject(&self, event: RadioEvent) {
        if let Some(station) = self.air.lock().stations.get(&self.id) {
            let _ = station.events.send(event);
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.air
            .lock()
            .stations
            .get(&self.id)
            .is_some_and(|s| s.scanning.is_some())
    }

    pub fn advertisement(&self) -> Option<Advertisement> {
        self.air
            .lock()
            .stations
            .get(&self.id)
            .and_then(|s| s.advertising.clone())
    }

    fn power(&self) -> RadioPower {
        self.air
            .lock()
            .stations
            .get(&self.id)
            .map(|s| s.power)
            .unwrap_or(RadioPower::Unsupported)
    }

    fn with_powered_station(
        &self,
        f: impl FnOnce(&mut Station),
    ) -> Result<(), RadioError> {
        let mut air = self.air.lock();
        let station = air
            .stations
            .get_mut(&self.id)
            .ok_or_else(|| RadioError::Unsupported("radio detached from air".into()))?;
        if !station.power.is_on() {
            return Err(RadioError::Driver(format!(
                "radio not powered on ({:?})",
                station.power
            )));
        }
        f(station);
        Ok(())
    }
}

impl RadioDriver for SimulatedRadio {
    fn scanner_power(&self) -> RadioPower {
        self.power()
    }

    fn advertiser_power(&self) -> RadioPower {
        self.power()
    }

    fn start_scanning(&self, service_id: Uuid) -> Result<(), RadioError> {
        self.with_powered_station(|s| s.scanning = Some(service_id))
    }

    fn stop_scanning(&self) {
        if let Some(station) = self.air.lock().stations.get_mut(&self.id) {
            station.scanning = None;
        }
    }

    fn start_advertising(&self, advertisement: Advertisement) -> Result<(), RadioError> {
        self.with_powered_station(|s| s.advertising = Some(advertisement))
    }

    fn stop_advertising(&self) {
        if let Some(station) = self.air.lock().stations.get_mut(&self.id) {
            station.advertising = None;
        }
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<RadioEvent>> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

impl Drop for SimulatedRadio {
    fn drop(&mut self) {
        self.air.lock().stations.remove(&self.id);
    }
}
