//! Dual-role radio presence: advertise our token, scan for everyone else's.

mod manager;
mod sim;
mod types;


pub use manager::{RadioPresenceManager, RadioStatus, SightingSink};
pub use sim::{SimulatedAir, SimulatedRadio, DEFAULT_SIM_RSSI};
pub use types::{Advertisement, RadioDriver, RadioError, RadioEvent, RadioPower};
