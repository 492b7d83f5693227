//! Anonymous proximity presence for WTM.
//!
//! Each device advertises a rotating token derived from a private seed,
//! scans for the tokens of nearby devices, and uploads deduplicated
//! sightings so the backend can suggest parties to groups that are
//! physically together. No token can be linked to a user or to another
//! token without the seed.
//!
//! Leaf-first: [`seed`] → [`token`] → [`radio`] → [`buffer`] → [`uploader`],
//! with the [`coordinator`] driving all of them from user settings.

pub mod api;
pub mod buffer;
pub mod coordinator;
pub mod protocol;
pub mod radio;
pub mod seed;
pub mod token;
pub mod uploader;

pub use api::{ApiError, MemoryApi, PresenceApi, SuggestionApi, SupabaseClient};
pub use buffer::SightingBuffer;
pub use coordinator::{Collaborators, Coordinator, CoordinatorEvent, CreateEventHandler};
pub use protocol::{PartySuggestion, PartySuggestionStatus, PresenceSighting, PresenceToken};
pub use radio::{
    Advertisement, RadioDriver, RadioError, RadioEvent, RadioPower, RadioPresenceManager,
    RadioStatus, SightingSink, SimulatedAir, SimulatedRadio,
};
pub use seed::{FileSeedPersistence, MemorySeedPersistence, Seed, SeedPersistence, SeedStore};
pub use token::{derive_token, TokenProvider};
pub use uploader::Uploader;
