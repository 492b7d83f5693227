//! Long-lived secret from which every presence token is derived.
//!
//! One seed is active at a time. It is regenerated lazily from the OS
//! CSPRNG once it is older than the configured lifetime.

mod persistence;
mod store;


pub use persistence::{FileSeedPersistence, MemorySeedPersistence, SeedPersistence};
pub use store::{Seed, SeedStore, SEED_LEN};
