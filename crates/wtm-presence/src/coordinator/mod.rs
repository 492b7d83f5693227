//! Top-level presence orchestration.
//!
//! The [`Coordinator`] turns settings snapshots and foreground/background
//! transitions into radio and uploader starts and stops, and owns the
//! single active party suggestion with its cooldown.

mod engine;
mod types;

#[cfg(test)]
mod tests;

pub use engine::Coordinator;
pub use types::{Collaborators, CoordinatorEvent, CreateEventHandler};
