//! File watching for live reload.
//!
//! Uses the `notify` crate with a 500ms debounce so an editor's
//! write-then-rename save produces a single reload.

mod file_watcher;


pub use file_watcher::{spawn_settings_reload, FileWatcher, DEBOUNCE};
