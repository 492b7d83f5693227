//! Configuration schema types for the WTM presence engine.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with the engine's stock tuning.

mod presence;
mod suggestions;
mod supabase;
mod system;

pub use presence::*;
pub use suggestions::*;
pub use supabase::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WtmConfig {
    pub presence: PresenceTuning,
    pub suggestions: SuggestionConfig,
    pub supabase: SupabaseConfig,
    pub logging: LoggingConfig,
}

// =============================================================================
// Tests
// =============================================================================
