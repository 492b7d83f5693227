pub mod clock;
pub mod errors;

pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{ConfigError, StorageError, WtmError};

pub type Result<T> = std::result::Result<T, WtmError>;
