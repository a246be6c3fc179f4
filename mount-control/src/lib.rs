//! Motion planning for an equatorial telescope mount.
//!
//! Sits on top of the pulse engine: converts equatorial targets into
//! axis revolutions through the mount's gear train and misalignment
//! transform, compensates slews for sidereal drift, derives tracking
//! velocities, and recovers the mount pole from calibration samples.

pub mod calibration;
pub mod camera;
pub mod clock;
pub mod mount;
pub mod settings;

pub use calibration::{CalibrationSession, MAX_CALIBRATION_PAIRS};
pub use camera::{CameraTrigger, DebouncedTrigger};
pub use clock::{FixedTimeSource, SystemClock, TimeSource};
pub use mount::{GearConfig, MountController, MountError};
pub use settings::{MountSettings, SettingsStore};
