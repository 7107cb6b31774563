//! Form Runtime
//!
//! Session state, autosave, progress and the device/location snapshots taken
//! when a response is written.

mod autosave;
mod device;
mod geolocation;
mod progress;
mod session;

pub use autosave::Debouncer;
pub use device::{DeviceInfoProvider, HostDeviceInfo};
pub use geolocation::{
    capture as capture_location, FixedGeolocation, GeolocationError, GeolocationProvider, NoGeolocation,
    Position, PositionOptions,
};
pub use progress::calculate as progress;
pub use session::{FormSession, Phase, SaveOutcome, SessionDeps, SubmitOutcome};
