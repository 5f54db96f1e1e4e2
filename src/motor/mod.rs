// Drive module for the differential-drive base
//
// Provides:
// - Power mixer (forward + steering power -> left/right wheel power)
// - Motor output trait and a simulation sink

mod driver;
pub mod mixer;

pub use driver::{LoggingMotor, MotorError, MotorOutput};
pub use mixer::{remap, DriveState, PowerMixer};
