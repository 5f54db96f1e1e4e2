// Motor output seam
//
// The mixer's two wheel powers are handed verbatim to whatever implements
// `MotorOutput` (PWM board, serial controller, simulation).

use tracing::{debug, info};

use crate::messages::WheelCommand;

/// Error types for motor output
#[derive(Debug, thiserror::Error)]
pub enum MotorError {
    #[error("Motor controller disconnected")]
    Disconnected,
}

/// Accepts one normalized power per wheel and applies it to hardware
pub trait MotorOutput {
    fn set_speed(&mut self, left: f32, right: f32) -> Result<(), MotorError>;

    /// Stop both wheels
    fn stop(&mut self) -> Result<(), MotorError> {
        self.set_speed(0.0, 0.0)
    }
}

impl<M: MotorOutput + ?Sized> MotorOutput for Box<M> {
    fn set_speed(&mut self, left: f32, right: f32) -> Result<(), MotorError> {
        (**self).set_speed(left, right)
    }

    fn stop(&mut self) -> Result<(), MotorError> {
        (**self).stop()
    }
}

/// Simulation output: remembers and logs the last command
#[derive(Debug, Default)]
pub struct LoggingMotor {
    last: WheelCommand,
    commands: u64,
}

impl LoggingMotor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_command(&self) -> WheelCommand {
        self.last
    }

    /// Number of commands received so far
    pub fn commands(&self) -> u64 {
        self.commands
    }
}

impl MotorOutput for LoggingMotor {
    fn set_speed(&mut self, left: f32, right: f32) -> Result<(), MotorError> {
        let cmd = WheelCommand { left, right };
        if cmd != self.last {
            debug!("Setting wheel powers: left={:.3}, right={:.3}", left, right);
        }
        self.last = cmd;
        self.commands += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), MotorError> {
        info!("Stopping all motors");
        self.set_speed(0.0, 0.0)
    }
}
