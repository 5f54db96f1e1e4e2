// Drive loop with watchdog
// Note: if the input source dies (teleop crashes, joystick unplugged) the
// watchdog zeroes the mixer so the robot doesn't keep driving on the last command.

use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::config::DriveConfig;
use crate::messages::{Axis, Button, InputEvent, RuntimeHealth, RuntimeStatus, WheelCommand};
use crate::motor::{MotorError, MotorOutput, PowerMixer};

pub struct Runtime {
    mixer: PowerMixer,
    last_input_at: Option<Instant>,
    cmd_timeout: Option<Duration>,
    health: RuntimeHealth,
}

impl Runtime {
    pub fn new(cmd_timeout: Option<Duration>) -> Self {
        Self {
            mixer: PowerMixer::new(),
            last_input_at: None,
            cmd_timeout,
            health: RuntimeHealth::CmdStale, // Start stale until first input
        }
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    /// Process incoming input event
    fn on_input(&mut self, event: InputEvent) {
        debug!("Received input: {:?}", &event);
        match event {
            InputEvent::Axis {
                axis: Axis::Forward,
                value,
            } => {
                self.mixer.set_forward_power(value);
            }
            InputEvent::Axis {
                axis: Axis::Steer,
                value,
            } => {
                self.mixer.set_steering_power(value);
            }
            InputEvent::Button {
                button: Button::Halt,
                pressed: true,
            } => {
                info!("Halt requested");
                self.mixer.reset();
            }
            InputEvent::Button {
                button: Button::Stream,
                ..
            } => {
                debug!("Stream button has no effect on the drive loop");
            }
            InputEvent::Button { pressed: false, .. } => {}
        }
        self.last_input_at = Some(Instant::now());
    }

    /// Compute wheel command based on watchdog state
    fn compute_actuation(&mut self) -> WheelCommand {
        let stale = match (self.last_input_at, self.cmd_timeout) {
            // No input ever received
            (None, _) => true,
            (Some(at), Some(timeout)) => at.elapsed() > timeout,
            (Some(_), None) => false,
        };

        if stale {
            // Watchdog triggered - stop the robot
            if self.health != RuntimeHealth::CmdStale {
                warn!(
                    "Input stale ({:?} old), stopping robot",
                    self.last_input_at.map(|at| at.elapsed())
                );
            }
            self.health = RuntimeHealth::CmdStale;
            self.mixer.reset();
            WheelCommand::default()
        } else {
            self.health = RuntimeHealth::Ok;
            WheelCommand::from(self.mixer.compute_wheel_powers())
        }
    }
}

/// Run the drive loop until every input sender is dropped
///
/// Each tick drains pending input without blocking, runs the watchdog, sends
/// the wheel command to the motors and publishes a status snapshot.
pub async fn run<M: MotorOutput>(
    config: &DriveConfig,
    mut inputs: mpsc::Receiver<InputEvent>,
    motors: &mut M,
    status: &watch::Sender<RuntimeStatus>,
) -> Result<(), MotorError> {
    let mut runtime = Runtime::new(config.cmd_timeout());
    let mut tick = interval(config.tick_period());

    info!(
        "Runtime started: {}Hz loop, watchdog {}",
        config.loop_hz,
        match config.cmd_timeout() {
            Some(timeout) => format!("{}ms", timeout.as_millis()),
            None => "disabled".to_string(),
        }
    );

    loop {
        tick.tick().await;

        // 1. Drain all pending input (non-blocking)
        let mut closed = false;
        loop {
            match inputs.try_recv() {
                Ok(event) => runtime.on_input(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    closed = true;
                    break;
                }
            }
        }

        // 2. Compute wheel command (includes watchdog logic)
        let wheels = runtime.compute_actuation();

        // 3. Drive the motors
        if let Err(e) = motors.set_speed(wheels.left, wheels.right) {
            error!("Motor command failed: {}", e);
            if let Err(stop_err) = motors.stop() {
                warn!("Failed to stop motors after error: {}", stop_err);
            }
            return Err(e);
        }

        // 4. Publish status
        status.send_replace(RuntimeStatus {
            health: runtime.health(),
            wheels,
        });

        if closed {
            info!("All input sources closed, stopping runtime");
            break;
        }
    }

    motors.stop()?;
    status.send_replace(RuntimeStatus::default());
    Ok(())
}
