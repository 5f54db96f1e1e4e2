// Robot facade: one mixer feeding the motors, plus the camera pipeline
//
// Used by synchronous callers such as a GUI event loop. The drive runtime in
// `runtime.rs` drives the mixer on its own and does not go through here.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::CameraConfig;
use crate::messages::{Axis, Button, InputEvent, WheelCommand};
use crate::motor::{DriveState, MotorError, MotorOutput, PowerMixer};
use crate::video::{Camera, Frame, FramePipeline, PipelineError, PipelineState};

#[derive(Debug, thiserror::Error)]
pub enum RobotError {
    #[error("Motor error: {0}")]
    Motor(#[from] MotorError),

    #[error("Video error: {0}")]
    Video(#[from] PipelineError),
}

pub struct Robot<M: MotorOutput, C: Camera> {
    mixer: PowerMixer,
    motors: M,
    pipeline: FramePipeline<C>,
    rotate_180: bool,
}

impl<M: MotorOutput, C: Camera> Robot<M, C> {
    pub fn new(motors: M, camera: C, config: &CameraConfig) -> Self {
        Self::with_pipeline(motors, FramePipeline::new(camera, config), config.rotate_180)
    }

    pub fn with_pipeline(motors: M, pipeline: FramePipeline<C>, rotate_180: bool) -> Self {
        Self {
            mixer: PowerMixer::new(),
            motors,
            pipeline,
            rotate_180,
        }
    }

    /// Set forward power and push the result to the motors
    pub fn apply_power(&mut self, power: f32) -> Result<WheelCommand, MotorError> {
        let wheels = self.mixer.set_forward_power(power);
        self.send(wheels)
    }

    /// Set steering power and push the result to the motors
    pub fn apply_steering_power(&mut self, steer: f32) -> Result<WheelCommand, MotorError> {
        let wheels = self.mixer.set_steering_power(steer);
        self.send(wheels)
    }

    /// Zero power and steering, stop the motors
    pub fn halt(&mut self) -> Result<(), MotorError> {
        info!("Halting drive");
        self.mixer.reset();
        self.motors.stop()
    }

    fn send(&mut self, (left, right): (f32, f32)) -> Result<WheelCommand, MotorError> {
        self.motors.set_speed(left, right)?;
        Ok(WheelCommand { left, right })
    }

    /// Start the camera unless it is already streaming
    pub fn start_video_stream(&mut self) -> Result<(), PipelineError> {
        if self.pipeline.is_running() {
            debug!("Video stream already running");
            return Ok(());
        }
        self.pipeline.start()?;
        Ok(())
    }

    pub fn stop_video_stream(&mut self) -> Result<(), PipelineError> {
        self.pipeline.stop()
    }

    /// Latest frame, turned upright if the camera is mounted upside down
    pub fn video_frame(&self) -> Option<Arc<Frame>> {
        let frame = self.pipeline.read()?;
        if self.rotate_180 {
            Some(Arc::new(frame.rotate_180()))
        } else {
            Some(frame)
        }
    }

    pub fn video_state(&self) -> PipelineState {
        self.pipeline.state()
    }

    /// Route one semantic input event
    pub fn handle_event(&mut self, event: InputEvent) -> Result<(), RobotError> {
        match event {
            InputEvent::Axis {
                axis: Axis::Forward,
                value,
            } => {
                self.apply_power(value)?;
            }
            InputEvent::Axis {
                axis: Axis::Steer,
                value,
            } => {
                self.apply_steering_power(value)?;
            }
            InputEvent::Button {
                button: Button::Halt,
                pressed: true,
            } => self.halt()?,
            InputEvent::Button {
                button: Button::Stream,
                pressed: true,
            } => {
                if self.pipeline.is_running() {
                    self.stop_video_stream()?;
                } else {
                    self.start_video_stream()?;
                }
            }
            InputEvent::Button { pressed: false, .. } => {}
        }
        Ok(())
    }

    pub fn drive_state(&self) -> DriveState {
        self.mixer.state()
    }
}

impl<M: MotorOutput, C: Camera> Drop for Robot<M, C> {
    fn drop(&mut self) {
        // Don't leave the wheels spinning
        if let Err(e) = self.motors.stop() {
            warn!("Failed to stop motors on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::{Clock, SimCamera};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::{Duration, Instant};

    #[derive(Clone, Default)]
    struct RecordingMotor {
        commands: Rc<RefCell<Vec<WheelCommand>>>,
    }

    impl MotorOutput for RecordingMotor {
        fn set_speed(&mut self, left: f32, right: f32) -> Result<(), MotorError> {
            self.commands.borrow_mut().push(WheelCommand { left, right });
            Ok(())
        }
    }

    struct NoDelay;

    impl Clock for NoDelay {
        fn sleep(&self, _duration: Duration) {}
    }

    fn robot(rotate_180: bool) -> (Robot<RecordingMotor, SimCamera>, RecordingMotor) {
        let config = CameraConfig {
            width: 2,
            height: 1,
            framerate: 500,
            rotate_180,
            ..CameraConfig::default()
        };
        let pipeline = FramePipeline::with_clock(SimCamera::new(), &config, Arc::new(NoDelay));
        let motor = RecordingMotor::default();
        (Robot::with_pipeline(motor.clone(), pipeline, rotate_180), motor)
    }

    fn wait_for_frame(robot: &Robot<RecordingMotor, SimCamera>) -> Arc<Frame> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(frame) = robot.video_frame() {
                return frame;
            }
            assert!(Instant::now() < deadline, "no frame arrived");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_mixer_output_goes_to_motors_verbatim() {
        let (mut robot, motor) = robot(false);
        robot.apply_power(0.5).unwrap();
        let cmd = robot.apply_steering_power(1.0).unwrap();

        let sent = motor.commands.borrow().clone();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], WheelCommand::from((0.5, 0.5)));
        assert_eq!(sent[1], cmd);
        assert!((cmd.right - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_handle_event_routes_axes_and_halt() {
        let (mut robot, motor) = robot(false);
        robot
            .handle_event(InputEvent::axis(Axis::Forward, -0.5))
            .unwrap();
        robot.handle_event(InputEvent::axis(Axis::Steer, 1.0)).unwrap();
        assert_eq!(robot.drive_state().power, -0.5);
        assert!((robot.drive_state().right_trim - 0.4).abs() < 1e-6);

        robot.handle_event(InputEvent::released(Button::Halt)).unwrap();
        assert_eq!(robot.drive_state().power, -0.5);

        robot.handle_event(InputEvent::pressed(Button::Halt)).unwrap();
        assert_eq!(robot.drive_state(), DriveState::default());
        assert_eq!(
            motor.commands.borrow().last().copied(),
            Some(WheelCommand::default())
        );
    }

    #[test]
    fn test_stream_button_toggles_video() {
        let (mut robot, _) = robot(false);
        assert!(robot.video_frame().is_none());

        robot.handle_event(InputEvent::pressed(Button::Stream)).unwrap();
        assert_eq!(robot.video_state(), PipelineState::Running);
        wait_for_frame(&robot);

        robot.handle_event(InputEvent::pressed(Button::Stream)).unwrap();
        assert_eq!(robot.video_state(), PipelineState::Stopped);
        assert!(robot.video_frame().is_none());
    }

    #[test]
    fn test_start_video_twice_is_harmless() {
        let (mut robot, _) = robot(false);
        robot.start_video_stream().unwrap();
        robot.start_video_stream().unwrap();
        assert_eq!(robot.video_state(), PipelineState::Running);
        robot.stop_video_stream().unwrap();
        robot.stop_video_stream().unwrap();
    }

    #[test]
    fn test_video_frame_rotated_when_mounted_upside_down() {
        let (mut robot, _) = robot(true);
        robot.start_video_stream().unwrap();
        let frame = wait_for_frame(&robot);
        // 2x1 test pattern: pixel x holds value x + sequence, so after rotating
        // the right-hand pixel comes first
        let pixel = |x: u64| {
            let v = ((x + frame.sequence) & 0xFF) as u8;
            [v, v / 2, 255 - v]
        };
        assert_eq!(&frame.data[..3], &pixel(1));
        assert_eq!(&frame.data[3..], &pixel(0));
        robot.stop_video_stream().unwrap();
    }

    #[test]
    fn test_drop_stops_motors() {
        let (mut robot, motor) = robot(false);
        robot.apply_power(1.0).unwrap();
        drop(robot);
        assert_eq!(
            motor.commands.borrow().last().copied(),
            Some(WheelCommand::default())
        );
    }
}
