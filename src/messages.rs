// Message types flowing between input sources, the runtime and the motors

use serde::{Deserialize, Serialize};

/// Semantic axis names, already decoded from the raw device
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Forward,
    Steer,
}

/// Semantic button names
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    Halt,
    Stream,
}

// Input from teleop (keyboard, joystick, GUI) -> runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputEvent {
    Axis { axis: Axis, value: f32 },
    Button { button: Button, pressed: bool },
}

impl InputEvent {
    /// Axis event with the value clamped to [-1, 1]
    pub fn axis(axis: Axis, value: f32) -> Self {
        Self::Axis {
            axis,
            value: value.clamp(-1.0, 1.0),
        }
    }

    pub fn pressed(button: Button) -> Self {
        Self::Button {
            button,
            pressed: true,
        }
    }

    pub fn released(button: Button) -> Self {
        Self::Button {
            button,
            pressed: false,
        }
    }
}

/// Normalize a raw signed 16-bit joystick reading to [-1, 1]
pub fn axis_from_raw(raw: i16) -> f32 {
    (raw as f32 / i16::MAX as f32).clamp(-1.0, 1.0)
}

// Output from runtime -> motors
// Default is both wheels stopped
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct WheelCommand {
    pub left: f32,
    pub right: f32,
}

impl From<(f32, f32)> for WheelCommand {
    fn from((left, right): (f32, f32)) -> Self {
        Self { left, right }
    }
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}

/// Snapshot published by the runtime every tick
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RuntimeStatus {
    pub health: RuntimeHealth,
    pub wheels: WheelCommand,
}

impl Default for RuntimeStatus {
    fn default() -> Self {
        Self {
            health: RuntimeHealth::CmdStale,
            wheels: WheelCommand::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_constructor_clamps() {
        assert_eq!(
            InputEvent::axis(Axis::Forward, 3.0),
            InputEvent::Axis {
                axis: Axis::Forward,
                value: 1.0
            }
        );
        assert_eq!(
            InputEvent::axis(Axis::Steer, -1.5),
            InputEvent::Axis {
                axis: Axis::Steer,
                value: -1.0
            }
        );
    }

    #[test]
    fn test_axis_from_raw() {
        assert_eq!(axis_from_raw(0), 0.0);
        assert_eq!(axis_from_raw(i16::MAX), 1.0);
        // i16::MIN is one count past full scale
        assert_eq!(axis_from_raw(i16::MIN), -1.0);
        assert!((axis_from_raw(16384) - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_string(&InputEvent::pressed(Button::Halt)).unwrap();
        assert_eq!(json, r#"{"kind":"button","button":"halt","pressed":true}"#);

        let event: InputEvent =
            serde_json::from_str(r#"{"kind":"axis","axis":"steer","value":-0.25}"#).unwrap();
        assert_eq!(event, InputEvent::axis(Axis::Steer, -0.25));

        let health = serde_json::to_string(&RuntimeHealth::CmdStale).unwrap();
        assert_eq!(health, r#""cmd_stale""#);
    }
}
