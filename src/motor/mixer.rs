// Differential-drive power mixer
// Combines one forward power and one steering power into left/right wheel powers.

use tracing::warn;

use crate::config::STEERING_LIMIT;

/// Persistent mixer state
///
/// At most one of `left_trim` / `right_trim` is non-zero: a turn either slows
/// one wheel or speeds up the other, never both.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriveState {
    /// Net forward/backward command in [-1, 1]
    pub power: f32,
    /// Per-wheel steering offsets in [-STEERING_LIMIT, STEERING_LIMIT]
    pub left_trim: f32,
    pub right_trim: f32,
}

/// Differential-drive mixer
///
/// Not synchronized. Drive it from one control loop, or wrap it in a mutex
/// when several input sources share it.
#[derive(Debug, Default)]
pub struct PowerMixer {
    state: DriveState,
}

impl PowerMixer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DriveState {
        self.state
    }

    /// Store forward power (clamped to [-1, 1]) and return the new wheel powers
    ///
    /// Trims are left as they are; they were computed against the power in
    /// place when steering was last set.
    pub fn set_forward_power(&mut self, power: f32) -> (f32, f32) {
        self.state.power = finite_or_zero(power, "forward power").clamp(-1.0, 1.0);
        self.compute_wheel_powers()
    }

    /// Apply a steering command and return the new wheel powers
    ///
    /// # Arguments
    /// * `steer` - Steering in [-1, 1] (positive = right, negative = left, zero = straight).
    ///   Out-of-range values are clamped, then compressed to [-STEERING_LIMIT, STEERING_LIMIT].
    ///
    /// When |power| covers the steering magnitude the inner wheel is slowed,
    /// otherwise the outer wheel is boosted. Signs flip when reversing so that
    /// steering right always turns the heading right.
    pub fn set_steering_power(&mut self, steer: f32) -> (f32, f32) {
        let steer = finite_or_zero(steer, "steering power").clamp(-1.0, 1.0);
        let steer = remap(steer, -1.0, 1.0, -STEERING_LIMIT, STEERING_LIMIT);

        let power = self.state.power;
        let is_forward = power >= 0.0;
        let can_slow = power.abs() - steer.abs() >= 0.0;

        let (left, right) = if steer > 0.0 {
            if can_slow {
                // slow the right wheel
                (0.0, if is_forward { -steer } else { steer })
            } else {
                // speed up the left wheel
                (if is_forward { steer } else { -steer }, 0.0)
            }
        } else if steer < 0.0 {
            if can_slow {
                // slow the left wheel
                (if is_forward { steer } else { -steer }, 0.0)
            } else {
                // speed up the right wheel
                (0.0, if is_forward { -steer } else { steer })
            }
        } else {
            (0.0, 0.0)
        };

        self.state.left_trim = left;
        self.state.right_trim = right;
        self.compute_wheel_powers()
    }

    /// Wheel powers as `(power + left_trim, power + right_trim)`
    ///
    /// The sum is not clamped. Trims set while nearly stationary stay in place
    /// when power is raised afterwards, so a wheel can reach up to
    /// 1 + STEERING_LIMIT in magnitude.
    pub fn compute_wheel_powers(&self) -> (f32, f32) {
        (
            self.state.power + self.state.left_trim,
            self.state.power + self.state.right_trim,
        )
    }

    /// Zero power and steering
    pub fn reset(&mut self) -> (f32, f32) {
        self.state = DriveState::default();
        self.compute_wheel_powers()
    }
}

fn finite_or_zero(value: f32, what: &str) -> f32 {
    if value.is_finite() {
        value
    } else {
        warn!("Ignoring non-finite {}: {}", what, value);
        0.0
    }
}

/// Linearly map `value` from [old_min, old_max] onto [new_min, new_max]
///
/// # Panics
/// If `old_min == old_max`.
pub fn remap(value: f32, old_min: f32, old_max: f32, new_min: f32, new_max: f32) -> f32 {
    assert!(
        old_min != old_max,
        "remap source range is empty ({} == {})",
        old_min,
        old_max
    );
    ((value - old_min) * (new_max - new_min)) / (old_max - old_min) + new_min
}
