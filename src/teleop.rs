// Keyboard teleop: W/S drive, A/D steer, R/F speed, Space halt, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::info;

use crate::messages::{Axis, Button, InputEvent};

const SPEEDS: [f32; 3] = [0.3, 0.6, 1.0]; // forward power per level
const INPUT_TIMEOUT: Duration = Duration::from_millis(100); // Reset axes after this much time with no input
const POLL_PERIOD: Duration = Duration::from_millis(20);

/// What a single key press does
#[derive(Debug, Clone, Copy, PartialEq)]
enum KeyAction {
    Forward(f32),
    Steer(f32),
    SpeedUp,
    SpeedDown,
    Halt,
    Quit,
}

fn map_key(code: KeyCode, speed: f32) -> Option<KeyAction> {
    match code {
        KeyCode::Char('w') => Some(KeyAction::Forward(speed)),
        KeyCode::Char('s') => Some(KeyAction::Forward(-speed)),
        KeyCode::Char('a') => Some(KeyAction::Steer(-1.0)),
        KeyCode::Char('d') => Some(KeyAction::Steer(1.0)),
        KeyCode::Char('r') => Some(KeyAction::SpeedUp),
        KeyCode::Char('f') => Some(KeyAction::SpeedDown),
        KeyCode::Char(' ') => Some(KeyAction::Halt),
        KeyCode::Char('q') | KeyCode::Esc => Some(KeyAction::Quit),
        _ => None,
    }
}

/// Axis state held between key presses
#[derive(Debug, Default)]
struct TeleopState {
    speed_idx: usize,
    forward: f32,
    steer: f32,
}

impl TeleopState {
    /// Apply an action; returns the extra event it emits, if any
    fn apply(&mut self, action: KeyAction) -> Option<InputEvent> {
        match action {
            KeyAction::Forward(power) => self.forward = power,
            KeyAction::Steer(steer) => self.steer = steer,
            KeyAction::SpeedUp => {
                self.speed_idx = (self.speed_idx + 1).min(SPEEDS.len() - 1);
                print_speed(self.speed_idx);
            }
            KeyAction::SpeedDown => {
                self.speed_idx = self.speed_idx.saturating_sub(1);
                print_speed(self.speed_idx);
            }
            KeyAction::Halt => {
                self.forward = 0.0;
                self.steer = 0.0;
                return Some(InputEvent::pressed(Button::Halt));
            }
            KeyAction::Quit => {}
        }
        None
    }

    fn speed(&self) -> f32 {
        SPEEDS[self.speed_idx]
    }

    fn axis_events(&self) -> [InputEvent; 2] {
        [
            InputEvent::axis(Axis::Forward, self.forward),
            InputEvent::axis(Axis::Steer, self.steer),
        ]
    }
}

/// Read the keyboard until quit, sending axis events every poll period
///
/// Blocking; run it on its own thread. Returns when the user quits or the
/// receiving runtime goes away.
pub fn run_keyboard(events: mpsc::Sender<InputEvent>) -> std::io::Result<()> {
    info!("Controls: W/S=drive, A/D=steer, R/F=speed, Space=halt, Q=quit");
    print_speed(0);

    enable_raw_mode()?;
    let result = keyboard_loop(&events);
    disable_raw_mode()?;

    result
}

fn keyboard_loop(events: &mpsc::Sender<InputEvent>) -> std::io::Result<()> {
    let mut state = TeleopState::default();
    let mut last_movement_input = Instant::now();

    loop {
        if event::poll(POLL_PERIOD)? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                if let Some(action) = map_key(code, state.speed()).filter(|_| pressed) {
                    if action == KeyAction::Quit {
                        break;
                    }
                    if matches!(action, KeyAction::Forward(_) | KeyAction::Steer(_)) {
                        last_movement_input = Instant::now();
                    }
                    if let Some(event) = state.apply(action) {
                        if events.blocking_send(event).is_err() {
                            break;
                        }
                    }
                }
            }
        }

        // Reset axes if no movement input for INPUT_TIMEOUT
        if last_movement_input.elapsed() > INPUT_TIMEOUT {
            state.forward = 0.0;
            state.steer = 0.0;
        }

        // Always send at the poll rate so the runtime watchdog stays fed
        for event in state.axis_events() {
            if events.blocking_send(event).is_err() {
                return Ok(());
            }
        }
    }

    Ok(())
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {}", label);
}
