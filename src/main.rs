use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use diffdrive_runtime::config::{CameraConfig, DriveConfig, RuntimeConfig};
use diffdrive_runtime::messages::{Axis, InputEvent, RuntimeHealth, RuntimeStatus};
use diffdrive_runtime::motor::{LoggingMotor, MotorOutput};
use diffdrive_runtime::robot::Robot;
use diffdrive_runtime::video::{Camera, PipelineState, SimCamera};
use diffdrive_runtime::{runtime, teleop};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser)]
#[command(name = "diffdrive-runtime", about = "Differential-drive teleop and camera runtime")]
struct Cli {
    /// JSON config file (defaults are used for anything it leaves out)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drive with the keyboard; wheel powers go to the simulated motor output
    Drive,
    /// Stream from the simulated camera and report what a consumer sees
    Stream {
        /// How long to stream for
        #[arg(long, default_value_t = 5)]
        seconds: u64,
        /// How often the consumer reads the latest frame
        #[arg(long, default_value_t = 30)]
        read_hz: u64,
    },
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), BoxError> {
    let config = match &cli.config {
        Some(path) => {
            info!("Loading config from {}", path.display());
            RuntimeConfig::load(path)?
        }
        None => RuntimeConfig::default(),
    };

    match cli.command {
        Command::Drive => drive(&config).await,
        Command::Stream { seconds, read_hz } => {
            tokio::task::spawn_blocking(move || stream(&config, seconds, read_hz)).await?
        }
    }
}

async fn drive(config: &RuntimeConfig) -> Result<(), BoxError> {
    let (tx, rx) = mpsc::channel(64);
    let (status_tx, mut status_rx) = watch::channel(RuntimeStatus::default());

    let keyboard = tokio::task::spawn_blocking(move || teleop::run_keyboard(tx));

    // Report health transitions, wheel powers only at debug
    tokio::spawn(async move {
        let mut health = RuntimeHealth::CmdStale;
        while status_rx.changed().await.is_ok() {
            let status = *status_rx.borrow_and_update();
            if status.health != health {
                info!("Health: {:?}", status.health);
                health = status.health;
            }
            debug!(
                "Wheels: left={:.3}, right={:.3}",
                status.wheels.left, status.wheels.right
            );
        }
    });

    let mut motor = LoggingMotor::new();
    drive_with(&config.drive, rx, keyboard, &mut motor, &status_tx).await?;
    info!("Sent {} wheel commands", motor.commands());
    Ok(())
}

/// Run the drive loop, then wait for the input source to wind down
///
/// The input thread is joined even when the loop fails, so the keyboard
/// source gets to leave raw mode before the error is reported.
async fn drive_with<M: MotorOutput>(
    config: &DriveConfig,
    inputs: mpsc::Receiver<InputEvent>,
    input_source: JoinHandle<std::io::Result<()>>,
    motors: &mut M,
    status: &watch::Sender<RuntimeStatus>,
) -> Result<(), BoxError> {
    // `run` owns the receiver, so the source sees a closed channel once it returns
    let result = runtime::run(config, inputs, motors, status).await;
    let joined = input_source.await;
    result?;
    joined??;
    Ok(())
}

fn stream(config: &RuntimeConfig, seconds: u64, read_hz: u64) -> Result<(), BoxError> {
    let mut robot = Robot::new(LoggingMotor::new(), SimCamera::new(), &config.camera);
    let period = Duration::from_millis(1000 / read_hz.clamp(1, 1000));
    consume_stream(&mut robot, Duration::from_secs(seconds), period)
}

/// Read the latest frame every `period` until `duration` is up
///
/// A camera fault ends the stream early and is returned as an error.
fn consume_stream<M: MotorOutput, C: Camera>(
    robot: &mut Robot<M, C>,
    duration: Duration,
    period: Duration,
) -> Result<(), BoxError> {
    robot.start_video_stream()?;

    let deadline = Instant::now() + duration;
    let (mut fresh, mut repeated, mut empty) = (0u64, 0u64, 0u64);
    let mut last_sequence = None;
    let mut fault = None;

    while Instant::now() < deadline {
        match robot.video_frame() {
            Some(frame) if Some(frame.sequence) == last_sequence => repeated += 1,
            Some(frame) => {
                fresh += 1;
                last_sequence = Some(frame.sequence);
            }
            None => empty += 1,
        }
        if let PipelineState::Faulted(reason) = robot.video_state() {
            error!("Camera faulted: {}", reason);
            fault = Some(reason);
            break;
        }
        std::thread::sleep(period);
    }

    robot.stop_video_stream()?;
    info!(
        "Consumer saw {} new frames, {} repeats, {} empty reads",
        fresh, repeated, empty
    );
    match fault {
        Some(reason) => Err(format!("camera faulted: {}", reason).into()),
        None => Ok(()),
    }
}
