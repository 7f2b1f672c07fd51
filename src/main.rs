mod acquisition;
mod audio;
mod config;
mod display;
mod error;
mod models;
mod sensors;
mod storage;
mod utils;

use log::{error, info};
use time::OffsetDateTime;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;

use acquisition::AcquisitionLoop;
use audio::CpalCapture;
use config::LoggerConfig;
use display::{DisplayDevice, FramebufferDisplay, HeadlessDisplay};
use error::LoggerResult;
use sensors::IioSensorHub;
use storage::RecordWriter;

async fn main_loop<D: DisplayDevice>(
    config: LoggerConfig,
    display: D,
    writer: RecordWriter,
    shutdown: watch::Receiver<bool>,
) -> LoggerResult<()> {
    let hub = IioSensorHub::new(&config.sensors);
    let audio = CpalCapture::new(config.audio_device.clone());
    let mut acquisition = AcquisitionLoop::new(config, hub, audio, display, writer, shutdown)?;
    acquisition.run().await?;
    info!(
        "Loop {:?}; records are in {}",
        acquisition.state(),
        acquisition.writer().path().display()
    );
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    info!("enviro-logger: logs every sensor of the board to a CSV file. Press Ctrl+C to exit.");

    // Load configuration
    let config = match LoggerConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    // Fresh log file for this run; failing to prepare it is fatal
    let writer = match RecordWriter::initialize(&config.data_dir, &OffsetDateTime::now_utc()) {
        Ok(writer) => writer,
        Err(e) => {
            error!("Failed to create log file: {}", e);
            return Err(e.into());
        }
    };

    // Handle Ctrl+C and SIGTERM gracefully. Listeners are registered before the
    // first cycle so an early interrupt is not lost.
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::select! {
            _ = interrupt.recv() => {}
            _ = terminate.recv() => {}
        }
        info!("Shutdown requested, finishing at the next step boundary");
        let _ = tx.send(true);
    });

    let result = match config.framebuffer.clone() {
        Some(fb) => {
            let display = FramebufferDisplay::new(fb, config.backlight.clone());
            main_loop(config, display, writer, rx).await
        }
        None => {
            info!("No DISPLAY_FRAMEBUFFER set, running headless");
            main_loop(config, HeadlessDisplay, writer, rx).await
        }
    };

    match result {
        Ok(()) => {
            info!("Program terminated by user. Exiting gracefully.");
            Ok(())
        }
        Err(e) => {
            error!("Fatal error: {}", e);
            Err(e.into())
        }
    }
}
