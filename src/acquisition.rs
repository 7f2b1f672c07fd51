/// The fixed-cadence sampling loop: sensors, audio, display, log file
use log::{debug, info, warn};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::time::sleep;

use crate::audio::noise;
use crate::audio::AudioCapture;
use crate::config::{DisplayMode, LoggerConfig};
use crate::display::{DisplayDevice, Renderer};
use crate::error::LoggerResult;
use crate::models::{Channel, Snapshot};
use crate::sensors::{self, CpuTemperatureAverage, ReadSettings, SensorHub};
use crate::storage::RecordWriter;
use crate::utils::unix_millis;

const BACKLIGHT_ON: u8 = 5;
const BACKLIGHT_OFF: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    ReadingSensors,
    CapturingAudio,
    AnalyzingAudio,
    Rendering,
    Persisting,
    Sleeping,
    Stopped,
}

/// How a single cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A complete row was appended to the log
    Persisted,
    /// A sensor failed; nothing was written
    Skipped,
    /// Shutdown was requested; the in-flight row (if any) was dropped
    Stopped,
}

/// Resolves once the shutdown flag is set. If the sender goes away without
/// setting it, this never resolves.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub struct AcquisitionLoop<S, A, D>
where
    S: SensorHub,
    A: AudioCapture,
    D: DisplayDevice,
{
    hub: S,
    audio: A,
    renderer: Renderer<D>,
    writer: RecordWriter,
    cpu_temps: CpuTemperatureAverage,
    config: LoggerConfig,
    shutdown: watch::Receiver<bool>,
    state: CycleState,
}

impl<S, A, D> AcquisitionLoop<S, A, D>
where
    S: SensorHub,
    A: AudioCapture,
    D: DisplayDevice,
{
    /// Seeds the CPU temperature average with one reading taken now.
    pub fn new(
        config: LoggerConfig,
        mut hub: S,
        audio: A,
        display: D,
        writer: RecordWriter,
        shutdown: watch::Receiver<bool>,
    ) -> LoggerResult<Self> {
        let cpu_temps = CpuTemperatureAverage::seeded(hub.read_cpu_temperature()?);
        let renderer = Renderer::new(display, config.display_width, config.display_height);

        Ok(AcquisitionLoop {
            hub,
            audio,
            renderer,
            writer,
            cpu_temps,
            config,
            shutdown,
            state: CycleState::Idle,
        })
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    #[cfg(test)]
    pub fn renderer(&self) -> &Renderer<D> {
        &self.renderer
    }

    pub fn writer(&self) -> &RecordWriter {
        &self.writer
    }

    fn interrupted(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Move to `next` unless shutdown was requested, in which case the loop
    /// stops here and `false` is returned.
    fn transition(&mut self, next: CycleState) -> bool {
        if self.interrupted() {
            info!("Shutdown requested while {:?}", self.state);
            self.state = CycleState::Stopped;
            return false;
        }
        debug!("{:?} -> {:?}", self.state, next);
        self.state = next;
        true
    }

    /// Sleep for `duration`, waking early on shutdown. Returns `false` if the
    /// loop should stop.
    async fn pause(&mut self, duration: Duration) -> bool {
        let keep_going = if duration.is_zero() {
            !self.interrupted()
        } else {
            let mut shutdown = self.shutdown.clone();
            tokio::select! {
                _ = sleep(duration) => !self.interrupted(),
                _ = wait_for_shutdown(&mut shutdown) => false,
            }
        };
        if !keep_going {
            self.state = CycleState::Stopped;
        }
        keep_going
    }

    /// Store a value in the snapshot and the channel's display history.
    fn record(&mut self, snapshot: &mut Snapshot, channel: Channel, value: f64) {
        info!("{}", channel.describe(value));
        snapshot.set(channel, value);
        self.renderer.push(channel, value);
    }

    /// Run one cycle from sensor reads through to the appended row.
    pub async fn run_cycle(&mut self) -> LoggerResult<CycleOutcome> {
        let mut snapshot = Snapshot::new();

        if !self.transition(CycleState::ReadingSensors) {
            return Ok(CycleOutcome::Stopped);
        }
        let settings = ReadSettings {
            compensation_factor: self.config.compensation_factor,
            proximity_threshold: self.config.proximity_threshold,
        };
        let readings = match sensors::read_all(&mut self.hub, &mut self.cpu_temps, &settings) {
            Ok(readings) => readings,
            Err(e) if e.is_recoverable() => {
                warn!("Skipping cycle: {}", e);
                return Ok(CycleOutcome::Skipped);
            }
            Err(e) => return Err(e),
        };
        for (channel, value) in readings {
            self.record(&mut snapshot, channel, value);
        }

        self.renderer.set_backlight(BACKLIGHT_ON)?;
        self.renderer.info("Recording audio...", "")?;

        if !self.transition(CycleState::CapturingAudio) {
            return Ok(CycleOutcome::Stopped);
        }
        info!(
            "Recording for {} seconds with sample rate {}",
            self.config.capture_secs, self.config.sample_rate
        );
        // Blocks the whole runtime; a shutdown request is seen once this returns
        let samples = match self
            .audio
            .record(self.config.capture_secs, self.config.sample_rate)
        {
            Ok(samples) => samples,
            Err(e) if self.interrupted() => {
                info!("Capture ended by shutdown request: {}", e);
                self.state = CycleState::Stopped;
                return Ok(CycleOutcome::Stopped);
            }
            Err(e) => return Err(e),
        };
        if samples.len() != self.config.capture_samples() {
            warn!(
                "Capture returned {} samples, expected {}",
                samples.len(),
                self.config.capture_samples()
            );
        }

        if !self.transition(CycleState::AnalyzingAudio) {
            return Ok(CycleOutcome::Stopped);
        }
        let profile = noise::profile(
            &samples,
            self.config.sample_rate as usize,
            &self.config.bands,
        );
        debug!("Noise profile: {:?}", profile);
        snapshot.captured_at = OffsetDateTime::now_utc();
        let millis = unix_millis(&snapshot.captured_at);
        self.record(&mut snapshot, Channel::Timestamp, millis);
        self.record(&mut snapshot, Channel::MicAmpLow, profile.amp_low);
        self.record(&mut snapshot, Channel::MicAmpMid, profile.amp_mid);
        self.record(&mut snapshot, Channel::MicAmpHigh, profile.amp_high);
        self.record(&mut snapshot, Channel::MicAmpTotal, profile.amp_total);

        if !self.transition(CycleState::Rendering) {
            return Ok(CycleOutcome::Stopped);
        }
        self.renderer
            .info("Finished recording and analysing audio.", "")?;
        if !self.pause(self.config.settle_pause).await {
            return Ok(CycleOutcome::Stopped);
        }
        match self.config.display_mode {
            DisplayMode::AllChannels => self.renderer.all_channels()?,
            DisplayMode::Strip(channel) => self.renderer.strip(channel)?,
        }
        if !self.pause(self.config.step_pause).await {
            return Ok(CycleOutcome::Stopped);
        }

        if !self.transition(CycleState::Persisting) {
            return Ok(CycleOutcome::Stopped);
        }
        let record = snapshot.complete()?;
        self.renderer.info("Opening file...", "")?;
        self.writer.append(&record)?;
        let path = self.writer.path().display().to_string();
        self.renderer.info("Saved to file:", &path)?;
        if !self.pause(self.config.step_pause).await {
            return Ok(CycleOutcome::Stopped);
        }

        Ok(CycleOutcome::Persisted)
    }

    /// Cycle until shutdown is requested. Sensor failures skip a cycle; any
    /// other error ends the loop.
    pub async fn run(&mut self) -> LoggerResult<()> {
        info!("Starting environmental data collection");
        let mut rows = 0u64;

        loop {
            match self.run_cycle().await? {
                CycleOutcome::Persisted => {
                    rows += 1;
                    info!("Wrote row {} to {}", rows, self.writer.path().display());
                }
                CycleOutcome::Skipped => {}
                CycleOutcome::Stopped => break,
            }

            if !self.transition(CycleState::Sleeping) {
                break;
            }
            self.renderer.set_backlight(BACKLIGHT_OFF)?;
            debug!("Sleeping {} s until the next cycle", self.config.idle.as_secs());
            if !self.pause(self.config.idle).await {
                break;
            }
        }

        self.state = CycleState::Stopped;
        info!("Acquisition stopped after {} rows", rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::device::stub::RecordingDisplay;
    use crate::error::LoggerError;
    use crate::sensors::stub::FixedSensors;
    use crate::sensors::LIGHT_PLACEHOLDER;
    use std::f64::consts::PI;
    use std::fs;
    use std::path::Path;

    /// Produces a 2 kHz tone; optionally requests shutdown on the n-th capture.
    struct ScriptedCapture {
        calls: usize,
        interrupt_on_call: Option<usize>,
        shutdown: Option<watch::Sender<bool>>,
    }

    impl ScriptedCapture {
        fn tone() -> Self {
            ScriptedCapture {
                calls: 0,
                interrupt_on_call: None,
                shutdown: None,
            }
        }

        fn interrupting(on_call: usize, shutdown: watch::Sender<bool>) -> Self {
            ScriptedCapture {
                calls: 0,
                interrupt_on_call: Some(on_call),
                shutdown: Some(shutdown),
            }
        }
    }

    impl AudioCapture for ScriptedCapture {
        fn record(&mut self, duration_secs: u32, sample_rate: u32) -> LoggerResult<Vec<f64>> {
            self.calls += 1;
            if self.interrupt_on_call == Some(self.calls) {
                if let Some(tx) = &self.shutdown {
                    let _ = tx.send(true);
                }
            }
            let len = duration_secs as usize * sample_rate as usize;
            Ok((0..len)
                .map(|i| 0.3 * (2.0 * PI * 2000.0 * i as f64 / sample_rate as f64).sin())
                .collect())
        }
    }

    struct BrokenCapture;

    impl AudioCapture for BrokenCapture {
        fn record(&mut self, _: u32, _: u32) -> LoggerResult<Vec<f64>> {
            Err(LoggerError::Audio("no capture device".into()))
        }
    }

    /// Requests shutdown and then fails, like a capture cut short by Ctrl+C.
    struct CutShortCapture {
        shutdown: watch::Sender<bool>,
    }

    impl AudioCapture for CutShortCapture {
        fn record(&mut self, _: u32, _: u32) -> LoggerResult<Vec<f64>> {
            let _ = self.shutdown.send(true);
            Err(LoggerError::Audio("short capture: 1200 of 16000 samples".into()))
        }
    }

    fn test_config(data_dir: &Path) -> LoggerConfig {
        LoggerConfig {
            data_dir: data_dir.to_path_buf(),
            capture_secs: 1,
            settle_pause: Duration::ZERO,
            step_pause: Duration::ZERO,
            idle: Duration::ZERO,
            ..LoggerConfig::default()
        }
    }

    fn build<S: SensorHub, A: AudioCapture>(
        data_dir: &Path,
        hub: S,
        audio: A,
        shutdown: watch::Receiver<bool>,
    ) -> AcquisitionLoop<S, A, RecordingDisplay> {
        let config = test_config(data_dir);
        let writer = RecordWriter::initialize(&config.data_dir, &OffsetDateTime::now_utc()).unwrap();
        AcquisitionLoop::new(config, hub, audio, RecordingDisplay::default(), writer, shutdown)
            .unwrap()
    }

    fn log_lines(writer: &RecordWriter) -> Vec<String> {
        fs::read_to_string(writer.path())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn one_cycle_writes_header_and_one_complete_row() {
        let dir = tempfile::tempdir().unwrap();
        let (_tx, rx) = watch::channel(false);
        let hub = FixedSensors {
            proximity: 12.0,
            ..FixedSensors::default()
        };
        let mut acquisition = build(dir.path(), hub, ScriptedCapture::tone(), rx);

        assert_eq!(acquisition.state(), CycleState::Idle);
        assert_eq!(acquisition.run_cycle().await.unwrap(), CycleOutcome::Persisted);
        assert_eq!(acquisition.state(), CycleState::Persisting);

        let lines = log_lines(acquisition.writer());
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("temperature,pressure,humidity,light,"));

        let fields: Vec<&str> = lines[1].split(',').collect();
        assert_eq!(fields.len(), 16);
        let values: Vec<f64> = fields[..15].iter().map(|f| f.parse().unwrap()).collect();
        assert_eq!(values[Channel::Temperature.index()], 24.0);
        assert_eq!(values[Channel::Pressure.index()], 1008.5);
        assert_eq!(values[Channel::Light.index()], LIGHT_PLACEHOLDER);
        assert_eq!(values[Channel::Oxidised.index()], 20.0);
        assert_eq!(values[Channel::Pm25.index()], 5.0);
        assert!(values[Channel::Timestamp.index()] > 1.6e12);

        let low = values[Channel::MicAmpLow.index()];
        let mid = values[Channel::MicAmpMid.index()];
        let high = values[Channel::MicAmpHigh.index()];
        assert!(mid > low && mid > high);
        let total = values[Channel::MicAmpTotal.index()];
        assert!((total - (low + mid + high) / 3.0).abs() < 1e-9);

        // Human-readable time is the last column
        assert_eq!(fields[15].split(':').count(), 6);
    }

    #[tokio::test]
    async fn uncovered_proximity_reads_real_light() {
        let dir = tempfile::tempdir().unwrap();
        let (_tx, rx) = watch::channel(false);
        let mut acquisition = build(dir.path(), FixedSensors::default(), ScriptedCapture::tone(), rx);
        acquisition.run_cycle().await.unwrap();
        assert_eq!(
            acquisition.renderer().window(Channel::Light).latest(),
            Some(250.0)
        );
    }

    #[tokio::test]
    async fn interrupt_during_capture_drops_the_row() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = watch::channel(false);
        let audio = ScriptedCapture::interrupting(2, tx);
        let mut acquisition = build(dir.path(), FixedSensors::default(), audio, rx);

        assert_eq!(acquisition.run_cycle().await.unwrap(), CycleOutcome::Persisted);
        let before = log_lines(acquisition.writer()).len();

        assert_eq!(acquisition.run_cycle().await.unwrap(), CycleOutcome::Stopped);
        assert_eq!(acquisition.state(), CycleState::Stopped);
        assert_eq!(log_lines(acquisition.writer()).len(), before);
    }

    #[tokio::test]
    async fn run_stops_on_interrupt_and_darkens_panel_between_cycles() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = watch::channel(false);
        let audio = ScriptedCapture::interrupting(3, tx);
        let mut acquisition = build(dir.path(), FixedSensors::default(), audio, rx);

        acquisition.run().await.unwrap();

        assert_eq!(acquisition.state(), CycleState::Stopped);
        assert_eq!(log_lines(acquisition.writer()).len(), 3);
        let backlight = &acquisition.renderer().device().backlight;
        assert_eq!(
            backlight,
            &vec![BACKLIGHT_ON, BACKLIGHT_OFF, BACKLIGHT_ON, BACKLIGHT_OFF, BACKLIGHT_ON]
        );
    }

    #[tokio::test]
    async fn interrupt_before_cycle_reads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = watch::channel(false);
        let mut acquisition = build(dir.path(), FixedSensors::default(), ScriptedCapture::tone(), rx);
        tx.send(true).unwrap();

        assert_eq!(acquisition.run_cycle().await.unwrap(), CycleOutcome::Stopped);
        assert!(acquisition.renderer().device().frames.is_empty());
        assert_eq!(log_lines(acquisition.writer()).len(), 1);
    }

    #[tokio::test]
    async fn sensor_failure_skips_the_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let (_tx, rx) = watch::channel(false);
        let hub = FixedSensors {
            fail_particulates: true,
            ..FixedSensors::default()
        };
        let mut acquisition = build(dir.path(), hub, ScriptedCapture::tone(), rx);

        assert_eq!(acquisition.run_cycle().await.unwrap(), CycleOutcome::Skipped);
        assert_eq!(log_lines(acquisition.writer()).len(), 1);
    }

    #[tokio::test]
    async fn audio_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (_tx, rx) = watch::channel(false);
        let mut acquisition = build(dir.path(), FixedSensors::default(), BrokenCapture, rx);

        assert!(matches!(
            acquisition.run().await,
            Err(LoggerError::Audio(_))
        ));
        assert_eq!(log_lines(acquisition.writer()).len(), 1);
    }

    #[tokio::test]
    async fn capture_failing_after_interrupt_stops_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = watch::channel(false);
        let audio = CutShortCapture { shutdown: tx };
        let mut acquisition = build(dir.path(), FixedSensors::default(), audio, rx);

        acquisition.run().await.unwrap();

        assert_eq!(acquisition.state(), CycleState::Stopped);
        assert_eq!(log_lines(acquisition.writer()).len(), 1);
    }

    #[tokio::test]
    async fn strip_mode_renders_configured_channel() {
        let dir = tempfile::tempdir().unwrap();
        let (_tx, rx) = watch::channel(false);
        let mut acquisition = build(dir.path(), FixedSensors::default(), ScriptedCapture::tone(), rx);
        acquisition.config.display_mode = DisplayMode::Strip(Channel::Humidity);

        acquisition.run_cycle().await.unwrap();
        // Info, info, strip, info, info
        let frames = &acquisition.renderer().device().frames;
        assert_eq!(frames.len(), 5);
        assert_eq!(
            frames[2].pixel(0, 22),
            Some(embedded_graphics::pixelcolor::Rgb888::new(255, 255, 255))
        );
    }
}
