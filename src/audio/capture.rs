/// Blocking microphone capture
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, warn};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use crate::error::{LoggerError, LoggerResult};

/// Extra time past the nominal duration before a capture counts as short.
const CAPTURE_GRACE: Duration = Duration::from_secs(2);

/// Records mono audio, blocking for the whole capture.
pub trait AudioCapture {
    fn record(&mut self, duration_secs: u32, sample_rate: u32) -> LoggerResult<Vec<f64>>;
}

/// Captures mono f32 samples from a cpal input device.
pub struct CpalCapture {
    device_name: String,
}

impl CpalCapture {
    /// `device_name` is either `default` or a substring of the device name.
    pub fn new(device_name: impl Into<String>) -> Self {
        CpalCapture {
            device_name: device_name.into(),
        }
    }

    fn find_device(&self) -> LoggerResult<cpal::Device> {
        let host = cpal::default_host();
        if self.device_name == "default" {
            return host
                .default_input_device()
                .ok_or_else(|| LoggerError::Audio("no default input device".into()));
        }
        let devices = host
            .input_devices()
            .map_err(|e| LoggerError::Audio(format!("failed to list input devices: {}", e)))?;
        for device in devices {
            if let Ok(name) = device.name() {
                if name.contains(&self.device_name) {
                    return Ok(device);
                }
            }
        }
        Err(LoggerError::Audio(format!(
            "no input device matching '{}'",
            self.device_name
        )))
    }
}

impl AudioCapture for CpalCapture {
    fn record(&mut self, duration_secs: u32, sample_rate: u32) -> LoggerResult<Vec<f64>> {
        let device = self.find_device()?;
        debug!(
            "Capturing from {} for {} s at {} Hz",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            duration_secs,
            sample_rate
        );

        let config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let (tx, rx) = mpsc::channel();
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let _ = tx.send(data.to_vec());
                },
                |err| warn!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| LoggerError::Audio(format!("failed to build input stream: {}", e)))?;
        stream
            .play()
            .map_err(|e| LoggerError::Audio(format!("failed to start input stream: {}", e)))?;

        let expected = duration_secs as usize * sample_rate as usize;
        let deadline = Instant::now() + Duration::from_secs(duration_secs.into()) + CAPTURE_GRACE;
        let samples = collect_samples(&rx, expected, deadline);
        // Dropping the stream stops the device
        drop(stream);
        samples
    }
}

/// Gather chunks until `expected` samples arrived, truncating the surplus.
/// Running past `deadline` or losing the stream is a short capture.
fn collect_samples(
    rx: &Receiver<Vec<f32>>,
    expected: usize,
    deadline: Instant,
) -> LoggerResult<Vec<f64>> {
    let mut samples = Vec::with_capacity(expected);
    while samples.len() < expected {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(chunk) => samples.extend(chunk.into_iter().map(f64::from)),
            Err(_) => {
                return Err(LoggerError::Audio(format!(
                    "short capture: {} of {} samples",
                    samples.len(),
                    expected
                )))
            }
        }
    }
    samples.truncate(expected);
    Ok(samples)
}
