use log::{debug, info};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::audio::noise::BandSplit;
use crate::error::LoggerError;
use crate::models::Channel;

/// What the panel shows at the end of each cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisplayMode {
    /// Every channel's latest value in a two-column grid
    AllChannels,
    /// History strip for one channel
    Strip(Channel),
}

impl FromStr for DisplayMode {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(DisplayMode::AllChannels);
        }
        Channel::from_name(s)
            .map(DisplayMode::Strip)
            .ok_or_else(|| LoggerError::Config(format!("unknown display mode '{}'", s)))
    }
}

/// Where the CPU temperature used for compensation comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum CpuTempSource {
    ThermalZone(PathBuf),
    Vcgencmd,
}

#[derive(Debug, Clone)]
pub struct SensorPaths {
    pub bme280_dir: PathBuf,
    pub ltr559_dir: PathBuf,
    pub gas_adc_dir: PathBuf,
    pub pms5003_device: PathBuf,
    pub cpu_temp: CpuTempSource,
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub data_dir: PathBuf,
    pub capture_secs: u32,
    pub sample_rate: u32,
    pub bands: BandSplit,
    pub compensation_factor: f64,
    pub proximity_threshold: f64,
    pub settle_pause: Duration,
    pub step_pause: Duration,
    pub idle: Duration,
    pub display_width: u32,
    pub display_height: u32,
    pub display_mode: DisplayMode,
    pub framebuffer: Option<PathBuf>,
    pub backlight: Option<PathBuf>,
    pub audio_device: String,
    pub sensors: SensorPaths,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig {
            data_dir: PathBuf::from("./data"),
            capture_secs: 4,
            sample_rate: 16_000,
            bands: BandSplit::default(),
            compensation_factor: 2.25,
            proximity_threshold: 10.0,
            settle_pause: Duration::from_millis(500),
            step_pause: Duration::from_millis(2000),
            idle: Duration::from_secs(22),
            display_width: 160,
            display_height: 80,
            display_mode: DisplayMode::AllChannels,
            framebuffer: None,
            backlight: None,
            audio_device: "default".to_string(),
            sensors: SensorPaths {
                bme280_dir: PathBuf::from("/sys/bus/iio/devices/iio:device0"),
                ltr559_dir: PathBuf::from("/sys/bus/iio/devices/iio:device1"),
                gas_adc_dir: PathBuf::from("/sys/bus/iio/devices/iio:device2"),
                pms5003_device: PathBuf::from("/dev/ttyAMA0"),
                cpu_temp: CpuTempSource::ThermalZone(PathBuf::from(
                    "/sys/class/thermal/thermal_zone0/temp",
                )),
            },
        }
    }
}

/// Parse an optional environment variable, keeping `default` when unset.
fn env_or<T>(key: &str, default: T) -> Result<T, LoggerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => {
            debug!("{} = '{}'", key, raw);
            raw.trim()
                .parse()
                .map_err(|e| LoggerError::Config(format!("{}='{}': {}", key, raw, e)))
        }
        Err(_) => Ok(default),
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

impl LoggerConfig {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();

        let defaults = LoggerConfig::default();

        let low = env_or("NOISE_LOW", defaults.bands.low)?;
        let mid = env_or("NOISE_MID", defaults.bands.mid)?;
        let high = match env::var("NOISE_HIGH") {
            Ok(_) => Some(env_or("NOISE_HIGH", 0.0)?),
            Err(_) => None,
        };
        let bands = BandSplit {
            noise_floor: env_or("NOISE_FLOOR", defaults.bands.noise_floor)?,
            low,
            mid,
            high,
        };
        if low < 0.0 || mid < 0.0 || low + mid > 1.0 {
            return Err(LoggerError::Config(format!(
                "NOISE_LOW + NOISE_MID must lie within [0, 1], got {} + {}",
                low, mid
            ))
            .into());
        }

        let compensation_factor = env_or("COMPENSATION_FACTOR", defaults.compensation_factor)?;
        if compensation_factor == 0.0 {
            return Err(LoggerError::Config("COMPENSATION_FACTOR must be non-zero".into()).into());
        }

        let cpu_temp = match env::var("CPU_TEMP_SOURCE") {
            Ok(v) if v.trim() == "vcgencmd" => CpuTempSource::Vcgencmd,
            Ok(v) if !v.trim().is_empty() => CpuTempSource::ThermalZone(PathBuf::from(v.trim())),
            _ => defaults.sensors.cpu_temp.clone(),
        };

        let config = LoggerConfig {
            data_dir: env_path("DATA_DIR").unwrap_or(defaults.data_dir),
            capture_secs: env_or("CAPTURE_SECS", defaults.capture_secs)?,
            sample_rate: env_or("SAMPLE_RATE", defaults.sample_rate)?,
            bands,
            compensation_factor,
            proximity_threshold: env_or("PROXIMITY_THRESHOLD", defaults.proximity_threshold)?,
            settle_pause: Duration::from_millis(env_or("SETTLE_PAUSE_MS", 500u64)?),
            step_pause: Duration::from_millis(env_or("STEP_PAUSE_MS", 2000u64)?),
            idle: Duration::from_secs(env_or("IDLE_SECS", 22u64)?),
            display_width: env_or("DISPLAY_WIDTH", defaults.display_width)?,
            display_height: env_or("DISPLAY_HEIGHT", defaults.display_height)?,
            display_mode: env_or("DISPLAY_MODE", defaults.display_mode)?,
            framebuffer: env_path("DISPLAY_FRAMEBUFFER"),
            backlight: env_path("DISPLAY_BACKLIGHT"),
            audio_device: env::var("AUDIO_DEVICE").unwrap_or(defaults.audio_device),
            sensors: SensorPaths {
                bme280_dir: env_path("BME280_DIR").unwrap_or(defaults.sensors.bme280_dir),
                ltr559_dir: env_path("LTR559_DIR").unwrap_or(defaults.sensors.ltr559_dir),
                gas_adc_dir: env_path("GAS_ADC_DIR").unwrap_or(defaults.sensors.gas_adc_dir),
                pms5003_device: env_path("PMS5003_DEVICE")
                    .unwrap_or(defaults.sensors.pms5003_device),
                cpu_temp,
            },
        };

        info!(
            "Capturing {} s of audio at {} Hz, idling {} s between cycles",
            config.capture_secs,
            config.sample_rate,
            config.idle.as_secs()
        );
        info!("Writing records under {}", config.data_dir.display());

        Ok(config)
    }

    /// Number of audio samples per capture: duration x rate.
    pub fn capture_samples(&self) -> usize {
        self.capture_secs as usize * self.sample_rate as usize
    }
}
