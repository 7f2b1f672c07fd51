use std::path::Path;
use std::process::Command;

use crate::config::CpuTempSource;
use crate::error::{LoggerError, LoggerResult};

/// Source of the SoC temperature used for compensation.
pub struct CpuThermometer {
    source: CpuTempSource,
}

impl CpuThermometer {
    pub fn new(source: CpuTempSource) -> Self {
        CpuThermometer { source }
    }

    pub fn read(&self) -> LoggerResult<f64> {
        match &self.source {
            CpuTempSource::ThermalZone(path) => read_thermal_zone(path),
            CpuTempSource::Vcgencmd => {
                let output = Command::new("vcgencmd")
                    .arg("measure_temp")
                    .output()
                    .map_err(|e| LoggerError::sensor("cpu", format!("vcgencmd: {}", e)))?;
                let text = String::from_utf8_lossy(&output.stdout);
                parse_vcgencmd(&text).ok_or_else(|| {
                    LoggerError::sensor("cpu", format!("unexpected vcgencmd output '{}'", text.trim()))
                })
            }
        }
    }
}

/// Thermal zones report millidegrees Celsius.
fn read_thermal_zone(path: &Path) -> LoggerResult<f64> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| LoggerError::sensor("cpu", format!("{}: {}", path.display(), e)))?;
    raw.trim()
        .parse::<f64>()
        .map(|millis| millis / 1000.0)
        .map_err(|e| LoggerError::sensor("cpu", format!("{}: {}", path.display(), e)))
}

/// Parse `temp=48.3'C` into 48.3.
pub fn parse_vcgencmd(output: &str) -> Option<f64> {
    let start = output.find('=')? + 1;
    let end = output.rfind('\'')?;
    output.get(start..end)?.parse().ok()
}
