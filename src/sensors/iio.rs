/// Sensor hub backed by Linux IIO sysfs attributes
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

use super::cpu::CpuThermometer;
use super::pms5003::Pms5003;
use super::SensorHub;
use crate::config::SensorPaths;
use crate::error::{LoggerError, LoggerResult};
use crate::models::{GasReading, Particulates};

/// Supply voltage of the gas sensor's divider
const GAS_SUPPLY_VOLTS: f64 = 3.3;
/// Load resistor in series with each gas sensing element, in ohms
const GAS_LOAD_OHMS: f64 = 56_000.0;

/// Read a single numeric sysfs attribute.
fn read_attr(dir: &Path, name: &str, source_name: &'static str) -> LoggerResult<f64> {
    let path = dir.join(name);
    let raw = fs::read_to_string(&path)
        .map_err(|e| LoggerError::sensor(source_name, format!("{}: {}", path.display(), e)))?;
    let value = raw.trim().parse::<f64>().map_err(|e| {
        LoggerError::sensor(
            source_name,
            format!("{}: '{}': {}", path.display(), raw.trim(), e),
        )
    })?;
    debug!("{} = {}", path.display(), value);
    Ok(value)
}

/// Sensing element resistance from the voltage across it.
pub fn gas_resistance(volts: f64) -> f64 {
    volts * GAS_LOAD_OHMS / (GAS_SUPPLY_VOLTS - volts)
}

/// BME280, LTR559 and the gas ADC as exposed by their kernel drivers, plus the
/// PMS5003 serial port and the CPU thermometer.
pub struct IioSensorHub {
    bme280_dir: PathBuf,
    ltr559_dir: PathBuf,
    gas_adc_dir: PathBuf,
    particulates: Pms5003,
    cpu: CpuThermometer,
}

impl IioSensorHub {
    pub fn new(paths: &SensorPaths) -> Self {
        IioSensorHub {
            bme280_dir: paths.bme280_dir.clone(),
            ltr559_dir: paths.ltr559_dir.clone(),
            gas_adc_dir: paths.gas_adc_dir.clone(),
            particulates: Pms5003::new(paths.pms5003_device.clone()),
            cpu: CpuThermometer::new(paths.cpu_temp.clone()),
        }
    }

    fn gas_channel(&self, index: u8) -> LoggerResult<f64> {
        let raw = read_attr(&self.gas_adc_dir, &format!("in_voltage{}_raw", index), "gas")?;
        let scale = read_attr(&self.gas_adc_dir, &format!("in_voltage{}_scale", index), "gas")?;
        // scale is millivolts per LSB
        Ok(gas_resistance(raw * scale / 1000.0))
    }
}

impl SensorHub for IioSensorHub {
    fn read_temperature(&mut self) -> LoggerResult<f64> {
        Ok(read_attr(&self.bme280_dir, "in_temp_input", "bme280")? / 1000.0)
    }

    fn read_pressure(&mut self) -> LoggerResult<f64> {
        // kPa -> hPa
        Ok(read_attr(&self.bme280_dir, "in_pressure_input", "bme280")? * 10.0)
    }

    fn read_humidity(&mut self) -> LoggerResult<f64> {
        Ok(read_attr(&self.bme280_dir, "in_humidityrelative_input", "bme280")? / 1000.0)
    }

    fn read_lux(&mut self) -> LoggerResult<f64> {
        read_attr(&self.ltr559_dir, "in_illuminance_input", "ltr559")
    }

    fn read_proximity(&mut self) -> LoggerResult<f64> {
        read_attr(&self.ltr559_dir, "in_proximity_raw", "ltr559")
    }

    fn read_gas(&mut self) -> LoggerResult<GasReading> {
        Ok(GasReading {
            oxidising: self.gas_channel(0)?,
            reducing: self.gas_channel(1)?,
            nh3: self.gas_channel(2)?,
        })
    }

    fn read_particulates(&mut self) -> LoggerResult<Particulates> {
        self.particulates.read()
    }

    fn read_cpu_temperature(&mut self) -> LoggerResult<f64> {
        self.cpu.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CpuTempSource;

    fn write(dir: &Path, name: &str, value: &str) {
        fs::write(dir.join(name), value).unwrap();
    }

    #[test]
    fn reads_scaled_attributes() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path();
        write(dir, "in_temp_input", "21500\n");
        write(dir, "in_pressure_input", "101.325\n");
        write(dir, "in_humidityrelative_input", "45250\n");
        write(dir, "in_illuminance_input", "312\n");
        write(dir, "in_proximity_raw", "3\n");
        for (i, raw) in ["825", "550", "1100"].iter().enumerate() {
            write(dir, &format!("in_voltage{}_raw", i), raw);
            write(dir, &format!("in_voltage{}_scale", i), "2.000000");
        }
        write(dir, "cpu_temp", "40000");

        let mut hub = IioSensorHub::new(&SensorPaths {
            bme280_dir: dir.to_path_buf(),
            ltr559_dir: dir.to_path_buf(),
            gas_adc_dir: dir.to_path_buf(),
            pms5003_device: dir.join("missing-tty"),
            cpu_temp: CpuTempSource::ThermalZone(dir.join("cpu_temp")),
        });

        assert!((hub.read_temperature().unwrap() - 21.5).abs() < 1e-9);
        assert!((hub.read_pressure().unwrap() - 1013.25).abs() < 1e-9);
        assert!((hub.read_humidity().unwrap() - 45.25).abs() < 1e-9);
        assert_eq!(hub.read_lux().unwrap(), 312.0);
        assert_eq!(hub.read_proximity().unwrap(), 3.0);
        assert_eq!(hub.read_cpu_temperature().unwrap(), 40.0);

        // 825 * 2 mV = 1.65 V, half the supply -> resistance equals the load resistor
        let gas = hub.read_gas().unwrap();
        assert!((gas.oxidising - 56_000.0).abs() < 1e-6);
        assert!(gas.reducing < gas.oxidising);
        assert!(gas.nh3 > gas.oxidising);

        assert!(matches!(
            hub.read_particulates(),
            Err(LoggerError::Sensor { .. })
        ));
    }

    #[test]
    fn unparseable_attribute_is_a_sensor_error() {
        let root = tempfile::tempdir().unwrap();
        write(root.path(), "in_temp_input", "n/a");
        let err = read_attr(root.path(), "in_temp_input", "bme280").unwrap_err();
        assert!(err.is_recoverable());
    }
}
