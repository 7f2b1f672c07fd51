/// Environmental sensor access
pub mod compensation;
pub mod cpu;
pub mod iio;
pub mod pms5003;

pub use compensation::{compensate, CpuTemperatureAverage};
pub use iio::IioSensorHub;

use log::debug;

use crate::error::LoggerResult;
use crate::models::{Channel, GasReading, Particulates};

/// Light value recorded while something covers the proximity sensor.
pub const LIGHT_PLACEHOLDER: f64 = 1.0;

/// One "read current value" call per physical quantity.
pub trait SensorHub {
    fn read_temperature(&mut self) -> LoggerResult<f64>;
    fn read_pressure(&mut self) -> LoggerResult<f64>;
    fn read_humidity(&mut self) -> LoggerResult<f64>;
    fn read_lux(&mut self) -> LoggerResult<f64>;
    fn read_proximity(&mut self) -> LoggerResult<f64>;
    /// Raw resistances in ohms.
    fn read_gas(&mut self) -> LoggerResult<GasReading>;
    fn read_particulates(&mut self) -> LoggerResult<Particulates>;
    fn read_cpu_temperature(&mut self) -> LoggerResult<f64>;
}

/// Tuning applied while reading the hub.
#[derive(Debug, Clone, Copy)]
pub struct ReadSettings {
    pub compensation_factor: f64,
    pub proximity_threshold: f64,
}

/// Read every environmental channel once, in persisted order.
///
/// Temperature is CPU-compensated, light falls back to the placeholder when
/// the proximity sensor is covered, gas resistances are reported in kilo-ohms.
pub fn read_all<S: SensorHub>(
    hub: &mut S,
    cpu_temps: &mut CpuTemperatureAverage,
    settings: &ReadSettings,
) -> LoggerResult<Vec<(Channel, f64)>> {
    let avg_cpu_temp = cpu_temps.update(hub.read_cpu_temperature()?);
    let raw_temp = hub.read_temperature()?;
    let temperature = compensate(raw_temp, avg_cpu_temp, settings.compensation_factor);
    debug!(
        "Raw temperature {:.2}, CPU average {:.2}, compensated {:.2}",
        raw_temp, avg_cpu_temp, temperature
    );

    let pressure = hub.read_pressure()?;
    let humidity = hub.read_humidity()?;

    let proximity = hub.read_proximity()?;
    let light = if proximity < settings.proximity_threshold {
        hub.read_lux()?
    } else {
        debug!("Proximity {} covers the light sensor", proximity);
        LIGHT_PLACEHOLDER
    };

    let gas = hub.read_gas()?;
    let pm = hub.read_particulates()?;

    Ok(vec![
        (Channel::Temperature, temperature),
        (Channel::Pressure, pressure),
        (Channel::Humidity, humidity),
        (Channel::Light, light),
        (Channel::Oxidised, gas.oxidising / 1000.0),
        (Channel::Reduced, gas.reducing / 1000.0),
        (Channel::Nh3, gas.nh3 / 1000.0),
        (Channel::Pm1, pm.pm1),
        (Channel::Pm25, pm.pm25),
        (Channel::Pm10, pm.pm10),
    ])
}


#[cfg(test)]
mod tests {
    use super::stub::FixedSensors;
    use super::*;

    const SETTINGS: ReadSettings = ReadSettings {
        compensation_factor: 2.25,
        proximity_threshold: 10.0,
    };

    #[test]
    fn reads_channels_in_order_with_unit_conversion() {
        let mut hub = FixedSensors::default();
        let mut cpu = CpuTemperatureAverage::seeded(24.0);
        let readings = read_all(&mut hub, &mut cpu, &SETTINGS).unwrap();

        let channels: Vec<Channel> = readings.iter().map(|(c, _)| *c).collect();
        assert_eq!(channels, Channel::ALL[..10].to_vec());
        assert_eq!(readings[0].1, 24.0);
        assert_eq!(readings[3].1, 250.0);
        assert_eq!(readings[4].1, 20.0);
        assert_eq!(readings[5].1, 400.0);
        assert_eq!(readings[6].1, 150.0);
    }

    #[test]
    fn covered_proximity_uses_light_placeholder() {
        let mut hub = FixedSensors {
            proximity: 10.0,
            ..FixedSensors::default()
        };
        let mut cpu = CpuTemperatureAverage::seeded(24.0);
        let readings = read_all(&mut hub, &mut cpu, &SETTINGS).unwrap();
        assert_eq!(readings[3], (Channel::Light, LIGHT_PLACEHOLDER));
    }

    #[test]
    fn warm_cpu_lowers_temperature() {
        let mut hub = FixedSensors {
            temperature: 30.0,
            cpu_temperature: 52.5,
            ..FixedSensors::default()
        };
        let mut cpu = CpuTemperatureAverage::seeded(52.5);
        let readings = read_all(&mut hub, &mut cpu, &SETTINGS).unwrap();
        assert!((readings[0].1 - 20.0).abs() < 1e-12);
    }

    #[test]
    fn particulate_failure_propagates() {
        let mut hub = FixedSensors {
            fail_particulates: true,
            ..FixedSensors::default()
        };
        let mut cpu = CpuTemperatureAverage::seeded(24.0);
        let err = read_all(&mut hub, &mut cpu, &SETTINGS).unwrap_err();
        assert!(err.is_recoverable());
    }
}
