use time::OffsetDateTime;

use crate::error::{LoggerError, LoggerResult};

/// Every value the logger produces per cycle, in persisted column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Temperature,
    Pressure,
    Humidity,
    Light,
    Oxidised,
    Reduced,
    Nh3,
    Pm1,
    Pm25,
    Pm10,
    Timestamp,
    MicAmpLow,
    MicAmpMid,
    MicAmpHigh,
    MicAmpTotal,
}

pub const CHANNEL_COUNT: usize = 15;

impl Channel {
    pub const ALL: [Channel; CHANNEL_COUNT] = [
        Channel::Temperature,
        Channel::Pressure,
        Channel::Humidity,
        Channel::Light,
        Channel::Oxidised,
        Channel::Reduced,
        Channel::Nh3,
        Channel::Pm1,
        Channel::Pm25,
        Channel::Pm10,
        Channel::Timestamp,
        Channel::MicAmpLow,
        Channel::MicAmpMid,
        Channel::MicAmpHigh,
        Channel::MicAmpTotal,
    ];

    /// Position of the channel in the persisted row.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::Temperature => "temperature",
            Channel::Pressure => "pressure",
            Channel::Humidity => "humidity",
            Channel::Light => "light",
            Channel::Oxidised => "oxidised",
            Channel::Reduced => "reduced",
            Channel::Nh3 => "nh3",
            Channel::Pm1 => "pm1",
            Channel::Pm25 => "pm25",
            Channel::Pm10 => "pm10",
            Channel::Timestamp => "timestamp",
            Channel::MicAmpLow => "mic_amp_low",
            Channel::MicAmpMid => "mic_amp_mid",
            Channel::MicAmpHigh => "mic_amp_high",
            Channel::MicAmpTotal => "mic_amp_total",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Channel::Temperature => "C",
            Channel::Pressure => "hPa",
            Channel::Humidity => "%",
            Channel::Light => "Lux",
            Channel::Oxidised | Channel::Reduced | Channel::Nh3 => "kO",
            Channel::Pm1 | Channel::Pm25 | Channel::Pm10 => "ug/m3",
            Channel::Timestamp => "time",
            Channel::MicAmpLow
            | Channel::MicAmpMid
            | Channel::MicAmpHigh
            | Channel::MicAmpTotal => "%",
        }
    }

    /// Short label used on the panel: the first four characters of the name.
    pub fn abbreviation(self) -> &'static str {
        let name = self.name();
        &name[..name.len().min(4)]
    }

    pub fn from_name(name: &str) -> Option<Channel> {
        Channel::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Display/log line for a value, e.g. `temp: 21.4 C`.
    pub fn describe(self, value: f64) -> String {
        format!("{}: {:.1} {}", self.abbreviation(), value, self.unit())
    }
}

/// Three gas sensor resistances in ohms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasReading {
    pub oxidising: f64,
    pub reducing: f64,
    pub nh3: f64,
}

/// Particulate mass concentrations in ug/m3.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particulates {
    pub pm1: f64,
    pub pm25: f64,
    pub pm10: f64,
}

/// Band amplitudes derived from one audio capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseProfile {
    pub amp_low: f64,
    pub amp_mid: f64,
    pub amp_high: f64,
    pub amp_total: f64,
}

/// One reading cycle, filled in channel by channel.
#[derive(Debug, Clone)]
pub struct Snapshot {
    values: [Option<f64>; CHANNEL_COUNT],
    pub captured_at: OffsetDateTime,
}

impl Snapshot {
    pub fn new() -> Self {
        Snapshot {
            values: [None; CHANNEL_COUNT],
            captured_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn set(&mut self, channel: Channel, value: f64) {
        self.values[channel.index()] = Some(value);
    }

    pub fn get(&self, channel: Channel) -> Option<f64> {
        self.values[channel.index()]
    }

    /// Turns the snapshot into a persistable row, refusing partial cycles.
    pub fn complete(self) -> LoggerResult<Record> {
        let mut values = [0.0; CHANNEL_COUNT];
        for channel in Channel::ALL {
            values[channel.index()] = self
                .get(channel)
                .ok_or(LoggerError::IncompleteSnapshot(channel))?;
        }
        Ok(Record {
            values,
            captured_at: self.captured_at,
        })
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// A complete row: every channel has exactly one value.
#[derive(Debug, Clone)]
pub struct Record {
    pub values: [f64; CHANNEL_COUNT],
    pub captured_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_order_matches_persisted_columns() {
        let names: Vec<&str> = Channel::ALL.iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            [
                "temperature",
                "pressure",
                "humidity",
                "light",
                "oxidised",
                "reduced",
                "nh3",
                "pm1",
                "pm25",
                "pm10",
                "timestamp",
                "mic_amp_low",
                "mic_amp_mid",
                "mic_amp_high",
                "mic_amp_total",
            ]
        );
        for (i, channel) in Channel::ALL.iter().enumerate() {
            assert_eq!(channel.index(), i);
        }
    }

    #[test]
    fn abbreviations_are_at_most_four_chars() {
        assert_eq!(Channel::Temperature.abbreviation(), "temp");
        assert_eq!(Channel::Nh3.abbreviation(), "nh3");
        assert_eq!(Channel::MicAmpTotal.abbreviation(), "mic_");
        assert_eq!(Channel::Pressure.describe(1013.26), "pres: 1013.3 hPa");
    }

    #[test]
    fn incomplete_snapshot_is_rejected() {
        let mut snapshot = Snapshot::new();
        for channel in Channel::ALL.iter().filter(|c| **c != Channel::Pm10) {
            snapshot.set(*channel, 1.0);
        }
        match snapshot.complete() {
            Err(LoggerError::IncompleteSnapshot(Channel::Pm10)) => {}
            other => panic!("expected missing pm10, got {:?}", other),
        }
    }

    #[test]
    fn complete_snapshot_keeps_channel_order() {
        let mut snapshot = Snapshot::new();
        for channel in Channel::ALL {
            snapshot.set(channel, channel.index() as f64);
        }
        let record = snapshot.complete().unwrap();
        for (i, value) in record.values.iter().enumerate() {
            assert_eq!(*value, i as f64);
        }
    }
}
