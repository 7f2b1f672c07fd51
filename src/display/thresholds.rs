use embedded_graphics::pixelcolor::Rgb888;

use crate::models::{Channel, CHANNEL_COUNT};

/// Five severity bands delimited by four ascending boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    DangerouslyLow,
    Low,
    Normal,
    High,
    DangerouslyHigh,
}

impl Band {
    const ORDER: [Band; 5] = [
        Band::DangerouslyLow,
        Band::Low,
        Band::Normal,
        Band::High,
        Band::DangerouslyHigh,
    ];

    pub fn color(self) -> Rgb888 {
        match self {
            Band::DangerouslyLow => Rgb888::new(0, 0, 255),
            Band::Low => Rgb888::new(0, 255, 255),
            Band::Normal => Rgb888::new(0, 255, 0),
            Band::High => Rgb888::new(255, 255, 0),
            Band::DangerouslyHigh => Rgb888::new(255, 0, 0),
        }
    }
}

/// Per-channel warning limits. Example for temperature `[4, 18, 28, 35]`:
/// up to 4 is dangerously low, (4, 18] low, (18, 28] normal, (28, 35] high,
/// above 35 dangerously high.
///
/// These limits are examples only, not safety guidance.
#[derive(Debug, Clone)]
pub struct ThresholdTable {
    limits: [[f64; 4]; CHANNEL_COUNT],
}

impl Default for ThresholdTable {
    fn default() -> Self {
        ThresholdTable {
            limits: [
                [4.0, 18.0, 28.0, 35.0],
                [250.0, 650.0, 1013.25, 1015.0],
                [20.0, 30.0, 60.0, 70.0],
                [-1.0, -1.0, 30000.0, 100000.0],
                [-1.0, -1.0, 40.0, 50.0],
                [-1.0, -1.0, 450.0, 550.0],
                [-1.0, -1.0, 200.0, 300.0],
                [-1.0, -1.0, 50.0, 100.0],
                [-1.0, -1.0, 50.0, 100.0],
                [-1.0, -1.0, 50.0, 100.0],
                [0.0; 4],
                [0.0; 4],
                [0.0; 4],
                [0.0; 4],
                [0.0; 4],
            ],
        }
    }
}

impl ThresholdTable {
    pub fn limits(&self, channel: Channel) -> &[f64; 4] {
        &self.limits[channel.index()]
    }

    /// Scan the boundaries in order; the last one `value` exceeds picks the band.
    pub fn band(&self, channel: Channel, value: f64) -> Band {
        let mut band = Band::DangerouslyLow;
        for (j, limit) in self.limits(channel).iter().enumerate() {
            if value > *limit {
                band = Band::ORDER[j + 1];
            }
        }
        band
    }
}
