/// Correction of the board temperature sensor for heat from the CPU
use std::collections::VecDeque;

/// Number of CPU temperature samples in the moving average.
pub const CPU_AVERAGE_SAMPLES: usize = 5;

/// Pull a raw reading away from the CPU temperature.
///
/// Smaller `factor` values adjust the reading down more aggressively.
pub fn compensate(raw_temp: f64, avg_cpu_temp: f64, factor: f64) -> f64 {
    raw_temp - (avg_cpu_temp - raw_temp) / factor
}

/// Moving average over the last few CPU temperature samples, one per cycle.
#[derive(Debug, Clone)]
pub struct CpuTemperatureAverage {
    samples: VecDeque<f64>,
}

impl CpuTemperatureAverage {
    /// Seed the history by repeating the first reading.
    pub fn seeded(first: f64) -> Self {
        CpuTemperatureAverage {
            samples: std::iter::repeat(first).take(CPU_AVERAGE_SAMPLES).collect(),
        }
    }

    /// Record a new sample and return the updated average.
    pub fn update(&mut self, cpu_temp: f64) -> f64 {
        self.samples.pop_front();
        self.samples.push_back(cpu_temp);
        self.average()
    }

    pub fn average(&self) -> f64 {
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }
}
