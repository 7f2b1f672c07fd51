pub mod capture;
pub mod noise;

pub use capture::{AudioCapture, CpalCapture};
