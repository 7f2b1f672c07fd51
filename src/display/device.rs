/// Physical panel access
use log::debug;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::frame::Frame;
use crate::error::{LoggerError, LoggerResult};

pub trait DisplayDevice {
    fn draw_frame(&mut self, frame: &Frame) -> LoggerResult<()>;
    /// 0 switches the backlight off, anything else on.
    fn set_backlight(&mut self, level: u8) -> LoggerResult<()>;
}

/// Linux framebuffer panel (e.g. an ST7735 driven by fbtft) with an optional
/// sysfs backlight brightness file.
pub struct FramebufferDisplay {
    device: PathBuf,
    backlight: Option<PathBuf>,
}

impl FramebufferDisplay {
    pub fn new(device: PathBuf, backlight: Option<PathBuf>) -> Self {
        FramebufferDisplay { device, backlight }
    }
}

impl DisplayDevice for FramebufferDisplay {
    fn draw_frame(&mut self, frame: &Frame) -> LoggerResult<()> {
        let mut fb = OpenOptions::new()
            .write(true)
            .open(&self.device)
            .map_err(|e| LoggerError::Display(format!("{}: {}", self.device.display(), e)))?;
        fb.write_all(&frame.to_rgb565_le())
            .map_err(|e| LoggerError::Display(format!("{}: {}", self.device.display(), e)))
    }

    fn set_backlight(&mut self, level: u8) -> LoggerResult<()> {
        let Some(path) = &self.backlight else {
            return Ok(());
        };
        // The kernel rejects values above max_brightness, so "on" means full
        let value = if level == 0 { 0 } else { max_brightness(path) };
        std::fs::write(path, value.to_string())
            .map_err(|e| LoggerError::Display(format!("{}: {}", path.display(), e)))
    }
}

/// The sysfs `max_brightness` next to `brightness`, or 1 when unreadable.
fn max_brightness(brightness: &Path) -> u32 {
    std::fs::read_to_string(brightness.with_file_name("max_brightness"))
        .ok()
        .and_then(|text| text.trim().parse().ok())
        .unwrap_or(1)
}

/// Stand-in for installations without a panel.
#[derive(Debug, Default)]
pub struct HeadlessDisplay;

impl DisplayDevice for HeadlessDisplay {
    fn draw_frame(&mut self, frame: &Frame) -> LoggerResult<()> {
        debug!("Discarding {}x{} frame", frame.width(), frame.height());
        Ok(())
    }

    fn set_backlight(&mut self, level: u8) -> LoggerResult<()> {
        debug!("Backlight {}", level);
        Ok(())
    }
}
