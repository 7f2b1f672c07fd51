/// Composes frames for the small status panel
use core::convert::Infallible;
use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_5X8, FONT_6X10};
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Baseline, Text};
use log::info;
use palette::{FromColor, Hsv, Srgb};

use super::device::DisplayDevice;
use super::frame::Frame;
use super::thresholds::ThresholdTable;
use super::window::RollingWindow;
use crate::error::LoggerResult;
use crate::models::{Channel, CHANNEL_COUNT};

/// Height of the label area above the history strip
const TOP_POS: u32 = 25;
const GRID_COLUMNS: usize = 2;
const X_OFFSET: i32 = 2;
const Y_OFFSET: i32 = 2;
const INFO_BACKGROUND: Rgb888 = Rgb888::new(0, 0, 255);

/// Unwraps drawing results on the in-memory frame, which cannot fail.
fn drawn<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

/// Map a normalized value to red (1.0) through to blue (0.0).
pub fn strip_color(normalized: f64) -> Rgb888 {
    let hue = (1.0 - normalized) * 0.6;
    let hsv = Hsv::<palette::encoding::Srgb, f32>::new((hue * 360.0) as f32, 1.0, 1.0);
    let rgb = Srgb::<f32>::from_color(hsv);
    Rgb888::new(
        (rgb.red * 255.0) as u8,
        (rgb.green * 255.0) as u8,
        (rgb.blue * 255.0) as u8,
    )
}

/// Owns the panel, the frame being composed and every channel's history.
pub struct Renderer<D: DisplayDevice> {
    device: D,
    frame: Frame,
    windows: [RollingWindow; CHANNEL_COUNT],
    thresholds: ThresholdTable,
}

impl<D: DisplayDevice> Renderer<D> {
    /// History windows are as wide as the panel and start out filled with 1.0.
    pub fn new(device: D, width: u32, height: u32) -> Self {
        Renderer {
            device,
            frame: Frame::new(width, height),
            windows: std::array::from_fn(|_| RollingWindow::filled(width as usize, 1.0)),
            thresholds: ThresholdTable::default(),
        }
    }

    pub fn push(&mut self, channel: Channel, value: f64) {
        self.windows[channel.index()].push(value);
    }

    pub fn window(&self, channel: Channel) -> &RollingWindow {
        &self.windows[channel.index()]
    }

    #[cfg(test)]
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    #[cfg(test)]
    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn set_backlight(&mut self, level: u8) -> LoggerResult<()> {
        self.device.set_backlight(level)
    }

    fn present(&mut self) -> LoggerResult<()> {
        self.device.draw_frame(&self.frame)
    }

    fn fill(&mut self, x: i32, y: i32, width: u32, height: u32, color: Rgb888) {
        drawn(
            Rectangle::new(Point::new(x, y), Size::new(width, height))
                .into_styled(PrimitiveStyle::with_fill(color))
                .draw(&mut self.frame),
        );
    }

    fn text(&mut self, text: &str, x: i32, y: i32, style: MonoTextStyle<'static, Rgb888>) {
        drawn(Text::with_baseline(text, Point::new(x, y), style, Baseline::Top).draw(&mut self.frame));
    }

    /// History strip for one channel: a hue gradient with a trend line and the
    /// latest value written across the top.
    pub fn strip(&mut self, channel: Channel) -> LoggerResult<()> {
        let window = &self.windows[channel.index()];
        let history = window.current();
        let normalized = window.normalize();
        let latest = history.last().copied().unwrap_or_default();
        let message = channel.describe(latest);
        info!("{}", message);

        let height = self.frame.height();
        let span = height.saturating_sub(TOP_POS);
        drawn(self.frame.clear(Rgb888::WHITE));

        for (i, n) in normalized.iter().enumerate() {
            let x = i as i32;
            self.fill(x, TOP_POS as i32, 1, span, strip_color(*n));
            let line_y = height as f64 - (TOP_POS as f64 + n * span as f64) + TOP_POS as f64;
            self.fill(x, line_y as i32, 1, 1, Rgb888::BLACK);
        }

        self.text(&message, 0, 0, MonoTextStyle::new(&FONT_10X20, Rgb888::BLACK));
        self.present()
    }

    /// Latest value of every channel, colored by its threshold band.
    pub fn all_channels(&mut self) -> LoggerResult<()> {
        drawn(self.frame.clear(Rgb888::BLACK));

        let rows = CHANNEL_COUNT.div_ceil(GRID_COLUMNS);
        let column_width = (self.frame.width() as usize / GRID_COLUMNS) as i32;
        let row_height = (self.frame.height() as usize / rows) as i32;

        for (i, channel) in Channel::ALL.into_iter().enumerate() {
            let value = self.window(channel).latest().unwrap_or_default();
            let color = self.thresholds.band(channel, value).color();
            let x = X_OFFSET + column_width * (i / rows) as i32;
            let y = Y_OFFSET + row_height * (i % rows) as i32;
            self.text(
                &channel.describe(value),
                x,
                y,
                MonoTextStyle::new(&FONT_5X8, color),
            );
        }

        self.present()
    }

    /// One or two lines of operator feedback.
    pub fn info(&mut self, message: &str, detail: &str) -> LoggerResult<()> {
        info!("{} {}", message, detail);
        drawn(self.frame.clear(INFO_BACKGROUND));
        let style = MonoTextStyle::new(&FONT_6X10, Rgb888::WHITE);
        self.text(message, 10, 10, style);
        self.text(detail, 10, 40, style);
        self.present()
    }
}
