pub mod device;
pub mod frame;
pub mod renderer;
pub mod thresholds;
pub mod window;

pub use device::{DisplayDevice, FramebufferDisplay, HeadlessDisplay};
pub use renderer::Renderer;
