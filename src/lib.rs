pub mod channel;
pub mod compositor;
pub mod convert;
pub mod demo;
pub mod driver;
pub mod engine;
pub mod error;
pub mod errorlog;
pub mod framebuffer;
pub mod halt;
pub mod settings;
pub mod surface;

// Re-export the driver entry points at the crate root
pub use driver::{find_suggested_clamp_value, render, LoopTiming, RenderContext};
pub use error::{ChannelReadError, DriverError};
pub use errorlog::ErrorLog;
