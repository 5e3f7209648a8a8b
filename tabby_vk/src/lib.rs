pub mod command;
pub mod config;
pub mod context;
pub mod core;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod pipeline;
pub mod resource;
pub mod sync;
pub mod traits;
pub mod types;
pub mod util;
pub mod wsi;

pub use context::{GraphicsContext, OutOfDateHandler};
pub use error::{Result, TabbyError};

// Re-exports
#[cfg(feature = "winit")]
pub use winit;
pub use {ash, ash_window, glam, raw_window_handle};
