pub mod debug_utils;
pub mod instance;

pub use debug_utils::DebugMessenger;
pub use instance::Instance;
