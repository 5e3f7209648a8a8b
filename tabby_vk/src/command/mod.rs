pub mod command_pool;
pub mod draw_list;
pub mod recorder;

pub use command_pool::CommandPool;
pub use draw_list::{DrawCommand, DrawList, PipelineKind};
pub use recorder::{CommandBufferRecorder, DrawRecorder};
