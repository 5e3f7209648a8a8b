pub mod framebuffers;
pub mod graphics;
pub mod render_pass;
pub mod vertex_input;

pub use framebuffers::Framebuffers;
pub use graphics::GraphicsPipelines;
pub use render_pass::RenderPass;
