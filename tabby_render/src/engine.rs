use tabby_vk::ash::vk;
use tabby_vk::config::EngineSettings;
use tabby_vk::context::FrameCallback;
use tabby_vk::wsi::SurfaceProvider;
use tabby_vk::{GraphicsContext, Result};
use tracing::debug;

use crate::fps::FpsCounter;

/// Owns the graphics context and drives frames
#[derive(Debug)]
pub struct Engine {
    context: GraphicsContext,
    fps: FpsCounter,
}

impl Engine {
    pub fn new<W: SurfaceProvider + ?Sized>(window: &W, settings: EngineSettings) -> Result<Self> {
        Ok(Self {
            context: GraphicsContext::new(window, settings)?,
            fps: FpsCounter::default(),
        })
    }

    pub fn context(&self) -> &GraphicsContext {
        &self.context
    }

    /// Also the [`RenderBackend`](crate::RenderBackend) scenes are built on
    pub fn context_mut(&mut self) -> &mut GraphicsContext {
        &mut self.context
    }

    /// Rebuilds the swapchain for a new window size. A zero sized (minimized) window is
    /// ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        debug!("Resizing to {width}x{height}");
        self.context.finish_drawing()?;
        self.context
            .set_window_extent(vk::Extent2D { width, height });
        self.context.handle_out_of_date()
    }

    pub fn draw_frame(&mut self) -> Result<()> {
        self.context.draw_frame(None)?;
        self.fps.frame();
        Ok(())
    }

    /// Like [`Engine::draw_frame`] with a per frame command buffer recorded by `record`
    pub fn draw_frame_with(&mut self, record: &mut FrameCallback<'_>) -> Result<()> {
        self.context.draw_frame(Some(record))?;
        self.fps.frame();
        Ok(())
    }

    /// Waits for the GPU, call before dropping scenes built on this engine
    pub fn finish_drawing(&self) -> Result<()> {
        self.context.finish_drawing()
    }

    pub fn fps(&self) -> Option<u32> {
        self.fps.fps()
    }
}
