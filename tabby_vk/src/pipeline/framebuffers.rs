use ash::vk;
use derivative::Derivative;
#[cfg(feature = "log-lifetimes")]
use tracing::trace;

use crate::traits::Destructible;
use crate::{Result, TabbyError};

/// One framebuffer per swapchain image view, all sharing the depth view
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Framebuffers {
    handles: Vec<vk::Framebuffer>,
    #[derivative(Debug = "ignore")]
    device: crate::device::DeviceContext,
}

impl Framebuffers {
    pub fn new(
        device: crate::device::DeviceContext,
        render_pass: vk::RenderPass,
        color_views: &[vk::ImageView],
        depth_view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> Result<Self> {
        let mut framebuffers = Self {
            handles: Vec::with_capacity(color_views.len()),
            device,
        };
        for view in color_views {
            let attachments = [*view, depth_view];
            let framebuffer_ci = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            let handle = unsafe { framebuffers.device.create_framebuffer(&framebuffer_ci, None) }
                .map_err(|err| {
                    framebuffers.destroy();
                    TabbyError::FramebufferCreate(err)
                })?;

            #[cfg(feature = "log-lifetimes")]
            trace!("Creating VkFramebuffer {:p}", handle);

            framebuffers.handles.push(handle);
        }
        Ok(framebuffers)
    }

    pub fn handles(&self) -> &[vk::Framebuffer] {
        &self.handles
    }
}

impl Destructible for Framebuffers {
    fn destroy(&mut self) {
        for handle in self.handles.drain(..) {
            #[cfg(feature = "log-lifetimes")]
            trace!("Destroying VkFramebuffer {:p}", handle);
            unsafe {
                self.device.destroy_framebuffer(handle, None);
            }
        }
    }
}

#[cfg(feature = "raii")]
impl Drop for Framebuffers {
    fn drop(&mut self) {
        self.destroy();
    }
}
