//! Everything needed to put frames on screen.
//!
//! [`GraphicsContext`] owns the Vulkan objects from the instance down to the recorded
//! command buffers. The swapchain dependent part (render pass, depth target, pipelines,
//! framebuffers and the static command buffers) is rebuilt as a unit whenever the
//! swapchain is recreated, replaying the stored [`DrawList`].
use std::fmt;

use ash::vk;
use derivative::Derivative;
use tracing::{debug, info};

use crate::command::{CommandBufferRecorder, CommandPool, DrawList};
use crate::config::{EngineSettings, SamplerSettings};
use crate::core::Instance;
use crate::descriptor::{DescriptorAllocator, DescriptorLayouts};
use crate::device::{DeviceContext, PhysicalDevice};
use crate::pipeline::{Framebuffers, GraphicsPipelines, RenderPass};
use crate::resource::{ImageView, ResourceImage};
use crate::sync::BinarySemaphore;
use crate::traits::Destructible;
use crate::wsi::{Acquired, Presented, Surface, SurfaceProvider, SwapchainManager, SwapchainState};
use crate::{Result, TabbyError};

/// Per frame recording callback. Receives a command buffer which is already begun and
/// the index of the acquired swapchain image.
pub type FrameCallback<'a> = dyn FnMut(&ash::Device, vk::CommandBuffer, u32) -> Result<()> + 'a;

/// Order in which swapchain dependent state is rebuilt. The command pools are replaced
/// before the swapchain so a failed swapchain rebuild never leaves them destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RebuildStep {
    TeardownGraphics,
    ReplaceCommandPools,
    RecreateSwapchain,
    InitializeGraphics,
}

const REBUILD_ORDER: [RebuildStep; 4] = [
    RebuildStep::TeardownGraphics,
    RebuildStep::ReplaceCommandPools,
    RebuildStep::RecreateSwapchain,
    RebuildStep::InitializeGraphics,
];

/// What to do once the swapchain reports it is out of date
#[derive(Default)]
pub enum OutOfDateHandler {
    /// Wait idle, tear down and rebuild the swapchain dependent state
    #[default]
    Recreate,
    /// Surface [`TabbyError::SwapchainOutOfDate`] to the caller
    Fail,
    Custom(Box<dyn FnMut(&mut GraphicsContext) -> Result<()>>),
}

impl fmt::Debug for OutOfDateHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutOfDateHandler::Recreate => f.write_str("Recreate"),
            OutOfDateHandler::Fail => f.write_str("Fail"),
            OutOfDateHandler::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Swapchain dependent objects, created and destroyed together
#[derive(Debug)]
struct GraphicsState {
    framebuffers: Framebuffers,
    pipelines: GraphicsPipelines,
    depth_view: ImageView,
    depth_image: ResourceImage,
    render_pass: RenderPass,
}

impl Destructible for GraphicsState {
    fn destroy(&mut self) {
        self.framebuffers.destroy();
        self.pipelines.destroy();
        self.depth_view.destroy();
        self.depth_image.destroy();
        self.render_pass.destroy();
    }
}

// Fields are declared in teardown order
#[derive(Derivative)]
#[derivative(Debug)]
pub struct GraphicsContext {
    graphics_pool: CommandPool,
    transfer_pool: CommandPool,
    image_available: BinarySemaphore,
    render_finished: BinarySemaphore,
    graphics: Option<GraphicsState>,
    swapchain: SwapchainManager,
    descriptor_allocator: DescriptorAllocator,
    layouts: DescriptorLayouts,
    surface: Surface,
    device: DeviceContext,
    instance: Instance,

    settings: EngineSettings,
    window_extent: vk::Extent2D,
    instancing: bool,
    draw_list: DrawList,
    out_of_date: OutOfDateHandler,
}

impl GraphicsContext {
    pub fn new<W: SurfaceProvider + ?Sized>(window: &W, settings: EngineSettings) -> Result<Self> {
        let extensions = window.required_extensions()?;
        let instance = Instance::new(&settings.application, &extensions)?;
        let surface = Surface::new(instance.clone(), window)?;
        let physical_device = PhysicalDevice::select(&instance, &surface, &settings.device)?;
        let device = DeviceContext::new(instance.clone(), physical_device)?;

        let window_extent = vk::Extent2D {
            width: window.width(),
            height: window.height(),
        };
        let mut swapchain = SwapchainManager::new(device.clone(), settings.swapchain);
        swapchain.initialize(&surface, window_extent)?;

        let layouts = DescriptorLayouts::new(device.clone())?;
        let descriptor_allocator = DescriptorAllocator::new(device.clone(), 1)?;
        let (graphics_pool, transfer_pool) = Self::create_command_pools(&device)?;
        let image_available = BinarySemaphore::new(device.clone())?;
        let render_finished = BinarySemaphore::new(device.clone())?;

        let mut context = Self {
            graphics_pool,
            transfer_pool,
            image_available,
            render_finished,
            graphics: None,
            swapchain,
            descriptor_allocator,
            layouts,
            surface,
            device,
            instance,
            settings,
            window_extent,
            instancing: false,
            draw_list: DrawList::new(),
            out_of_date: OutOfDateHandler::default(),
        };
        context.initialize_graphics()?;
        info!(
            "Graphics context ready on {}",
            context.device.physical_device().name()
        );
        Ok(context)
    }

    fn create_command_pools(device: &DeviceContext) -> Result<(CommandPool, CommandPool)> {
        let families = device.queue_families();
        let graphics = CommandPool::new(
            device.clone(),
            families.graphics,
            device.graphics_queue(),
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )?;
        let transfer = CommandPool::new(
            device.clone(),
            families.transfer,
            device.transfer_queue(),
            vk::CommandPoolCreateFlags::TRANSIENT,
        )?;
        Ok((graphics, transfer))
    }

    /// Builds the render pass, depth target, pipelines and framebuffers for the current
    /// swapchain, then records the static command buffers
    fn initialize_graphics(&mut self) -> Result<()> {
        let extent = self.swapchain.extent();
        let depth_format = self.device.physical_device().depth_format();

        let render_pass = RenderPass::new(
            self.device.clone(),
            self.swapchain.format().format,
            depth_format,
        )?;
        let depth_image = ResourceImage::new(
            self.device.clone(),
            extent.width,
            extent.height,
            depth_format,
            vk::ImageTiling::OPTIMAL,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        let depth_view = ImageView::new(
            self.device.clone(),
            depth_image.handle(),
            depth_format,
            vk::ImageAspectFlags::DEPTH,
        )?;
        depth_image.transition_layout(
            &self.graphics_pool,
            depth_format,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        )?;
        let pipelines = GraphicsPipelines::new(
            self.device.clone(),
            &self.settings.pipeline,
            render_pass.handle(),
            extent,
            self.layouts.handles(),
            self.instancing,
        )?;
        let framebuffers = Framebuffers::new(
            self.device.clone(),
            render_pass.handle(),
            &self.swapchain.image_views(),
            depth_view.handle(),
            extent,
        )?;

        self.graphics = Some(GraphicsState {
            framebuffers,
            pipelines,
            depth_view,
            depth_image,
            render_pass,
        });
        self.record_static_commands()
    }

    /// Re-records one command buffer per framebuffer from the stored draw list
    fn record_static_commands(&mut self) -> Result<()> {
        let Some(graphics) = self.graphics.as_ref() else {
            return Ok(());
        };
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.settings.pipeline.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];
        let layout = graphics.pipelines.layout();
        let main = graphics.pipelines.main();
        let instancing = graphics.pipelines.instancing();
        let draw_list = &self.draw_list;
        self.graphics_pool.record_render_passes(
            graphics.render_pass.handle(),
            graphics.framebuffers.handles(),
            self.swapchain.extent(),
            &clear_values,
            |device, command_buffer, _| {
                let mut recorder = CommandBufferRecorder {
                    device,
                    command_buffer,
                    layout,
                    main,
                    instancing,
                };
                draw_list.replay(&mut recorder);
                Ok(())
            },
        )
    }

    fn teardown_graphics(&mut self) {
        if let Some(mut graphics) = self.graphics.take() {
            graphics.destroy();
        }
    }

    /// Waits for the device, tears down every swapchain dependent object including the
    /// command pools and builds them again
    pub fn recreate_swapchain(&mut self) -> Result<()> {
        self.device.wait_idle()?;
        if self.swapchain.state() == SwapchainState::Ready {
            self.swapchain.mark_out_of_date()?;
        }
        for step in REBUILD_ORDER {
            match step {
                RebuildStep::TeardownGraphics => self.teardown_graphics(),
                RebuildStep::ReplaceCommandPools => self.replace_command_pools()?,
                RebuildStep::RecreateSwapchain => {
                    self.swapchain.recreate(&self.surface, self.window_extent)?
                }
                RebuildStep::InitializeGraphics => self.initialize_graphics()?,
            }
        }
        debug!("Swapchain dependent state rebuilt");
        Ok(())
    }

    pub fn recreate_command_pools(&mut self) -> Result<()> {
        self.device.wait_idle()?;
        self.replace_command_pools()?;
        // static buffers died with the old pool
        self.record_static_commands()
    }

    /// Old pools are only destroyed once both new ones exist
    fn replace_command_pools(&mut self) -> Result<()> {
        let (graphics_pool, transfer_pool) = Self::create_command_pools(&self.device)?;
        let mut old_graphics = std::mem::replace(&mut self.graphics_pool, graphics_pool);
        let mut old_transfer = std::mem::replace(&mut self.transfer_pool, transfer_pool);
        old_graphics.destroy();
        old_transfer.destroy();
        Ok(())
    }

    /// Replaces the descriptor pool with one sized for `material_count` materials. Every
    /// set allocated from the old pool becomes invalid.
    pub fn recreate_descriptor_pool(&mut self, material_count: u32) -> Result<()> {
        self.device.wait_idle()?;
        self.descriptor_allocator.destroy();
        self.descriptor_allocator = DescriptorAllocator::new(self.device.clone(), material_count)?;
        Ok(())
    }

    /// Stores new draws and the instancing flag, then rebuilds the swapchain so the static
    /// command buffers are recorded from them
    pub fn rebuild_graphics(&mut self, instancing: bool, draw_list: DrawList) -> Result<()> {
        self.instancing = instancing;
        self.draw_list = draw_list;
        self.recreate_swapchain()
    }

    /// Drops the stored draws and records empty render passes
    pub fn clear_draws(&mut self) -> Result<()> {
        self.draw_list.clear();
        self.record_static_commands()
    }

    /// Acquires an image, submits the optional per frame buffer followed by the static one,
    /// presents and waits for the present queue to go idle
    pub fn draw_frame(&mut self, per_frame: Option<&mut FrameCallback<'_>>) -> Result<()> {
        if self.swapchain.state() == SwapchainState::OutOfDate {
            return self.handle_out_of_date();
        }
        let image_index = match self
            .swapchain
            .acquire_next_image(self.image_available.handle())?
        {
            Acquired::Image(index) => index,
            Acquired::OutOfDate => return self.handle_out_of_date(),
        };
        let static_buffer = *self
            .graphics_pool
            .recorded()
            .get(image_index as usize)
            .ok_or(TabbyError::Draw(vk::Result::ERROR_UNKNOWN))?;

        let mut frame_buffers: Vec<vk::CommandBuffer> = Vec::with_capacity(2);
        if let Some(record) = per_frame {
            let command_buffer = self.graphics_pool.allocate(1)?[0];
            frame_buffers.push(command_buffer);
            let recorded = self.graphics_pool.record(
                command_buffer,
                vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
                |device, cmd| record(device, cmd, image_index),
            );
            if let Err(err) = recorded {
                self.graphics_pool.free(&frame_buffers);
                return Err(err);
            }
        }
        let per_frame_count = frame_buffers.len();
        frame_buffers.push(static_buffer);

        let presented = self.submit_and_present(&frame_buffers, image_index);
        self.graphics_pool.free(&frame_buffers[..per_frame_count]);
        match presented? {
            Presented::Done => Ok(()),
            Presented::OutOfDate => self.handle_out_of_date(),
        }
    }

    fn submit_and_present(
        &mut self,
        command_buffers: &[vk::CommandBuffer],
        image_index: u32,
    ) -> Result<Presented> {
        let wait_semaphores = [self.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [self.render_finished.handle()];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(command_buffers)
            .signal_semaphores(&signal_semaphores);
        unsafe {
            self.device
                .queue_submit(self.device.graphics_queue(), &[submit_info], vk::Fence::null())
        }
        .map_err(TabbyError::Draw)?;

        let presented = self.swapchain.present(
            self.device.present_queue(),
            image_index,
            self.render_finished.handle(),
        )?;
        unsafe { self.device.queue_wait_idle(self.device.present_queue()) }
            .map_err(TabbyError::Draw)?;
        Ok(presented)
    }

    /// Runs the configured [`OutOfDateHandler`]
    pub fn handle_out_of_date(&mut self) -> Result<()> {
        let mut handler = std::mem::take(&mut self.out_of_date);
        let result = match &mut handler {
            OutOfDateHandler::Recreate => {
                info!("Swapchain out of date, recreating");
                self.recreate_swapchain()
            }
            OutOfDateHandler::Fail => Err(TabbyError::SwapchainOutOfDate),
            OutOfDateHandler::Custom(callback) => callback(self),
        };
        self.out_of_date = handler;
        result
    }

    pub fn set_out_of_date_handler(&mut self, handler: OutOfDateHandler) {
        self.out_of_date = handler;
    }

    /// Window size used the next time the swapchain is built
    pub fn set_window_extent(&mut self, extent: vk::Extent2D) {
        self.window_extent = extent;
    }

    /// Waits for all submitted work. Used before shutdown and on resize.
    pub fn finish_drawing(&self) -> Result<()> {
        self.device.wait_idle()
    }

    pub fn device(&self) -> &DeviceContext {
        &self.device
    }

    /// Pool on the graphics queue, used for layout transitions and image uploads
    pub fn graphics_pool(&self) -> &CommandPool {
        &self.graphics_pool
    }

    /// Pool on the transfer queue, used for buffer uploads
    pub fn transfer_pool(&self) -> &CommandPool {
        &self.transfer_pool
    }

    pub fn descriptor_layouts(&self) -> &DescriptorLayouts {
        &self.layouts
    }

    pub fn descriptor_allocator(&self) -> &DescriptorAllocator {
        &self.descriptor_allocator
    }

    pub fn sampler_settings(&self) -> &SamplerSettings {
        &self.settings.sampler
    }

    pub fn swapchain(&self) -> &SwapchainManager {
        &self.swapchain
    }
}

impl Destructible for GraphicsContext {
    fn destroy(&mut self) {
        if let Err(err) = self.device.wait_idle() {
            tracing::error!("Device wait idle failed during shutdown: {err}");
        }
        self.graphics_pool.destroy();
        self.transfer_pool.destroy();
        self.image_available.destroy();
        self.render_finished.destroy();
        self.teardown_graphics();
        if self.swapchain.state() == SwapchainState::Ready {
            if let Err(err) = self.swapchain.shutdown() {
                tracing::error!("Swapchain shutdown failed: {err}");
            }
        }
        self.swapchain.destroy();
        self.descriptor_allocator.destroy();
        self.layouts.destroy();
        self.surface.destroy();
    }
}

#[cfg(feature = "raii")]
impl Drop for GraphicsContext {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(step: RebuildStep) -> usize {
        REBUILD_ORDER.iter().position(|s| *s == step).unwrap()
    }

    #[test]
    fn command_pools_exist_before_swapchain_rebuild() {
        assert!(position(RebuildStep::ReplaceCommandPools) < position(RebuildStep::RecreateSwapchain));
        // graphics initialization transitions the depth image on the graphics pool
        assert!(position(RebuildStep::ReplaceCommandPools) < position(RebuildStep::InitializeGraphics));
        assert!(position(RebuildStep::TeardownGraphics) < position(RebuildStep::ReplaceCommandPools));
    }
}
