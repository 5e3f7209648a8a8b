use std::ptr;

use ash::vk;
use derivative::Derivative;
#[cfg(feature = "log-lifetimes")]
use tracing::trace;

use crate::traits::Destructible;
use crate::{Result, TabbyError};

/// A command pool bound to one queue.
///
/// Besides allocation it records the static render commands of every framebuffer and runs
/// transient single use command buffers, see [`CommandPool::submit_immediate`].
#[derive(Derivative)]
#[derivative(Debug)]
pub struct CommandPool {
    handle: vk::CommandPool,
    queue: vk::Queue,
    queue_family_index: u32,
    /// One recorded command buffer per framebuffer
    recorded: Vec<vk::CommandBuffer>,
    device: crate::device::DeviceContext,
}

impl CommandPool {
    pub fn new(
        device: crate::device::DeviceContext,
        queue_family_index: u32,
        queue: vk::Queue,
        flags: vk::CommandPoolCreateFlags,
    ) -> Result<Self> {
        let command_pool_ci = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            p_next: ptr::null(),
            flags,
            queue_family_index,
            _marker: Default::default(),
        };
        let handle = unsafe { device.create_command_pool(&command_pool_ci, None) }
            .map_err(TabbyError::CommandPoolCreate)?;

        #[cfg(feature = "log-lifetimes")]
        trace!("Created VkCommandPool {:p}", handle);

        Ok(Self {
            handle,
            queue,
            queue_family_index,
            recorded: Vec::new(),
            device,
        })
    }

    pub fn handle(&self) -> vk::CommandPool {
        self.handle
    }

    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    pub fn get_device(&self) -> &crate::device::DeviceContext {
        &self.device
    }

    /// Allocate primary command buffers from the pool
    pub fn allocate(&self, count: u32) -> Result<Vec<vk::CommandBuffer>> {
        let allocate_info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            p_next: ptr::null(),
            command_pool: self.handle,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: count,
            _marker: Default::default(),
        };
        unsafe { self.device.allocate_command_buffers(&allocate_info) }
            .map_err(TabbyError::CommandBuffers)
    }

    pub fn free(&self, command_buffers: &[vk::CommandBuffer]) {
        if command_buffers.is_empty() {
            return;
        }
        unsafe {
            self.device
                .free_command_buffers(self.handle, command_buffers);
        }
    }

    /// Begins `command_buffer`, hands it to `record` then ends it
    pub fn record<F>(
        &self,
        command_buffer: vk::CommandBuffer,
        flags: vk::CommandBufferUsageFlags,
        record: F,
    ) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer) -> Result<()>,
    {
        let begin_info = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            p_next: ptr::null(),
            flags,
            p_inheritance_info: ptr::null(),
            _marker: Default::default(),
        };
        unsafe { self.device.begin_command_buffer(command_buffer, &begin_info) }
            .map_err(TabbyError::CommandBuffers)?;
        record(self.device.get_handle(), command_buffer)?;
        unsafe { self.device.end_command_buffer(command_buffer) }
            .map_err(TabbyError::CommandBuffers)
    }

    /// Records a single use command buffer, submits it and waits for the queue to go idle
    /// before freeing it
    pub fn submit_immediate<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let command_buffers = self.allocate(1)?;
        let result = self
            .record(
                command_buffers[0],
                vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
                |device, cmd| {
                    record(device, cmd);
                    Ok(())
                },
            )
            .and_then(|_| {
                let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
                unsafe {
                    self.device
                        .queue_submit(self.queue, &[submit_info], vk::Fence::null())?;
                    self.device.queue_wait_idle(self.queue)?;
                }
                Ok(())
            });
        self.free(&command_buffers);
        result
    }

    /// Records one primary command buffer per framebuffer, each running a full render pass
    /// which `record` fills in. Previously recorded buffers are freed first.
    pub fn record_render_passes<F>(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffers: &[vk::Framebuffer],
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
        mut record: F,
    ) -> Result<()>
    where
        F: FnMut(&ash::Device, vk::CommandBuffer, usize) -> Result<()>,
    {
        self.free_recorded();
        if framebuffers.is_empty() {
            return Ok(());
        }
        let command_buffers = self.allocate(framebuffers.len() as u32)?;
        for (index, (command_buffer, framebuffer)) in
            command_buffers.iter().zip(framebuffers.iter()).enumerate()
        {
            let outcome = self.record(
                *command_buffer,
                vk::CommandBufferUsageFlags::SIMULTANEOUS_USE,
                |device, cmd| {
                    let render_pass_info = vk::RenderPassBeginInfo::default()
                        .render_pass(render_pass)
                        .framebuffer(*framebuffer)
                        .render_area(vk::Rect2D {
                            offset: vk::Offset2D { x: 0, y: 0 },
                            extent,
                        })
                        .clear_values(clear_values);
                    unsafe {
                        device.cmd_begin_render_pass(
                            cmd,
                            &render_pass_info,
                            vk::SubpassContents::INLINE,
                        );
                    }
                    let recorded = record(device, cmd, index);
                    unsafe {
                        device.cmd_end_render_pass(cmd);
                    }
                    recorded
                },
            );
            if let Err(err) = outcome {
                self.free(&command_buffers);
                return Err(err);
            }
        }
        self.recorded = command_buffers;
        Ok(())
    }

    /// Static command buffers recorded by [`CommandPool::record_render_passes`]
    pub fn recorded(&self) -> &[vk::CommandBuffer] {
        &self.recorded
    }

    fn free_recorded(&mut self) {
        let recorded = std::mem::take(&mut self.recorded);
        self.free(&recorded);
    }
}

impl Destructible for CommandPool {
    fn destroy(&mut self) {
        if self.handle == vk::CommandPool::null() {
            return;
        }
        #[cfg(feature = "log-lifetimes")]
        trace!("Destroying VkCommandPool {:p}", self.handle);

        // destroying the pool releases every buffer allocated from it
        self.recorded.clear();
        unsafe {
            self.device.destroy_command_pool(self.handle, None);
        }
        self.handle = vk::CommandPool::null();
    }
}

#[cfg(feature = "raii")]
impl Drop for CommandPool {
    fn drop(&mut self) {
        self.destroy();
    }
}
