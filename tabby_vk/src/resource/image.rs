use std::ptr;

use ash::vk;
use derivative::Derivative;
#[cfg(feature = "log-lifetimes")]
use tracing::trace;

use crate::traits::Destructible;
use crate::{Result, TabbyError};

/// A 2D image with a single mip level and layer, owning its memory
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ResourceImage {
    handle: vk::Image,
    memory: vk::DeviceMemory,
    #[derivative(Debug = "ignore")]
    device: crate::device::DeviceContext,
}

impl ResourceImage {
    pub fn new(
        device: crate::device::DeviceContext,
        width: u32,
        height: u32,
        format: vk::Format,
        tiling: vk::ImageTiling,
        usage: vk::ImageUsageFlags,
        memory_flags: vk::MemoryPropertyFlags,
    ) -> Result<Self> {
        let image_ci = vk::ImageCreateInfo {
            s_type: vk::StructureType::IMAGE_CREATE_INFO,
            p_next: ptr::null(),
            flags: vk::ImageCreateFlags::empty(),
            image_type: vk::ImageType::TYPE_2D,
            format,
            extent: vk::Extent3D {
                width,
                height,
                depth: 1,
            },
            mip_levels: 1,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            queue_family_index_count: 0,
            p_queue_family_indices: ptr::null(),
            initial_layout: vk::ImageLayout::UNDEFINED,
            _marker: Default::default(),
        };
        let handle =
            unsafe { device.create_image(&image_ci, None) }.map_err(TabbyError::ImageCreate)?;

        let requirements = unsafe { device.get_image_memory_requirements(handle) };
        let memory = match super::memory::allocate(&device, &requirements, memory_flags) {
            Ok(memory) => memory,
            Err(err) => {
                unsafe { device.destroy_image(handle, None) };
                return Err(err);
            }
        };
        if let Err(err) = unsafe { device.bind_image_memory(handle, memory, 0) } {
            unsafe {
                device.free_memory(memory, None);
                device.destroy_image(handle, None);
            }
            return Err(TabbyError::ImageCreate(err));
        }

        #[cfg(feature = "log-lifetimes")]
        trace!("Creating VkImage {:p}", handle);

        Ok(Self {
            handle,
            memory,
            device,
        })
    }

    /// Transitions the whole image from `old` to `new` with a pipeline barrier, see
    /// [`layout_transition`](super::layout::layout_transition) for what is supported
    pub fn transition_layout(
        &self,
        pool: &crate::command::CommandPool,
        format: vk::Format,
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    ) -> Result<()> {
        let transition = super::layout::layout_transition(format, old, new)?;
        let barrier = vk::ImageMemoryBarrier {
            s_type: vk::StructureType::IMAGE_MEMORY_BARRIER,
            p_next: ptr::null(),
            src_access_mask: transition.src_access,
            dst_access_mask: transition.dst_access,
            old_layout: old,
            new_layout: new,
            src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            image: self.handle,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: transition.aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            _marker: Default::default(),
        };
        pool.submit_immediate(|device, cmd| unsafe {
            device.cmd_pipeline_barrier(
                cmd,
                transition.src_stage,
                transition.dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        })
    }

    /// Copies tightly packed texels from `buffer`. The image must be in
    /// `TRANSFER_DST_OPTIMAL`.
    pub fn copy_from_buffer(
        &self,
        pool: &crate::command::CommandPool,
        buffer: &super::TransferBuffer,
        width: u32,
        height: u32,
    ) -> Result<()> {
        let region = vk::BufferImageCopy {
            buffer_offset: 0,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            },
            image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
            image_extent: vk::Extent3D {
                width,
                height,
                depth: 1,
            },
        };
        let (src, dst) = (buffer.handle(), self.handle);
        pool.submit_immediate(|device, cmd| unsafe {
            device.cmd_copy_buffer_to_image(
                cmd,
                src,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        })
    }

    pub fn handle(&self) -> vk::Image {
        self.handle
    }

}

impl Destructible for ResourceImage {
    fn destroy(&mut self) {
        if self.handle == vk::Image::null() {
            return;
        }
        #[cfg(feature = "log-lifetimes")]
        trace!("Destroying VkImage {:p}", self.handle);

        unsafe {
            self.device.destroy_image(self.handle, None);
            self.device.free_memory(self.memory, None);
        }
        self.handle = vk::Image::null();
        self.memory = vk::DeviceMemory::null();
    }
}

#[cfg(feature = "raii")]
impl Drop for ResourceImage {
    fn drop(&mut self) {
        self.destroy();
    }
}
