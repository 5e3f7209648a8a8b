//! The GPU operations the scene needs, behind one trait.
//!
//! [`GraphicsContext`] is the real implementation. Scene code only talks to
//! [`RenderBackend`], which keeps actualize and draw list generation testable without a
//! device.
use std::fmt::Debug;

use tabby_vk::GraphicsContext;
use tabby_vk::ash::vk;
use tabby_vk::command::DrawList;
use tabby_vk::resource::{Texture, TransferBuffer};
use tabby_vk::traits::Destructible;
use tabby_vk::{Result, TabbyError};

/// Buffer owned by the scene
pub trait GpuBuffer: Destructible + Debug {
    fn handle(&self) -> vk::Buffer;

    /// Capacity in bytes
    fn size(&self) -> vk::DeviceSize;

    /// Writes host visible memory
    fn write(&mut self, offset: vk::DeviceSize, data: &[u8]) -> Result<()>;
}

/// Sampled texture owned by a material
pub trait GpuTexture: Destructible + Debug {
    fn view(&self) -> vk::ImageView;

    fn sampler(&self) -> vk::Sampler;
}

/// Contents of the combined geometry buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Vertex,
    Index,
    Instance,
}

impl GeometryKind {
    pub fn usage(self) -> vk::BufferUsageFlags {
        match self {
            GeometryKind::Vertex | GeometryKind::Instance => vk::BufferUsageFlags::VERTEX_BUFFER,
            GeometryKind::Index => vk::BufferUsageFlags::INDEX_BUFFER,
        }
    }
}

/// Geometry buffers are vertex or index buffers, never both and never neither
pub fn check_geometry_usage(usage: vk::BufferUsageFlags) -> Result<()> {
    let vertex = usage.contains(vk::BufferUsageFlags::VERTEX_BUFFER);
    let index = usage.contains(vk::BufferUsageFlags::INDEX_BUFFER);
    if vertex == index {
        return Err(TabbyError::UnknownBufferType);
    }
    Ok(())
}

/// Uniform buffer backed descriptor sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformBinding {
    Camera,
    Lights,
    /// Per object slots, bound with a dynamic offset
    Object,
}

pub trait RenderBackend {
    type Buffer: GpuBuffer;
    type Texture: GpuTexture;

    fn min_uniform_alignment(&self) -> vk::DeviceSize;

    /// Current swapchain extent
    fn extent(&self) -> vk::Extent2D;

    /// Device local buffer holding `data`, uploaded through staging
    fn create_geometry_buffer(
        &mut self,
        usage: vk::BufferUsageFlags,
        data: &[u8],
    ) -> Result<Self::Buffer>;

    /// One byte buffer bound in place of an empty geometry buffer
    fn create_placeholder_buffer(&mut self, usage: vk::BufferUsageFlags) -> Result<Self::Buffer>;

    /// Host visible uniform buffer
    fn create_uniform_buffer(&mut self, size: vk::DeviceSize) -> Result<Self::Buffer>;

    fn create_texture(&mut self, width: u32, height: u32, pixels: &[u8]) -> Result<Self::Texture>;

    fn wait_idle(&self) -> Result<()>;

    /// Replaces the descriptor pool. Sets from the old pool become invalid.
    fn rebuild_descriptor_pool(&mut self, material_count: u32) -> Result<()>;

    fn allocate_uniform_set(
        &mut self,
        binding: UniformBinding,
        buffer: &Self::Buffer,
        range: vk::DeviceSize,
    ) -> Result<vk::DescriptorSet>;

    fn allocate_material_set(&mut self, texture: &Self::Texture) -> Result<vk::DescriptorSet>;

    /// Rebuilds pipelines and static command buffers from `draw_list`
    fn rebuild_graphics(&mut self, instancing: bool, draw_list: DrawList) -> Result<()>;

    fn clear_draws(&mut self) -> Result<()>;
}

impl GpuBuffer for TransferBuffer {
    fn handle(&self) -> vk::Buffer {
        TransferBuffer::handle(self)
    }

    fn size(&self) -> vk::DeviceSize {
        TransferBuffer::size(self)
    }

    fn write(&mut self, offset: vk::DeviceSize, data: &[u8]) -> Result<()> {
        TransferBuffer::write(self, offset, data)
    }
}

impl GpuTexture for Texture {
    fn view(&self) -> vk::ImageView {
        Texture::view(self)
    }

    fn sampler(&self) -> vk::Sampler {
        Texture::sampler(self)
    }
}

impl RenderBackend for GraphicsContext {
    type Buffer = TransferBuffer;
    type Texture = Texture;

    fn min_uniform_alignment(&self) -> vk::DeviceSize {
        self.device().min_uniform_alignment()
    }

    fn extent(&self) -> vk::Extent2D {
        self.swapchain().extent()
    }

    fn create_geometry_buffer(
        &mut self,
        usage: vk::BufferUsageFlags,
        data: &[u8],
    ) -> Result<TransferBuffer> {
        check_geometry_usage(usage)?;
        TransferBuffer::new_device_local(self.transfer_pool(), usage, data)
    }

    fn create_placeholder_buffer(&mut self, usage: vk::BufferUsageFlags) -> Result<TransferBuffer> {
        TransferBuffer::new(
            self.device().clone(),
            1,
            usage,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )
    }

    fn create_uniform_buffer(&mut self, size: vk::DeviceSize) -> Result<TransferBuffer> {
        TransferBuffer::new_host_visible(
            self.device().clone(),
            size,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
        )
    }

    fn create_texture(&mut self, width: u32, height: u32, pixels: &[u8]) -> Result<Texture> {
        Texture::from_rgba(
            self.graphics_pool(),
            self.sampler_settings(),
            width,
            height,
            pixels,
        )
    }

    fn wait_idle(&self) -> Result<()> {
        self.finish_drawing()
    }

    fn rebuild_descriptor_pool(&mut self, material_count: u32) -> Result<()> {
        self.recreate_descriptor_pool(material_count)
    }

    fn allocate_uniform_set(
        &mut self,
        binding: UniformBinding,
        buffer: &TransferBuffer,
        range: vk::DeviceSize,
    ) -> Result<vk::DescriptorSet> {
        let layouts = self.descriptor_layouts();
        let (layout, descriptor_type) = match binding {
            UniformBinding::Camera => (layouts.camera(), vk::DescriptorType::UNIFORM_BUFFER),
            UniformBinding::Lights => (layouts.lights(), vk::DescriptorType::UNIFORM_BUFFER),
            UniformBinding::Object => (
                layouts.object(),
                vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            ),
        };
        self.descriptor_allocator().allocate_buffer_set(
            layout,
            descriptor_type,
            buffer.handle(),
            range,
        )
    }

    fn allocate_material_set(&mut self, texture: &Texture) -> Result<vk::DescriptorSet> {
        self.descriptor_allocator().allocate_sampler_set(
            self.descriptor_layouts().material(),
            texture.view(),
            texture.sampler(),
        )
    }

    fn rebuild_graphics(&mut self, instancing: bool, draw_list: DrawList) -> Result<()> {
        GraphicsContext::rebuild_graphics(self, instancing, draw_list)
    }

    fn clear_draws(&mut self) -> Result<()> {
        GraphicsContext::clear_draws(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_usage_must_be_vertex_or_index() {
        for kind in [GeometryKind::Vertex, GeometryKind::Index, GeometryKind::Instance] {
            assert!(check_geometry_usage(kind.usage()).is_ok());
        }
        assert_eq!(
            check_geometry_usage(vk::BufferUsageFlags::UNIFORM_BUFFER),
            Err(TabbyError::UnknownBufferType)
        );
        assert_eq!(
            check_geometry_usage(
                vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::INDEX_BUFFER
            ),
            Err(TabbyError::UnknownBufferType)
        );
    }
}
