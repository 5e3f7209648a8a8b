//! Recording backend for tests
use std::cell::RefCell;
use std::rc::Rc;

use tabby_vk::ash::vk::{self, Handle};
use tabby_vk::command::DrawList;
use tabby_vk::resource::transfer_buffer::check_capacity;
use tabby_vk::traits::Destructible;
use tabby_vk::{Result, TabbyError};

use crate::backend::{GpuBuffer, GpuTexture, RenderBackend, UniformBinding, check_geometry_usage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    CreateGeometry { handle: vk::Buffer, len: usize },
    CreatePlaceholder(vk::Buffer),
    CreateUniform { handle: vk::Buffer, size: vk::DeviceSize },
    CreateTexture { width: u32, height: u32 },
    DestroyBuffer(vk::Buffer),
    DestroyTexture(vk::ImageView),
    WaitIdle,
    RebuildPool(u32),
    AllocateUniform { binding: UniformBinding, range: vk::DeviceSize },
    AllocateMaterial(vk::ImageView),
    RebuildGraphics { instancing: bool },
    ClearDraws,
}

pub type Log = Rc<RefCell<Vec<Event>>>;

#[derive(Debug)]
pub struct FakeBuffer {
    handle: vk::Buffer,
    bytes: Vec<u8>,
    log: Log,
}

impl FakeBuffer {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Destructible for FakeBuffer {
    fn destroy(&mut self) {
        if self.handle == vk::Buffer::null() {
            return;
        }
        self.log.borrow_mut().push(Event::DestroyBuffer(self.handle));
        self.handle = vk::Buffer::null();
    }
}

impl GpuBuffer for FakeBuffer {
    fn handle(&self) -> vk::Buffer {
        self.handle
    }

    fn size(&self) -> vk::DeviceSize {
        self.bytes.len() as vk::DeviceSize
    }

    fn write(&mut self, offset: vk::DeviceSize, data: &[u8]) -> Result<()> {
        check_capacity(self.size(), offset + data.len() as vk::DeviceSize)?;
        let start = offset as usize;
        self.bytes[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeTexture {
    view: vk::ImageView,
    log: Log,
}

impl Destructible for FakeTexture {
    fn destroy(&mut self) {
        if self.view == vk::ImageView::null() {
            return;
        }
        self.log.borrow_mut().push(Event::DestroyTexture(self.view));
        self.view = vk::ImageView::null();
    }
}

impl GpuTexture for FakeTexture {
    fn view(&self) -> vk::ImageView {
        self.view
    }

    fn sampler(&self) -> vk::Sampler {
        vk::Sampler::from_raw(self.view.as_raw())
    }
}

#[derive(Debug)]
pub struct FakeBackend {
    pub log: Log,
    pub min_alignment: vk::DeviceSize,
    pub extent: vk::Extent2D,
    /// Index buffer uploads fail while set
    pub fail_index_uploads: bool,
    /// Graphics rebuilds fail while set
    pub fail_graphics: bool,
    /// Uniform buffer creation fails while set
    pub fail_uniforms: bool,
    pub draw_list: DrawList,
    pub instancing: bool,
    next_handle: u64,
}

impl FakeBackend {
    pub fn new(min_alignment: vk::DeviceSize) -> Self {
        Self {
            log: Log::default(),
            min_alignment,
            extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            fail_index_uploads: false,
            fail_graphics: false,
            fail_uniforms: false,
            draw_list: DrawList::new(),
            instancing: false,
            next_handle: 1,
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.borrow().clone()
    }

    pub fn clear_events(&self) {
        self.log.borrow_mut().clear();
    }

    fn buffer(&mut self, len: usize) -> FakeBuffer {
        let handle = vk::Buffer::from_raw(self.next_handle);
        self.next_handle += 1;
        FakeBuffer {
            handle,
            bytes: vec![0; len],
            log: self.log.clone(),
        }
    }

    fn push(&self, event: Event) {
        self.log.borrow_mut().push(event);
    }
}

impl RenderBackend for FakeBackend {
    type Buffer = FakeBuffer;
    type Texture = FakeTexture;

    fn min_uniform_alignment(&self) -> vk::DeviceSize {
        self.min_alignment
    }

    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn create_geometry_buffer(
        &mut self,
        usage: vk::BufferUsageFlags,
        data: &[u8],
    ) -> Result<FakeBuffer> {
        check_geometry_usage(usage)?;
        if self.fail_index_uploads && usage.contains(vk::BufferUsageFlags::INDEX_BUFFER) {
            return Err(TabbyError::BufferCreate(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        }
        let mut buffer = self.buffer(data.len());
        buffer.bytes.copy_from_slice(data);
        self.push(Event::CreateGeometry {
            handle: buffer.handle,
            len: data.len(),
        });
        Ok(buffer)
    }

    fn create_placeholder_buffer(&mut self, _usage: vk::BufferUsageFlags) -> Result<FakeBuffer> {
        let buffer = self.buffer(1);
        self.push(Event::CreatePlaceholder(buffer.handle));
        Ok(buffer)
    }

    fn create_uniform_buffer(&mut self, size: vk::DeviceSize) -> Result<FakeBuffer> {
        if self.fail_uniforms {
            return Err(TabbyError::BufferCreate(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        }
        let buffer = self.buffer(size as usize);
        self.push(Event::CreateUniform {
            handle: buffer.handle,
            size,
        });
        Ok(buffer)
    }

    fn create_texture(&mut self, width: u32, height: u32, _pixels: &[u8]) -> Result<FakeTexture> {
        let view = vk::ImageView::from_raw(self.next_handle);
        self.next_handle += 1;
        self.push(Event::CreateTexture { width, height });
        Ok(FakeTexture {
            view,
            log: self.log.clone(),
        })
    }

    fn wait_idle(&self) -> Result<()> {
        self.push(Event::WaitIdle);
        Ok(())
    }

    fn rebuild_descriptor_pool(&mut self, material_count: u32) -> Result<()> {
        self.push(Event::RebuildPool(material_count));
        Ok(())
    }

    fn allocate_uniform_set(
        &mut self,
        binding: UniformBinding,
        _buffer: &FakeBuffer,
        range: vk::DeviceSize,
    ) -> Result<vk::DescriptorSet> {
        self.push(Event::AllocateUniform { binding, range });
        let set = vk::DescriptorSet::from_raw(self.next_handle);
        self.next_handle += 1;
        Ok(set)
    }

    fn allocate_material_set(&mut self, texture: &FakeTexture) -> Result<vk::DescriptorSet> {
        self.push(Event::AllocateMaterial(texture.view));
        let set = vk::DescriptorSet::from_raw(self.next_handle);
        self.next_handle += 1;
        Ok(set)
    }

    fn rebuild_graphics(&mut self, instancing: bool, draw_list: DrawList) -> Result<()> {
        if self.fail_graphics {
            return Err(TabbyError::PipelineCreate(vk::Result::ERROR_UNKNOWN));
        }
        self.push(Event::RebuildGraphics { instancing });
        self.instancing = instancing;
        self.draw_list = draw_list;
        Ok(())
    }

    fn clear_draws(&mut self) -> Result<()> {
        self.push(Event::ClearDraws);
        self.draw_list.clear();
        Ok(())
    }
}
