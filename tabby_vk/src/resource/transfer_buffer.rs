use std::ptr;

use ash::vk;
use derivative::Derivative;
#[cfg(feature = "log-lifetimes")]
use tracing::trace;

use crate::traits::Destructible;
use crate::{Result, TabbyError};

/// Fails with [`TabbyError::BufferTooSmall`] unless `requested` fits in `capacity`
pub fn check_capacity(capacity: vk::DeviceSize, requested: vk::DeviceSize) -> Result<()> {
	if requested > capacity {
		return Err(TabbyError::BufferTooSmall {
			capacity,
			requested,
		});
	}
	Ok(())
}

/// Resolves the region of a buffer to buffer copy.
///
/// No region, or a region of size zero, copies the whole source.
pub fn resolve_copy_region(
	src_size: vk::DeviceSize,
	dst_capacity: vk::DeviceSize,
	region: Option<vk::BufferCopy>,
) -> Result<vk::BufferCopy> {
	let mut region = region.unwrap_or_default();
	if region.size == 0 {
		region.size = src_size.saturating_sub(region.src_offset);
	}
	check_capacity(src_size, region.src_offset.saturating_add(region.size))?;
	check_capacity(dst_capacity, region.dst_offset.saturating_add(region.size))?;
	Ok(region)
}

/// A buffer together with its own memory allocation
#[derive(Derivative)]
#[derivative(Debug)]
pub struct TransferBuffer {
	handle: vk::Buffer,
	memory: vk::DeviceMemory,
	size: vk::DeviceSize,
	usage: vk::BufferUsageFlags,
	memory_flags: vk::MemoryPropertyFlags,
	#[derivative(Debug = "ignore")]
	device: crate::device::DeviceContext,
}

impl TransferBuffer {
	/// Allocates exactly `size` bytes. The buffer is shared concurrently between every
	/// queue family of the device.
	pub fn new(
		device: crate::device::DeviceContext,
		size: vk::DeviceSize,
		usage: vk::BufferUsageFlags,
		memory_flags: vk::MemoryPropertyFlags,
	) -> Result<Self> {
		let families = device.unique_queue_families();
		let concurrent = families.len() > 1;
		let buffer_ci = vk::BufferCreateInfo {
			s_type: vk::StructureType::BUFFER_CREATE_INFO,
			p_next: ptr::null(),
			flags: vk::BufferCreateFlags::empty(),
			size,
			usage,
			sharing_mode: if concurrent {
				vk::SharingMode::CONCURRENT
			} else {
				vk::SharingMode::EXCLUSIVE
			},
			queue_family_index_count: if concurrent { families.len() as u32 } else { 0 },
			p_queue_family_indices: if concurrent { families.as_ptr() } else { ptr::null() },
			_marker: Default::default(),
		};
		let handle =
			unsafe { device.create_buffer(&buffer_ci, None) }.map_err(TabbyError::BufferCreate)?;

		let requirements = unsafe { device.get_buffer_memory_requirements(handle) };
		let memory = super::memory::allocate(&device, &requirements, memory_flags)
			.and_then(|memory| {
				unsafe { device.bind_buffer_memory(handle, memory, 0) }
					.map(|_| memory)
					.map_err(|err| {
						unsafe { device.free_memory(memory, None) };
						TabbyError::BufferCreate(err)
					})
			})
			.map_err(|err| {
				unsafe { device.destroy_buffer(handle, None) };
				match err {
					TabbyError::Vk(result) => TabbyError::BufferCreate(result),
					err => err,
				}
			})?;

		#[cfg(feature = "log-lifetimes")]
		trace!("Creating VkBuffer {:p}", handle);

		Ok(Self {
			handle,
			memory,
			size,
			usage,
			memory_flags,
			device,
		})
	}

	/// Creates a device local buffer holding `data`, uploaded through a staging buffer which
	/// is destroyed once the copy completed
	pub fn new_device_local(
		pool: &crate::command::CommandPool,
		usage: vk::BufferUsageFlags,
		data: &[u8],
	) -> Result<Self> {
		let device = pool.get_device().clone();
		let size = data.len() as vk::DeviceSize;
		let mut staging = Self::new(
			device.clone(),
			size,
			vk::BufferUsageFlags::TRANSFER_SRC,
			vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
		)?;
		let result = staging.fill(data).and_then(|_| {
			let mut buffer = Self::new(
				device,
				size,
				usage | vk::BufferUsageFlags::TRANSFER_DST,
				vk::MemoryPropertyFlags::DEVICE_LOCAL,
			)?;
			match buffer.copy_from(pool, &staging, None) {
				Ok(()) => Ok(buffer),
				Err(err) => {
					buffer.destroy();
					Err(err)
				}
			}
		});
		staging.destroy();
		result
	}

	/// Host visible and coherent buffer intended to be written every frame
	pub fn new_host_visible(
		device: crate::device::DeviceContext,
		size: vk::DeviceSize,
		usage: vk::BufferUsageFlags,
	) -> Result<Self> {
		Self::new(
			device,
			size,
			usage,
			vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
		)
	}

	/// Map, copy and unmap `data` at the start of the buffer
	pub fn fill(&mut self, data: &[u8]) -> Result<()> {
		self.write(0, data)
	}

	/// Map, copy and unmap `data` at `offset`
	pub fn write(&mut self, offset: vk::DeviceSize, data: &[u8]) -> Result<()> {
		if !self
			.memory_flags
			.contains(vk::MemoryPropertyFlags::HOST_VISIBLE)
		{
			return Err(TabbyError::NotHostVisible);
		}
		let len = data.len() as vk::DeviceSize;
		check_capacity(self.size, offset.saturating_add(len))?;
		if data.is_empty() {
			return Ok(());
		}
		unsafe {
			let mapped = self
				.device
				.map_memory(self.memory, offset, len, vk::MemoryMapFlags::empty())?;
			ptr::copy_nonoverlapping(data.as_ptr(), mapped as *mut u8, data.len());
			self.device.unmap_memory(self.memory);
		}
		Ok(())
	}

	/// Copies `src` into this buffer on the pool's queue and waits for it to finish
	pub fn copy_from(
		&mut self,
		pool: &crate::command::CommandPool,
		src: &TransferBuffer,
		region: Option<vk::BufferCopy>,
	) -> Result<()> {
		let region = resolve_copy_region(src.size, self.size, region)?;
		let (src_handle, dst_handle) = (src.handle, self.handle);
		pool.submit_immediate(|device, cmd| unsafe {
			device.cmd_copy_buffer(cmd, src_handle, dst_handle, &[region]);
		})
	}

	pub fn handle(&self) -> vk::Buffer {
		self.handle
	}

	/// Capacity in bytes
	pub fn size(&self) -> vk::DeviceSize {
		self.size
	}

	pub fn usage(&self) -> vk::BufferUsageFlags {
		self.usage
	}
}

impl Destructible for TransferBuffer {
	fn destroy(&mut self) {
		if self.handle == vk::Buffer::null() {
			return;
		}
		#[cfg(feature = "log-lifetimes")]
		trace!("Destroying VkBuffer {:p}", self.handle);

		unsafe {
			self.device.destroy_buffer(self.handle, None);
			self.device.free_memory(self.memory, None);
		}
		self.handle = vk::Buffer::null();
		self.memory = vk::DeviceMemory::null();
	}
}

#[cfg(feature = "raii")]
impl Drop for TransferBuffer {
	fn drop(&mut self) {
		self.destroy();
	}
}
