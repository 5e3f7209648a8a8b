use std::ptr;

use ash::vk;
use derivative::Derivative;
use tracing::debug;
#[cfg(feature = "log-lifetimes")]
use tracing::trace;

use crate::traits::Destructible;
use crate::{Result, TabbyError};

/// Camera and lights
const UNIFORM_BUFFER_COUNT: u32 = 2;
/// Per object slots
const DYNAMIC_UNIFORM_BUFFER_COUNT: u32 = 1;

/// Pool sizes for a scene with `material_count` materials. Types without any descriptor
/// are left out.
pub fn pool_sizes(material_count: u32) -> Vec<vk::DescriptorPoolSize> {
	[
		(vk::DescriptorType::UNIFORM_BUFFER, UNIFORM_BUFFER_COUNT),
		(
			vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
			DYNAMIC_UNIFORM_BUFFER_COUNT,
		),
		(vk::DescriptorType::COMBINED_IMAGE_SAMPLER, material_count),
	]
	.into_iter()
	.filter(|(_, count)| *count > 0)
	.map(|(ty, descriptor_count)| vk::DescriptorPoolSize {
		ty,
		descriptor_count,
	})
	.collect()
}

/// Every set holds a single descriptor, so the set count is the descriptor count
pub fn max_sets(sizes: &[vk::DescriptorPoolSize]) -> u32 {
	sizes.iter().map(|size| size.descriptor_count).sum()
}

/// Owns the descriptor pool and hands out written descriptor sets
#[derive(Derivative)]
#[derivative(Debug)]
pub struct DescriptorAllocator {
	handle: vk::DescriptorPool,
	max_sets: u32,
	#[derivative(Debug = "ignore")]
	device: crate::device::DeviceContext,
}

impl DescriptorAllocator {
	pub fn new(device: crate::device::DeviceContext, material_count: u32) -> Result<Self> {
		let sizes = pool_sizes(material_count);
		let max_sets = max_sets(&sizes);
		let pool_ci = vk::DescriptorPoolCreateInfo {
			s_type: vk::StructureType::DESCRIPTOR_POOL_CREATE_INFO,
			p_next: ptr::null(),
			flags: vk::DescriptorPoolCreateFlags::empty(),
			max_sets,
			pool_size_count: sizes.len() as u32,
			p_pool_sizes: sizes.as_ptr(),
			_marker: Default::default(),
		};
		let handle = unsafe { device.create_descriptor_pool(&pool_ci, None) }
			.map_err(TabbyError::DescriptorPoolCreate)?;

		#[cfg(feature = "log-lifetimes")]
		trace!("Creating VkDescriptorPool {:p}", handle);
		debug!("Descriptor pool sized for {} materials, {} sets", material_count, max_sets);

		Ok(Self {
			handle,
			max_sets,
			device,
		})
	}

	pub fn handle(&self) -> vk::DescriptorPool {
		self.handle
	}

	pub fn max_sets(&self) -> u32 {
		self.max_sets
	}

	fn allocate(&self, layout: vk::DescriptorSetLayout) -> Result<vk::DescriptorSet> {
		let layouts = [layout];
		let allocate_info = vk::DescriptorSetAllocateInfo::default()
			.descriptor_pool(self.handle)
			.set_layouts(&layouts);
		let sets = unsafe { self.device.allocate_descriptor_sets(&allocate_info) }
			.map_err(TabbyError::DescriptorSetAllocate)?;
		sets.into_iter()
			.next()
			.ok_or(TabbyError::DescriptorSetAllocate(vk::Result::ERROR_OUT_OF_POOL_MEMORY))
	}

	/// Allocates a set whose binding 0 views `range` bytes of `buffer`
	pub fn allocate_buffer_set(
		&self,
		layout: vk::DescriptorSetLayout,
		descriptor_type: vk::DescriptorType,
		buffer: vk::Buffer,
		range: vk::DeviceSize,
	) -> Result<vk::DescriptorSet> {
		let set = self.allocate(layout)?;
		let buffer_info = [vk::DescriptorBufferInfo {
			buffer,
			offset: 0,
			range,
		}];
		let write = vk::WriteDescriptorSet::default()
			.dst_set(set)
			.dst_binding(0)
			.descriptor_type(descriptor_type)
			.buffer_info(&buffer_info);
		unsafe { self.device.update_descriptor_sets(&[write], &[]) };
		Ok(set)
	}

	/// Allocates a set whose binding 0 samples `view` through `sampler`
	pub fn allocate_sampler_set(
		&self,
		layout: vk::DescriptorSetLayout,
		view: vk::ImageView,
		sampler: vk::Sampler,
	) -> Result<vk::DescriptorSet> {
		let set = self.allocate(layout)?;
		let image_info = [vk::DescriptorImageInfo {
			sampler,
			image_view: view,
			image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
		}];
		let write = vk::WriteDescriptorSet::default()
			.dst_set(set)
			.dst_binding(0)
			.descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
			.image_info(&image_info);
		unsafe { self.device.update_descriptor_sets(&[write], &[]) };
		Ok(set)
	}
}

impl Destructible for DescriptorAllocator {
	fn destroy(&mut self) {
		if self.handle == vk::DescriptorPool::null() {
			return;
		}
		#[cfg(feature = "log-lifetimes")]
		trace!("Destroying VkDescriptorPool {:p}", self.handle);

		unsafe {
			self.device.destroy_descriptor_pool(self.handle, None);
		}
		self.handle = vk::DescriptorPool::null();
	}
}

#[cfg(feature = "raii")]
impl Drop for DescriptorAllocator {
	fn drop(&mut self) {
		self.destroy();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn counts(sizes: &[vk::DescriptorPoolSize]) -> Vec<(vk::DescriptorType, u32)> {
		sizes.iter().map(|size| (size.ty, size.descriptor_count)).collect()
	}

	#[test]
	fn one_sampler_per_material() {
		let sizes = pool_sizes(3);
		assert_eq!(
			counts(&sizes),
			vec![
				(vk::DescriptorType::UNIFORM_BUFFER, 2),
				(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC, 1),
				(vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 3),
			]
		);
		assert_eq!(max_sets(&sizes), 6);
	}

	#[test]
	fn no_materials_drops_sampler_size() {
		let sizes = pool_sizes(0);
		assert_eq!(sizes.len(), 2);
		assert_eq!(max_sets(&sizes), 3);
	}
}
