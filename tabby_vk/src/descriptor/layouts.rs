use std::ptr;

use ash::vk;
use derivative::Derivative;
#[cfg(feature = "log-lifetimes")]
use tracing::trace;

use crate::traits::Destructible;
use crate::{Result, TabbyError};

/// Set indices as the shaders declare them
pub const CAMERA_SET: u32 = 0;
pub const MATERIAL_SET: u32 = 1;
pub const OBJECT_SET: u32 = 2;
pub const LIGHTS_SET: u32 = 3;

/// Descriptor type and stage of binding 0 for every set, in set order
pub const SET_BINDINGS: [(vk::DescriptorType, vk::ShaderStageFlags); 4] = [
	(vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::VERTEX),
	(
		vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
		vk::ShaderStageFlags::FRAGMENT,
	),
	(
		vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
		vk::ShaderStageFlags::VERTEX,
	),
	(vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::FRAGMENT),
];

/// The four set layouts shared by both pipelines
#[derive(Derivative)]
#[derivative(Debug)]
pub struct DescriptorLayouts {
	handles: [vk::DescriptorSetLayout; 4],
	#[derivative(Debug = "ignore")]
	device: crate::device::DeviceContext,
}

impl DescriptorLayouts {
	pub fn new(device: crate::device::DeviceContext) -> Result<Self> {
		let mut handles = [vk::DescriptorSetLayout::null(); 4];
		for (index, (descriptor_type, stage_flags)) in SET_BINDINGS.iter().enumerate() {
			let binding = vk::DescriptorSetLayoutBinding {
				binding: 0,
				descriptor_type: *descriptor_type,
				descriptor_count: 1,
				stage_flags: *stage_flags,
				p_immutable_samplers: ptr::null(),
				_marker: Default::default(),
			};
			let layout_ci = vk::DescriptorSetLayoutCreateInfo {
				s_type: vk::StructureType::DESCRIPTOR_SET_LAYOUT_CREATE_INFO,
				p_next: ptr::null(),
				flags: vk::DescriptorSetLayoutCreateFlags::empty(),
				binding_count: 1,
				p_bindings: &binding,
				_marker: Default::default(),
			};
			match unsafe { device.create_descriptor_set_layout(&layout_ci, None) } {
				Ok(handle) => {
					#[cfg(feature = "log-lifetimes")]
					trace!("Creating VkDescriptorSetLayout {:p}", handle);
					handles[index] = handle;
				}
				Err(err) => {
					for handle in handles.iter().take(index) {
						unsafe { device.destroy_descriptor_set_layout(*handle, None) };
					}
					return Err(TabbyError::DescriptorSetLayoutCreate(err));
				}
			}
		}
		Ok(Self { handles, device })
	}

	/// Layouts in set order
	pub fn handles(&self) -> &[vk::DescriptorSetLayout; 4] {
		&self.handles
	}

	pub fn camera(&self) -> vk::DescriptorSetLayout {
		self.handles[CAMERA_SET as usize]
	}

	pub fn material(&self) -> vk::DescriptorSetLayout {
		self.handles[MATERIAL_SET as usize]
	}

	pub fn object(&self) -> vk::DescriptorSetLayout {
		self.handles[OBJECT_SET as usize]
	}

	pub fn lights(&self) -> vk::DescriptorSetLayout {
		self.handles[LIGHTS_SET as usize]
	}
}

impl Destructible for DescriptorLayouts {
	fn destroy(&mut self) {
		for handle in self.handles.iter_mut() {
			if *handle == vk::DescriptorSetLayout::null() {
				continue;
			}
			#[cfg(feature = "log-lifetimes")]
			trace!("Destroying VkDescriptorSetLayout {:p}", *handle);
			unsafe {
				self.device.destroy_descriptor_set_layout(*handle, None);
			}
			*handle = vk::DescriptorSetLayout::null();
		}
	}
}

#[cfg(feature = "raii")]
impl Drop for DescriptorLayouts {
	fn drop(&mut self) {
		self.destroy();
	}
}
