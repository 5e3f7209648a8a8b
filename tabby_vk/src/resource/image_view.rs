use std::ptr;

use ash::vk;
use derivative::Derivative;
#[cfg(feature = "log-lifetimes")]
use tracing::trace;

use crate::traits::Destructible;
use crate::{Result, TabbyError};

#[derive(Derivative)]
#[derivative(Debug)]
pub struct ImageView {
	handle: vk::ImageView,
	#[derivative(Debug = "ignore")]
	device: crate::device::DeviceContext,
}

impl ImageView {
	/// Creates a 2D view covering the single mip level and layer of `image`
	pub fn new(
		device: crate::device::DeviceContext,
		image: vk::Image,
		format: vk::Format,
		aspect_mask: vk::ImageAspectFlags,
	) -> Result<Self> {
		let create_info = vk::ImageViewCreateInfo {
			s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
			p_next: ptr::null(),
			flags: vk::ImageViewCreateFlags::empty(),
			image,
			view_type: vk::ImageViewType::TYPE_2D,
			format,
			components: vk::ComponentMapping::default(),
			subresource_range: vk::ImageSubresourceRange {
				aspect_mask,
				base_mip_level: 0,
				level_count: 1,
				base_array_layer: 0,
				layer_count: 1,
			},
			_marker: Default::default(),
		};
		let handle = unsafe { device.create_image_view(&create_info, None) }
			.map_err(TabbyError::ImageViewCreate)?;

		#[cfg(feature = "log-lifetimes")]
		trace!("Creating VkImageView {:p}", handle);

		Ok(Self { handle, device })
	}

	pub fn handle(&self) -> vk::ImageView {
		self.handle
	}
}

impl Destructible for ImageView {
	fn destroy(&mut self) {
		if self.handle == vk::ImageView::null() {
			return;
		}
		#[cfg(feature = "log-lifetimes")]
		trace!("Destroying VkImageView {:p}", self.handle);

		unsafe {
			self.device.destroy_image_view(self.handle, None);
		}
		self.handle = vk::ImageView::null();
	}
}

#[cfg(feature = "raii")]
impl Drop for ImageView {
	fn drop(&mut self) {
		self.destroy();
	}
}
