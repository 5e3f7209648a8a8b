use std::ptr;

use ash::vk;
use derivative::Derivative;
use tracing::warn;
#[cfg(feature = "log-lifetimes")]
use tracing::trace;

use crate::config::SamplerSettings;
use crate::traits::Destructible;
use crate::{Result, TabbyError};

/// Anisotropy actually applied: the requested amount clamped to the device limit, or
/// [`None`] when the device feature is missing
pub fn effective_anisotropy(
	requested: Option<f32>,
	supported: bool,
	device_max: f32,
) -> Option<f32> {
	let requested = requested?;
	if !supported {
		return None;
	}
	Some(requested.min(device_max).max(1.0))
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct Sampler {
	handle: vk::Sampler,
	#[derivative(Debug = "ignore")]
	device: crate::device::DeviceContext,
}

impl Sampler {
	pub fn new(device: crate::device::DeviceContext, settings: &SamplerSettings) -> Result<Self> {
		let anisotropy = effective_anisotropy(
			settings.max_anisotropy,
			device.sampler_anisotropy(),
			device.max_sampler_anisotropy(),
		);
		if settings.max_anisotropy.is_some() && anisotropy.is_none() {
			warn!("Sampler anisotropy is unsupported, falling back to none");
		}
		let create_info = vk::SamplerCreateInfo {
			s_type: vk::StructureType::SAMPLER_CREATE_INFO,
			p_next: ptr::null(),
			flags: vk::SamplerCreateFlags::empty(),
			mag_filter: settings.filter,
			min_filter: settings.filter,
			mipmap_mode: vk::SamplerMipmapMode::LINEAR,
			address_mode_u: settings.address_mode,
			address_mode_v: settings.address_mode,
			address_mode_w: settings.address_mode,
			mip_lod_bias: 0.0,
			anisotropy_enable: if anisotropy.is_some() { vk::TRUE } else { vk::FALSE },
			max_anisotropy: anisotropy.unwrap_or(1.0),
			compare_enable: vk::FALSE,
			compare_op: vk::CompareOp::ALWAYS,
			min_lod: 0.0,
			max_lod: 0.0,
			border_color: vk::BorderColor::INT_OPAQUE_BLACK,
			unnormalized_coordinates: vk::FALSE,
			_marker: Default::default(),
		};
		let handle = unsafe { device.create_sampler(&create_info, None) }
			.map_err(TabbyError::SamplerCreate)?;

		#[cfg(feature = "log-lifetimes")]
		trace!("Creating VkSampler {:p}", handle);

		Ok(Self { handle, device })
	}

	pub fn handle(&self) -> vk::Sampler {
		self.handle
	}
}

impl Destructible for Sampler {
	fn destroy(&mut self) {
		if self.handle == vk::Sampler::null() {
			return;
		}
		#[cfg(feature = "log-lifetimes")]
		trace!("Destroying VkSampler {:p}", self.handle);

		unsafe {
			self.device.destroy_sampler(self.handle, None);
		}
		self.handle = vk::Sampler::null();
	}
}

#[cfg(feature = "raii")]
impl Drop for Sampler {
	fn drop(&mut self) {
		self.destroy();
	}
}
