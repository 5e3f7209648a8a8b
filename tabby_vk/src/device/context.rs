use std::ffi::c_char;
use std::ops::Deref;
use std::sync::Arc;

use ash::vk;
use derivative::Derivative;
use tracing::debug;

use super::physical_device::{PhysicalDevice, QueueFamilyIndices};
use crate::{Result, TabbyError};

#[derive(Derivative)]
#[derivative(Debug)]
struct DeviceContextInner {
    #[derivative(Debug = "ignore")]
    handle: ash::Device,
    physical_device: PhysicalDevice,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    transfer_queue: vk::Queue,
    /// Distinct queue families, see [`QueueFamilyIndices::unique`]
    unique_families: Vec<u32>,
    sampler_anisotropy: bool,
    /// Keeps the instance alive for as long as the device is
    instance: crate::core::Instance,
}

impl Drop for DeviceContextInner {
    fn drop(&mut self) {
        #[cfg(feature = "log-lifetimes")]
        tracing::trace!("Destroying VkDevice {:p}", self.handle.handle());

        unsafe {
            self.handle.destroy_device(None);
        }
    }
}

/// Logical device along with the queues the engine submits to.
///
/// Clones share the same device. Every resource created from a context holds a clone,
/// so the device outlives them.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct DeviceContext {
    inner: Arc<DeviceContextInner>,
}

impl DeviceContext {
    pub fn new(instance: crate::core::Instance, physical_device: PhysicalDevice) -> Result<Self> {
        let families = physical_device.queue_families();
        let unique_families = families.unique();
        let priorities = [1.0f32];
        let queue_cis: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(*family)
                    .queue_priorities(&priorities)
            })
            .collect();

        let sampler_anisotropy = physical_device.features().sampler_anisotropy == vk::TRUE;
        let features = vk::PhysicalDeviceFeatures {
            geometry_shader: physical_device.features().geometry_shader,
            sampler_anisotropy: if sampler_anisotropy {
                vk::TRUE
            } else {
                vk::FALSE
            },
            ..Default::default()
        };
        let extension_ptrs: Vec<*const c_char> = physical_device
            .extensions()
            .iter()
            .map(|name| name.as_ptr())
            .collect();

        let device_ci = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_cis)
            .enabled_extension_names(&extension_ptrs)
            .enabled_features(&features);
        let handle = unsafe { instance.create_device(physical_device.handle(), &device_ci, None) }
            .map_err(TabbyError::DeviceCreate)?;

        #[cfg(feature = "log-lifetimes")]
        tracing::trace!("Creating VkDevice {:p}", handle.handle());

        let (graphics_queue, present_queue, transfer_queue) = unsafe {
            (
                handle.get_device_queue(families.graphics, 0),
                handle.get_device_queue(families.present, 0),
                handle.get_device_queue(families.transfer, 0),
            )
        };
        debug!(
            "Created device on {} with queue families {:?}",
            physical_device.name(),
            unique_families
        );

        Ok(Self {
            inner: Arc::new(DeviceContextInner {
                handle,
                physical_device,
                graphics_queue,
                present_queue,
                transfer_queue,
                unique_families,
                sampler_anisotropy,
                instance,
            }),
        })
    }

    /// Get reference to the underlying [`ash::Device`]
    pub fn get_handle(&self) -> &ash::Device {
        &self.inner.handle
    }

    pub fn get_instance(&self) -> &crate::core::Instance {
        &self.inner.instance
    }

    pub fn physical_device(&self) -> &PhysicalDevice {
        &self.inner.physical_device
    }

    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.inner.physical_device.queue_families()
    }

    /// Queue families shared by buffers created on this device
    pub fn unique_queue_families(&self) -> &[u32] {
        &self.inner.unique_families
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.inner.graphics_queue
    }

    pub fn present_queue(&self) -> vk::Queue {
        self.inner.present_queue
    }

    pub fn transfer_queue(&self) -> vk::Queue {
        self.inner.transfer_queue
    }

    /// Whether sampler anisotropy was enabled on the device
    pub fn sampler_anisotropy(&self) -> bool {
        self.inner.sampler_anisotropy
    }

    pub fn min_uniform_alignment(&self) -> vk::DeviceSize {
        self.inner
            .physical_device
            .limits()
            .min_uniform_buffer_offset_alignment
    }

    pub fn max_sampler_anisotropy(&self) -> f32 {
        self.inner.physical_device.limits().max_sampler_anisotropy
    }

    /// Blocks until the device has no work in flight
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.inner.handle.device_wait_idle()? };
        Ok(())
    }
}

impl Deref for DeviceContext {
    type Target = ash::Device;

    fn deref(&self) -> &Self::Target {
        &self.inner.handle
    }
}

impl PartialEq for DeviceContext {
    fn eq(&self, other: &Self) -> bool {
        self.inner.handle.handle() == other.inner.handle.handle()
    }
}

impl Eq for DeviceContext {}
