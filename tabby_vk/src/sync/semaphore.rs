use std::ptr;

use ash::vk;
#[cfg(feature = "log-lifetimes")]
use tracing::trace;

use crate::traits::Destructible;
use crate::{Result, TabbyError};

#[derive(Debug)]
pub struct BinarySemaphore {
    handle: vk::Semaphore,
    device: crate::device::DeviceContext,
}

impl BinarySemaphore {
    pub fn new(device: crate::device::DeviceContext) -> Result<Self> {
        let handle = unsafe {
            device.create_semaphore(
                &vk::SemaphoreCreateInfo {
                    s_type: vk::StructureType::SEMAPHORE_CREATE_INFO,
                    p_next: ptr::null(),
                    flags: vk::SemaphoreCreateFlags::empty(),
                    _marker: Default::default(),
                },
                None,
            )
        }
        .map_err(TabbyError::SemaphoreCreate)?;

        #[cfg(feature = "log-lifetimes")]
        trace!("Creating binary VkSemaphore {:p}", handle);

        Ok(Self { handle, device })
    }

    pub fn handle(&self) -> vk::Semaphore {
        self.handle
    }
}

impl Destructible for BinarySemaphore {
    fn destroy(&mut self) {
        if self.handle == vk::Semaphore::null() {
            return;
        }
        #[cfg(feature = "log-lifetimes")]
        trace!("Destroying binary VkSemaphore {:p}", self.handle);

        unsafe {
            self.device.destroy_semaphore(self.handle, None);
        }
        self.handle = vk::Semaphore::null();
    }
}

#[cfg(feature = "raii")]
impl Drop for BinarySemaphore {
    fn drop(&mut self) {
        self.destroy();
    }
}
