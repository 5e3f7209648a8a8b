use std::ffi::CString;

use ash::vk;
use derivative::Derivative;
#[cfg(feature = "log-lifetimes")]
use tracing::trace;

use crate::traits::Destructible;
use crate::{Result, TabbyError};

/// Anything which can be presented to: reports its instance extensions, creates a
/// [`vk::SurfaceKHR`] and knows its own size in pixels.
pub trait SurfaceProvider {
    /// Instance extensions needed to create a surface for this window
    fn required_extensions(&self) -> Result<Vec<CString>>;

    fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance)
        -> Result<vk::SurfaceKHR>;

    /// Width in pixels
    fn width(&self) -> u32;

    /// Height in pixels
    fn height(&self) -> u32;
}

#[cfg(feature = "winit")]
impl SurfaceProvider for winit::window::Window {
    fn required_extensions(&self) -> Result<Vec<CString>> {
        use raw_window_handle::HasDisplayHandle;
        let display_handle = self
            .display_handle()
            .map_err(|_| TabbyError::SurfaceCreate(vk::Result::ERROR_INITIALIZATION_FAILED))?;
        let extensions = ash_window::enumerate_required_extensions(display_handle.as_raw())?;
        Ok(extensions
            .iter()
            // ash-window hands out static nul-terminated names
            .map(|name| unsafe { crate::util::wrap_c_str(*name) })
            .collect())
    }

    fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<vk::SurfaceKHR> {
        use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
        let display_handle = self
            .display_handle()
            .map_err(|_| TabbyError::SurfaceCreate(vk::Result::ERROR_INITIALIZATION_FAILED))?;
        let window_handle = self
            .window_handle()
            .map_err(|_| TabbyError::SurfaceCreate(vk::Result::ERROR_INITIALIZATION_FAILED))?;
        unsafe {
            ash_window::create_surface(
                entry,
                instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
        }
        .map_err(TabbyError::SurfaceCreate)
    }

    fn width(&self) -> u32 {
        self.inner_size().width
    }

    fn height(&self) -> u32 {
        self.inner_size().height
    }
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct Surface {
    handle: vk::SurfaceKHR,
    #[derivative(Debug = "ignore")]
    ext: ash::khr::surface::Instance,
    instance: crate::core::Instance,
}

impl Surface {
    pub fn new<T: SurfaceProvider + ?Sized>(
        instance: crate::core::Instance,
        provider: &T,
    ) -> Result<Self> {
        let ext = ash::khr::surface::Instance::new(instance.get_entry(), instance.get_instance());
        let handle = provider.create_surface(instance.get_entry(), instance.get_instance())?;

        #[cfg(feature = "log-lifetimes")]
        trace!("Creating VkSurface {:p}", handle);

        Ok(Self {
            handle,
            ext,
            instance,
        })
    }

    /// Whether a queue family of `physical_device` can present to this surface
    pub fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
    ) -> Result<bool> {
        Ok(unsafe {
            self.ext.get_physical_device_surface_support(
                physical_device,
                queue_family_index,
                self.handle,
            )?
        })
    }

    pub fn capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<vk::SurfaceCapabilitiesKHR> {
        Ok(unsafe {
            self.ext
                .get_physical_device_surface_capabilities(physical_device, self.handle)?
        })
    }

    pub fn formats(&self, physical_device: vk::PhysicalDevice) -> Result<Vec<vk::SurfaceFormatKHR>> {
        Ok(unsafe {
            self.ext
                .get_physical_device_surface_formats(physical_device, self.handle)?
        })
    }

    pub fn present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Vec<vk::PresentModeKHR>> {
        Ok(unsafe {
            self.ext
                .get_physical_device_surface_present_modes(physical_device, self.handle)?
        })
    }

    /// Get a copy over the underlying [SurfaceKHR](vk::SurfaceKHR)
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    pub fn get_instance(&self) -> &crate::core::Instance {
        &self.instance
    }
}

impl Destructible for Surface {
    fn destroy(&mut self) {
        if self.handle == vk::SurfaceKHR::null() {
            return;
        }
        #[cfg(feature = "log-lifetimes")]
        trace!("Destroying VkSurface {:p}", self.handle);

        unsafe {
            self.ext.destroy_surface(self.handle, None);
        }
        self.handle = vk::SurfaceKHR::null();
    }
}

#[cfg(feature = "raii")]
impl Drop for Surface {
    fn drop(&mut self) {
        self.destroy();
    }
}
