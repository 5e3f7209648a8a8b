use ash::vk;
use derivative::Derivative;
use tracing::{debug, info};
#[cfg(feature = "log-lifetimes")]
use tracing::trace;

use super::selection;
use crate::config::SwapchainSettings;
use crate::resource::ImageView;
use crate::traits::Destructible;
use crate::{Result, TabbyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainState {
    Uninitialized,
    Ready,
    OutOfDate,
    Destroyed,
}

impl SwapchainState {
    fn name(self) -> &'static str {
        match self {
            SwapchainState::Uninitialized => "Uninitialized",
            SwapchainState::Ready => "Ready",
            SwapchainState::OutOfDate => "OutOfDate",
            SwapchainState::Destroyed => "Destroyed",
        }
    }
}

/// Requests which move a swapchain between states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainEvent {
    Initialize,
    /// Acquire or present reported `ERROR_OUT_OF_DATE_KHR`, or the window was resized
    OutOfDate,
    Recreate,
    Destroy,
}

/// The only legal moves are
/// `Uninitialized -> Ready -> OutOfDate -> Ready` and `Ready -> Destroyed`
pub fn transition(state: SwapchainState, event: SwapchainEvent) -> Result<SwapchainState> {
    let next = match (state, event) {
        (SwapchainState::Uninitialized, SwapchainEvent::Initialize) => SwapchainState::Ready,
        (SwapchainState::Ready, SwapchainEvent::OutOfDate) => SwapchainState::OutOfDate,
        (SwapchainState::OutOfDate, SwapchainEvent::Recreate) => SwapchainState::Ready,
        (SwapchainState::Ready, SwapchainEvent::Destroy) => SwapchainState::Destroyed,
        (state, event) => {
            let to = match event {
                SwapchainEvent::Initialize | SwapchainEvent::Recreate => SwapchainState::Ready,
                SwapchainEvent::OutOfDate => SwapchainState::OutOfDate,
                SwapchainEvent::Destroy => SwapchainState::Destroyed,
            };
            return Err(TabbyError::InvalidSwapchainState {
                from: state.name(),
                to: to.name(),
            });
        }
    };
    Ok(next)
}

/// Result of acquiring the next image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquired {
    /// Suboptimal images are still handed out
    Image(u32),
    OutOfDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presented {
    Done,
    OutOfDate,
}

/// Owns the swapchain, its images and their views
#[derive(Derivative)]
#[derivative(Debug)]
pub struct SwapchainManager {
    handle: vk::SwapchainKHR,
    #[derivative(Debug = "ignore")]
    ext: ash::khr::swapchain::Device,
    images: Vec<vk::Image>,
    views: Vec<ImageView>,
    format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
    state: SwapchainState,
    settings: SwapchainSettings,
    #[derivative(Debug = "ignore")]
    device: crate::device::DeviceContext,
}

impl SwapchainManager {
    pub fn new(device: crate::device::DeviceContext, settings: SwapchainSettings) -> Self {
        let ext = ash::khr::swapchain::Device::new(device.get_instance().get_instance(), &device);
        Self {
            handle: vk::SwapchainKHR::null(),
            ext,
            images: Vec::new(),
            views: Vec::new(),
            format: vk::SurfaceFormatKHR::default(),
            present_mode: vk::PresentModeKHR::FIFO,
            extent: vk::Extent2D::default(),
            state: SwapchainState::Uninitialized,
            settings,
            device,
        }
    }

    /// Negotiates against `surface` and creates the swapchain with its image views
    pub fn initialize(&mut self, surface: &super::Surface, window: vk::Extent2D) -> Result<()> {
        let next = transition(self.state, SwapchainEvent::Initialize)?;
        self.build(surface, window)?;
        self.state = next;
        Ok(())
    }

    /// Flags the swapchain as stale, it stays usable for teardown only
    pub fn mark_out_of_date(&mut self) -> Result<()> {
        self.state = transition(self.state, SwapchainEvent::OutOfDate)?;
        Ok(())
    }

    /// Releases the old swapchain and builds a new one. The caller must have waited for
    /// the device to go idle.
    pub fn recreate(&mut self, surface: &super::Surface, window: vk::Extent2D) -> Result<()> {
        let next = transition(self.state, SwapchainEvent::Recreate)?;
        self.release();
        self.build(surface, window)?;
        self.state = next;
        info!(
            "Recreated swapchain at {}x{}",
            self.extent.width, self.extent.height
        );
        Ok(())
    }

    pub fn shutdown(&mut self) -> Result<()> {
        let next = transition(self.state, SwapchainEvent::Destroy)?;
        self.release();
        self.state = next;
        Ok(())
    }

    fn build(&mut self, surface: &super::Surface, window: vk::Extent2D) -> Result<()> {
        let physical_device = self.device.physical_device().handle();
        let capabilities = surface.capabilities(physical_device)?;
        let formats = surface.formats(physical_device)?;
        let present_modes = surface.present_modes(physical_device)?;
        if formats.is_empty() || present_modes.is_empty() {
            return Err(TabbyError::SwapchainUnsupported);
        }

        let format = selection::choose_surface_format(&formats, self.settings.surface_format)
            .ok_or(TabbyError::SwapchainUnsupported)?;
        let present_mode =
            selection::choose_present_mode(&present_modes, self.settings.present_mode);
        let extent = selection::choose_extent(&capabilities, window, self.settings.extent);
        let image_count =
            selection::choose_image_count(&capabilities, present_mode, self.settings.image_count);

        let families = self.device.queue_families();
        let shared = [families.graphics, families.present];
        let concurrent = families.graphics != families.present;
        let mut swapchain_ci = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle())
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);
        swapchain_ci = if concurrent {
            swapchain_ci
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&shared)
        } else {
            swapchain_ci.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let handle = unsafe { self.ext.create_swapchain(&swapchain_ci, None) }
            .map_err(TabbyError::SwapchainCreate)?;

        #[cfg(feature = "log-lifetimes")]
        trace!("Creating VkSwapchainKHR {:p}", handle);

        self.handle = handle;
        self.format = format;
        self.present_mode = present_mode;
        self.extent = extent;
        let images = match unsafe { self.ext.get_swapchain_images(handle) } {
            Ok(images) => images,
            Err(err) => {
                self.release();
                return Err(TabbyError::SwapchainCreate(err));
            }
        };
        self.images = images;
        for image in self.images.clone() {
            match ImageView::new(
                self.device.clone(),
                image,
                format.format,
                vk::ImageAspectFlags::COLOR,
            ) {
                Ok(view) => self.views.push(view),
                Err(err) => {
                    self.release();
                    return Err(err);
                }
            }
        }
        debug!(
            "Swapchain {:?} {:?} at {}x{} with {} images",
            format.format,
            present_mode,
            extent.width,
            extent.height,
            self.images.len()
        );
        Ok(())
    }

    /// Views are destroyed before the swapchain which owns their images
    fn release(&mut self) {
        for mut view in self.views.drain(..) {
            view.destroy();
        }
        self.images.clear();
        if self.handle != vk::SwapchainKHR::null() {
            #[cfg(feature = "log-lifetimes")]
            trace!("Destroying VkSwapchainKHR {:p}", self.handle);

            unsafe {
                self.ext.destroy_swapchain(self.handle, None);
            }
            self.handle = vk::SwapchainKHR::null();
        }
    }

    /// Waits without timeout for the next image. Out of date moves the swapchain into
    /// [`SwapchainState::OutOfDate`].
    pub fn acquire_next_image(&mut self, signal: vk::Semaphore) -> Result<Acquired> {
        let acquired = unsafe {
            self.ext
                .acquire_next_image(self.handle, u64::MAX, signal, vk::Fence::null())
        };
        match acquired {
            Ok((index, _suboptimal)) => Ok(Acquired::Image(index)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.mark_out_of_date()?;
                Ok(Acquired::OutOfDate)
            }
            Err(err) => Err(TabbyError::Draw(err)),
        }
    }

    pub fn present(
        &mut self,
        queue: vk::Queue,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> Result<Presented> {
        let wait_semaphores = [wait];
        let swapchains = [self.handle];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);
        match unsafe { self.ext.queue_present(queue, &present_info) } {
            Ok(_suboptimal) => Ok(Presented::Done),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.mark_out_of_date()?;
                Ok(Presented::OutOfDate)
            }
            Err(err) => Err(TabbyError::Draw(err)),
        }
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    pub fn state(&self) -> SwapchainState {
        self.state
    }

    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn image_views(&self) -> Vec<vk::ImageView> {
        self.views.iter().map(ImageView::handle).collect()
    }
}

impl Destructible for SwapchainManager {
    fn destroy(&mut self) {
        self.release();
        if self.state != SwapchainState::Uninitialized {
            self.state = SwapchainState::Destroyed;
        }
    }
}

#[cfg(feature = "raii")]
impl Drop for SwapchainManager {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle() {
        let mut state = SwapchainState::Uninitialized;
        for (event, expected) in [
            (SwapchainEvent::Initialize, SwapchainState::Ready),
            (SwapchainEvent::OutOfDate, SwapchainState::OutOfDate),
            (SwapchainEvent::Recreate, SwapchainState::Ready),
            (SwapchainEvent::OutOfDate, SwapchainState::OutOfDate),
            (SwapchainEvent::Recreate, SwapchainState::Ready),
            (SwapchainEvent::Destroy, SwapchainState::Destroyed),
        ] {
            state = transition(state, event).unwrap();
            assert_eq!(state, expected);
        }
    }

    #[test]
    fn illegal_moves() {
        assert_eq!(
            transition(SwapchainState::Ready, SwapchainEvent::Initialize),
            Err(TabbyError::InvalidSwapchainState {
                from: "Ready",
                to: "Ready"
            })
        );
        assert_eq!(
            transition(SwapchainState::Ready, SwapchainEvent::Recreate),
            Err(TabbyError::InvalidSwapchainState {
                from: "Ready",
                to: "Ready"
            })
        );
        assert!(transition(SwapchainState::Uninitialized, SwapchainEvent::OutOfDate).is_err());
        assert!(transition(SwapchainState::OutOfDate, SwapchainEvent::Destroy).is_err());
        assert_eq!(
            transition(SwapchainState::Destroyed, SwapchainEvent::Recreate),
            Err(TabbyError::InvalidSwapchainState {
                from: "Destroyed",
                to: "Ready"
            })
        );
    }
}
