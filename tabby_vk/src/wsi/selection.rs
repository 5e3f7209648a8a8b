//! Swapchain negotiation against what a surface reports
use ash::vk;

/// Picks the surface format.
///
/// A lone `UNDEFINED` entry means the surface takes anything, so `desired` is granted as is.
/// Otherwise `desired` is used when listed and the first listed entry when it is not.
pub fn choose_surface_format(
    available: &[vk::SurfaceFormatKHR],
    desired: Option<vk::SurfaceFormatKHR>,
) -> Option<vk::SurfaceFormatKHR> {
    let first = *available.first()?;
    if available.len() == 1 && first.format == vk::Format::UNDEFINED {
        return Some(desired.unwrap_or(vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: first.color_space,
        }));
    }
    let Some(desired) = desired else {
        return Some(first);
    };
    Some(
        available
            .iter()
            .copied()
            .find(|format| {
                format.format == desired.format && format.color_space == desired.color_space
            })
            .unwrap_or(first),
    )
}

/// Picks the present mode: `desired` if listed, then `IMMEDIATE`, then `FIFO`.
pub fn choose_present_mode(
    available: &[vk::PresentModeKHR],
    desired: Option<vk::PresentModeKHR>,
) -> vk::PresentModeKHR {
    if let Some(desired) = desired {
        if available.contains(&desired) {
            return desired;
        }
    }
    if available.contains(&vk::PresentModeKHR::IMMEDIATE) {
        return vk::PresentModeKHR::IMMEDIATE;
    }
    vk::PresentModeKHR::FIFO
}

/// The surface's current extent unless it is left to the application, in which case the
/// window size (or `requested`) is clamped into the supported range
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window: vk::Extent2D,
    requested: Option<vk::Extent2D>,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    let wanted = requested.unwrap_or(window);
    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    vk::Extent2D {
        width: wanted.width.clamp(min.width, max.width.max(min.width)),
        height: wanted.height.clamp(min.height, max.height.max(min.height)),
    }
}

/// Minimum image count, plus one for mailbox. An explicit count at or above the minimum
/// replaces that. A maximum of zero means no upper limit.
pub fn choose_image_count(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    present_mode: vk::PresentModeKHR,
    requested: Option<u32>,
) -> u32 {
    let mut count = capabilities.min_image_count;
    if present_mode == vk::PresentModeKHR::MAILBOX {
        count += 1;
    }
    if let Some(requested) = requested {
        if requested >= capabilities.min_image_count {
            count = requested;
        }
    }
    if capabilities.max_image_count > 0 {
        count = count.min(capabilities.max_image_count);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRGB: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_SRGB,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };
    const UNORM: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_UNORM,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };

    #[test]
    fn undefined_surface_grants_request() {
        let available = [vk::SurfaceFormatKHR {
            format: vk::Format::UNDEFINED,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        let wanted = vk::SurfaceFormatKHR {
            format: vk::Format::R16G16B16A16_SFLOAT,
            color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        };
        assert_eq!(choose_surface_format(&available, Some(wanted)), Some(wanted));
    }

    #[test]
    fn listed_format_wins_otherwise_first() {
        assert_eq!(
            choose_surface_format(&[SRGB, UNORM], Some(UNORM)),
            Some(UNORM)
        );
        let wrong_space = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT,
        };
        assert_eq!(
            choose_surface_format(&[SRGB, UNORM], Some(wrong_space)),
            Some(SRGB)
        );
        assert_eq!(choose_surface_format(&[UNORM, SRGB], None), Some(UNORM));
        assert_eq!(choose_surface_format(&[], Some(UNORM)), None);
    }

    #[test]
    fn present_mode_fallbacks() {
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO], Some(vk::PresentModeKHR::MAILBOX)),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(
            choose_present_mode(
                &[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE],
                Some(vk::PresentModeKHR::FIFO)
            ),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(
            choose_present_mode(
                &[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE],
                Some(vk::PresentModeKHR::MAILBOX)
            ),
            vk::PresentModeKHR::IMMEDIATE
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE], None),
            vk::PresentModeKHR::IMMEDIATE
        );
    }

    fn capabilities(current: vk::Extent2D) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 3,
            current_extent: current,
            min_image_extent: vk::Extent2D {
                width: 64,
                height: 64,
            },
            max_image_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            ..Default::default()
        }
    }

    #[test]
    fn extent_uses_current_unless_sentinel() {
        let fixed = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let window = vk::Extent2D {
            width: 4000,
            height: 10,
        };
        assert_eq!(choose_extent(&capabilities(fixed), window, None), fixed);

        let free = capabilities(vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        });
        assert_eq!(
            choose_extent(&free, window, None),
            vk::Extent2D {
                width: 1920,
                height: 64
            }
        );
        let requested = vk::Extent2D {
            width: 1024,
            height: 768,
        };
        assert_eq!(choose_extent(&free, window, Some(requested)), requested);
    }

    #[test]
    fn image_count_rules() {
        let caps = capabilities(vk::Extent2D::default());
        assert_eq!(choose_image_count(&caps, vk::PresentModeKHR::FIFO, None), 2);
        assert_eq!(choose_image_count(&caps, vk::PresentModeKHR::MAILBOX, None), 3);
        // below the minimum is ignored
        assert_eq!(choose_image_count(&caps, vk::PresentModeKHR::MAILBOX, Some(1)), 3);
        assert_eq!(choose_image_count(&caps, vk::PresentModeKHR::FIFO, Some(8)), 3);

        let unlimited = vk::SurfaceCapabilitiesKHR {
            max_image_count: 0,
            ..caps
        };
        assert_eq!(
            choose_image_count(&unlimited, vk::PresentModeKHR::FIFO, Some(8)),
            8
        );
    }
}
