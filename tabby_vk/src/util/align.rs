use ash::vk;

/// Rounds `current` up to the next multiple of `alignment`.
///
/// An alignment of zero leaves the value untouched, matching devices which report no
/// minimum offset alignment.
pub fn align(current: vk::DeviceSize, alignment: vk::DeviceSize) -> vk::DeviceSize {
    if alignment == 0 || current % alignment == 0 {
        current
    } else {
        (current / alignment + 1) * alignment
    }
}
