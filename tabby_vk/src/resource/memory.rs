use ash::vk;

use crate::{Result, TabbyError};

/// First memory type whose bit is set in `type_filter` and which carries every flag in `flags`
pub fn find_memory_type(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    flags: vk::MemoryPropertyFlags,
) -> Result<u32> {
    let count = (properties.memory_type_count as usize).min(vk::MAX_MEMORY_TYPES);
    properties.memory_types[..count]
        .iter()
        .enumerate()
        .find(|(index, memory_type)| {
            type_filter & (1 << index) != 0 && memory_type.property_flags.contains(flags)
        })
        .map(|(index, _)| index as u32)
        .ok_or(TabbyError::MemoryTypeNotFound { type_filter, flags })
}

/// Allocates and binds memory for the requirements reported by a resource
pub(crate) fn allocate(
    device: &crate::device::DeviceContext,
    requirements: &vk::MemoryRequirements,
    flags: vk::MemoryPropertyFlags,
) -> Result<vk::DeviceMemory> {
    let memory_type_index = find_memory_type(
        device.physical_device().memory_properties(),
        requirements.memory_type_bits,
        flags,
    )?;
    let allocate_info = vk::MemoryAllocateInfo {
        s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
        p_next: std::ptr::null(),
        allocation_size: requirements.size,
        memory_type_index,
        _marker: Default::default(),
    };
    let memory = unsafe { device.allocate_memory(&allocate_info, None)? };

    #[cfg(feature = "log-lifetimes")]
    tracing::trace!("Allocating VkDeviceMemory {:p}", memory);

    Ok(memory)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn properties() -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: 3,
            ..Default::default()
        };
        properties.memory_types[0].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
        properties.memory_types[1].property_flags =
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        properties.memory_types[2].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL
            | vk::MemoryPropertyFlags::HOST_VISIBLE
            | vk::MemoryPropertyFlags::HOST_COHERENT;
        properties
    }

    #[test]
    fn first_fit() {
        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        assert_eq!(find_memory_type(&properties(), 0b111, host), Ok(1));
        assert_eq!(find_memory_type(&properties(), 0b100, host), Ok(2));
        assert_eq!(
            find_memory_type(&properties(), 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            Ok(0)
        );
    }

    #[test]
    fn filter_excludes_everything() {
        let flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
        assert_eq!(
            find_memory_type(&properties(), 0b010, flags),
            Err(TabbyError::MemoryTypeNotFound {
                type_filter: 0b010,
                flags
            })
        );
        // types past memory_type_count never match
        assert!(find_memory_type(&properties(), 0b1000, vk::MemoryPropertyFlags::empty()).is_err());
    }
}
