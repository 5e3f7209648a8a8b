use std::ffi::{CStr, CString};

use ash::vk;
use derivative::Derivative;
use tracing::{debug, info};

use crate::config::DeviceSettings;
use crate::{Result, TabbyError};

/// Bonus given to discrete GPUs when rating devices
const DISCRETE_GPU_BONUS: u64 = 0xCA7F00D;

/// Depth formats in order of preference
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Queue families the engine submits to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
    /// A transfer-only family when the device has one, otherwise the graphics family
    pub transfer: u32,
}

impl QueueFamilyIndices {
    /// Picks families out of `families`. `can_present` is asked about each family index.
    pub fn find(
        families: &[vk::QueueFamilyProperties],
        mut can_present: impl FnMut(u32) -> bool,
    ) -> Option<Self> {
        let mut graphics: Option<u32> = None;
        let mut present: Option<u32> = None;
        let mut transfer: Option<u32> = None;

        for (index, family) in families.iter().enumerate() {
            if family.queue_count == 0 {
                continue;
            }
            let index = index as u32;
            let flags = family.queue_flags;
            if graphics.is_none() && flags.contains(vk::QueueFlags::GRAPHICS) {
                graphics = Some(index);
            }
            if transfer.is_none()
                && flags.contains(vk::QueueFlags::TRANSFER)
                && !flags.contains(vk::QueueFlags::GRAPHICS)
            {
                transfer = Some(index);
            }
            if present.is_none() && can_present(index) {
                present = Some(index);
            }
        }

        let graphics = graphics?;
        Some(Self {
            graphics,
            present: present?,
            transfer: transfer.unwrap_or(graphics),
        })
    }

    /// Distinct family indices in the order graphics, present, transfer
    pub fn unique(&self) -> Vec<u32> {
        let mut unique: Vec<u32> = Vec::with_capacity(3);
        for index in [self.graphics, self.present, self.transfer] {
            if !unique.contains(&index) {
                unique.push(index);
            }
        }
        unique
    }
}

/// Rates a device for selection. Zero means unsuitable.
pub fn rate_device(
    properties: &vk::PhysicalDeviceProperties,
    features: &vk::PhysicalDeviceFeatures,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    require_geometry_shader: bool,
) -> u64 {
    if require_geometry_shader && features.geometry_shader == vk::FALSE {
        return 0;
    }

    let mut score: u64 = 1;
    if properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        score += DISCRETE_GPU_BONUS;
    }
    let heap_count = (memory_properties.memory_heap_count as usize).min(vk::MAX_MEMORY_HEAPS);
    score += memory_properties.memory_heaps[..heap_count]
        .iter()
        .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
        .map(|heap| heap.size / (1024 * 1024))
        .sum::<u64>();
    score
}

/// First candidate supporting depth attachments with optimal tiling
pub fn choose_depth_format(
    candidates: &[vk::Format],
    mut format_properties: impl FnMut(vk::Format) -> vk::FormatProperties,
) -> Option<vk::Format> {
    candidates.iter().copied().find(|format| {
        format_properties(*format)
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
    })
}

/// A GPU chosen to drive the engine along with everything queried about it
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct PhysicalDevice {
    handle: vk::PhysicalDevice,
    #[derivative(Debug = "ignore")]
    properties: vk::PhysicalDeviceProperties,
    #[derivative(Debug = "ignore")]
    features: vk::PhysicalDeviceFeatures,
    #[derivative(Debug = "ignore")]
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    queue_families: QueueFamilyIndices,
    depth_format: vk::Format,
    extensions: Vec<CString>,
}

impl PhysicalDevice {
    /// Chooses the highest rated device able to present to `surface`
    pub fn select(
        instance: &crate::core::Instance,
        surface: &crate::wsi::Surface,
        settings: &DeviceSettings,
    ) -> Result<Self> {
        let candidates = unsafe { instance.enumerate_physical_devices()? };
        let mut best: Option<(u64, Self)> = None;

        for handle in candidates {
            let Some(candidate) = Self::inspect(instance, surface, settings, handle)? else {
                continue;
            };
            let score = rate_device(
                &candidate.properties,
                &candidate.features,
                &candidate.memory_properties,
                settings.require_geometry_shader,
            );
            debug!("{} rated {}", candidate.name(), score);
            if score == 0 {
                continue;
            }
            if best.as_ref().map_or(true, |(best_score, _)| score > *best_score) {
                best = Some((score, candidate));
            }
        }

        let (_, device) = best.ok_or(TabbyError::NoSuitableDevice)?;
        info!("Selected {}", device.name());
        Ok(device)
    }

    /// Queries a device, [`None`] if it lacks queues, extensions, presentation support or a
    /// depth format
    fn inspect(
        instance: &crate::core::Instance,
        surface: &crate::wsi::Surface,
        settings: &DeviceSettings,
        handle: vk::PhysicalDevice,
    ) -> Result<Option<Self>> {
        let families = unsafe { instance.get_physical_device_queue_family_properties(handle) };
        let mut present_error: Option<TabbyError> = None;
        let queue_families = QueueFamilyIndices::find(&families, |index| {
            match surface.supports_present(handle, index) {
                Ok(supported) => supported,
                Err(err) => {
                    present_error.get_or_insert(err);
                    false
                }
            }
        });
        if let Some(err) = present_error {
            return Err(err);
        }
        let Some(queue_families) = queue_families else {
            return Ok(None);
        };

        let available = unsafe { instance.enumerate_device_extension_properties(handle)? };
        let available_names: Vec<&CStr> = available
            .iter()
            .filter_map(|properties| properties.extension_name_as_c_str().ok())
            .collect();
        if crate::util::first_missing(&available_names, &settings.extensions).is_some() {
            return Ok(None);
        }

        if surface.formats(handle)?.is_empty() || surface.present_modes(handle)?.is_empty() {
            return Ok(None);
        }

        let Some(depth_format) = choose_depth_format(&DEPTH_FORMAT_CANDIDATES, |format| unsafe {
            instance.get_physical_device_format_properties(handle, format)
        }) else {
            return Ok(None);
        };

        Ok(Some(Self {
            handle,
            properties: unsafe { instance.get_physical_device_properties(handle) },
            features: unsafe { instance.get_physical_device_features(handle) },
            memory_properties: unsafe { instance.get_physical_device_memory_properties(handle) },
            queue_families,
            depth_format,
            extensions: settings.extensions.clone(),
        }))
    }

    pub fn handle(&self) -> vk::PhysicalDevice {
        self.handle
    }

    pub fn name(&self) -> String {
        self.properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    pub fn limits(&self) -> &vk::PhysicalDeviceLimits {
        &self.properties.limits
    }

    pub fn features(&self) -> &vk::PhysicalDeviceFeatures {
        &self.features
    }

    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.queue_families
    }

    /// Depth format, see [`DEPTH_FORMAT_CANDIDATES`]
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    /// Device extensions which will be enabled
    pub fn extensions(&self) -> &[CString] {
        &self.extensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn prefers_dedicated_transfer_family() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::TRANSFER),
        ];
        let indices = QueueFamilyIndices::find(&families, |index| index == 0).unwrap();
        assert_eq!(
            indices,
            QueueFamilyIndices {
                graphics: 0,
                present: 0,
                transfer: 1
            }
        );
        assert_eq!(indices.unique(), vec![0, 1]);
    }

    #[test]
    fn transfer_falls_back_to_graphics() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER)];
        let indices = QueueFamilyIndices::find(&families, |_| true).unwrap();
        assert_eq!(indices.transfer, indices.graphics);
        assert_eq!(indices.unique(), vec![0]);
    }

    #[test]
    fn separate_present_family_is_kept_in_order() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE),
        ];
        let indices = QueueFamilyIndices::find(&families, |index| index == 2).unwrap();
        assert_eq!(indices.unique(), vec![0, 2, 1]);
    }

    #[test]
    fn missing_present_or_graphics_is_unsuitable() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        assert!(QueueFamilyIndices::find(&families, |_| false).is_none());
        let families = [family(vk::QueueFlags::COMPUTE)];
        assert!(QueueFamilyIndices::find(&families, |_| true).is_none());
    }

    #[test]
    fn empty_families_are_skipped() {
        let mut empty = family(vk::QueueFlags::GRAPHICS);
        empty.queue_count = 0;
        let families = [empty, family(vk::QueueFlags::GRAPHICS)];
        let indices = QueueFamilyIndices::find(&families, |_| true).unwrap();
        assert_eq!(indices.graphics, 1);
    }

    fn memory_with_heap(size: u64) -> vk::PhysicalDeviceMemoryProperties {
        let mut memory = vk::PhysicalDeviceMemoryProperties {
            memory_heap_count: 1,
            ..Default::default()
        };
        memory.memory_heaps[0] = vk::MemoryHeap {
            size,
            flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
        };
        memory
    }

    #[test]
    fn discrete_gpu_outranks_integrated() {
        let features = vk::PhysicalDeviceFeatures {
            geometry_shader: vk::TRUE,
            ..Default::default()
        };
        let discrete = vk::PhysicalDeviceProperties {
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            ..Default::default()
        };
        let integrated = vk::PhysicalDeviceProperties {
            device_type: vk::PhysicalDeviceType::INTEGRATED_GPU,
            ..Default::default()
        };
        let small = rate_device(&discrete, &features, &memory_with_heap(512 << 20), true);
        let large = rate_device(&integrated, &features, &memory_with_heap(8 << 30), true);
        assert!(small > large);
        assert_eq!(large, 1 + 8 * 1024);
    }

    #[test]
    fn geometry_shader_requirement() {
        let features = vk::PhysicalDeviceFeatures::default();
        let properties = vk::PhysicalDeviceProperties::default();
        let memory = memory_with_heap(1 << 30);
        assert_eq!(rate_device(&properties, &features, &memory, true), 0);
        assert!(rate_device(&properties, &features, &memory, false) > 0);
    }

    #[test]
    fn depth_format_follows_preference() {
        let supported = |format: vk::Format| vk::FormatProperties {
            optimal_tiling_features: if format == vk::Format::D32_SFLOAT {
                vk::FormatFeatureFlags::empty()
            } else {
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
            },
            ..Default::default()
        };
        assert_eq!(
            choose_depth_format(&DEPTH_FORMAT_CANDIDATES, supported),
            Some(vk::Format::D32_SFLOAT_S8_UINT)
        );
        assert_eq!(
            choose_depth_format(&DEPTH_FORMAT_CANDIDATES, |_| vk::FormatProperties::default()),
            None
        );
    }
}
