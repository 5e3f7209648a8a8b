//! Routes validation layer messages into `tracing`.
use ash::vk;
use derivative::Derivative;
#[cfg(feature = "log-lifetimes")]
use tracing::trace;
use tracing::Level;

use crate::traits::Destructible;

type Severity = vk::DebugUtilsMessageSeverityFlagsEXT;

const SEVERITIES: [Severity; 4] = [
    Severity::VERBOSE,
    Severity::INFO,
    Severity::WARNING,
    Severity::ERROR,
];

/// Every severity at or above `minimum`
pub(crate) fn severity_mask(minimum: Severity) -> Severity {
    SEVERITIES
        .into_iter()
        .filter(|severity| severity.as_raw() >= minimum.as_raw())
        .fold(Severity::empty(), |mask, severity| mask | severity)
}

pub(crate) fn level_for(severity: Severity) -> Level {
    if severity.contains(Severity::ERROR) {
        Level::ERROR
    } else if severity.contains(Severity::WARNING) {
        Level::WARN
    } else if severity.contains(Severity::INFO) {
        Level::INFO
    } else {
        Level::TRACE
    }
}

/// Owns the validation messenger of an instance
#[derive(Derivative)]
#[derivative(Debug)]
pub struct DebugMessenger {
    handle: vk::DebugUtilsMessengerEXT,
    #[derivative(Debug = "ignore")]
    ext: ash::ext::debug_utils::Instance,
}

impl DebugMessenger {
    /// Forwards messages of `minimum` severity and above
    pub fn new(
        entry: &ash::Entry,
        instance: &ash::Instance,
        minimum: Severity,
    ) -> crate::Result<Self> {
        let ext = ash::ext::debug_utils::Instance::new(entry, instance);
        let debug_ci = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(severity_mask(minimum))
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(forward_message));
        let handle = unsafe { ext.create_debug_utils_messenger(&debug_ci, None) }
            .map_err(crate::TabbyError::DebugMessengerCreate)?;

        #[cfg(feature = "log-lifetimes")]
        trace!("Creating VkDebugUtilsMessenger {:p}", handle);

        Ok(Self { handle, ext })
    }
}

impl Destructible for DebugMessenger {
    fn destroy(&mut self) {
        if self.handle == vk::DebugUtilsMessengerEXT::null() {
            return;
        }
        #[cfg(feature = "log-lifetimes")]
        trace!("Destroying VkDebugUtilsMessenger {:p}", self.handle);

        unsafe { self.ext.destroy_debug_utils_messenger(self.handle, None) }
        self.handle = vk::DebugUtilsMessengerEXT::null();
    }
}

#[cfg(feature = "raii")]
impl Drop for DebugMessenger {
    fn drop(&mut self) {
        self.destroy();
    }
}

unsafe extern "system" fn forward_message(
    severity: Severity,
    kind: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if data.is_null() {
        return vk::FALSE;
    }
    let data = unsafe { *data };
    let id = unsafe { crate::util::wrap_c_str(data.p_message_id_name) };
    let message = unsafe { crate::util::wrap_c_str(data.p_message) };
    let (id, message) = (id.to_string_lossy(), message.to_string_lossy());

    match level_for(severity) {
        Level::ERROR => tracing::error!(target: "vulkan", ?kind, %id, "{message}"),
        Level::WARN => tracing::warn!(target: "vulkan", ?kind, %id, "{message}"),
        Level::INFO => tracing::info!(target: "vulkan", ?kind, %id, "{message}"),
        _ => tracing::trace!(target: "vulkan", ?kind, %id, "{message}"),
    }
    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_includes_higher_severities() {
        assert_eq!(severity_mask(Severity::WARNING), Severity::WARNING | Severity::ERROR);
        assert_eq!(severity_mask(Severity::ERROR), Severity::ERROR);
        assert_eq!(
            severity_mask(Severity::VERBOSE),
            Severity::VERBOSE | Severity::INFO | Severity::WARNING | Severity::ERROR
        );
    }

    #[test]
    fn severities_map_to_levels() {
        assert_eq!(level_for(Severity::ERROR), Level::ERROR);
        assert_eq!(level_for(Severity::WARNING), Level::WARN);
        assert_eq!(level_for(Severity::INFO), Level::INFO);
        assert_eq!(level_for(Severity::VERBOSE), Level::TRACE);
    }
}
