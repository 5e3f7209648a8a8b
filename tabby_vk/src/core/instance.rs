use std::ffi::{c_char, CStr, CString};
use std::ops::Deref;
use std::sync::Arc;

use ash::vk;
use derivative::Derivative;
use tracing::debug;

use crate::config::ApplicationSettings;
use crate::{Result, TabbyError};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

#[derive(Derivative)]
#[derivative(Debug)]
struct InstanceInner {
    #[derivative(Debug = "ignore")]
    entry: ash::Entry,
    #[derivative(Debug = "ignore")]
    instance: ash::Instance,
    debug_messenger: Option<super::DebugMessenger>,
}

impl Drop for InstanceInner {
    fn drop(&mut self) {
        use crate::traits::Destructible;
        if let Some(mut messenger) = self.debug_messenger.take() {
            messenger.destroy();
        }

        #[cfg(feature = "log-lifetimes")]
        tracing::trace!("Destroying VkInstance {:p}", self.instance.handle());

        unsafe {
            self.instance.destroy_instance(None);
        }
    }
}

/// Represents a Vulkan Instance
///
/// Clones share the same instance; it is destroyed once the last clone (including those
/// held by devices and surfaces) goes away.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct Instance {
    inner: Arc<InstanceInner>,
}

impl Instance {
    /// Creates an instance with every extension in `extensions` enabled.
    ///
    /// Validation adds the Khronos validation layer, debug utils and a messenger which
    /// forwards into `tracing`.
    pub fn new(settings: &ApplicationSettings, extensions: &[CString]) -> Result<Self> {
        let entry = unsafe { ash::Entry::load()? };

        let mut extensions: Vec<CString> = extensions.to_vec();
        let mut layers: Vec<CString> = Vec::new();
        if settings.enable_validation {
            layers.push(CString::from(VALIDATION_LAYER));
            extensions.push(CString::from(ash::ext::debug_utils::NAME));
        }
        extensions.sort();
        extensions.dedup();

        let available_extensions = unsafe { entry.enumerate_instance_extension_properties(None)? };
        let available_extension_names: Vec<&CStr> = available_extensions
            .iter()
            .filter_map(|properties| properties.extension_name_as_c_str().ok())
            .collect();
        if let Some(missing) = crate::util::first_missing(&available_extension_names, &extensions)
        {
            return Err(TabbyError::ExtensionUnavailable(
                missing.to_string_lossy().into_owned(),
            ));
        }

        let available_layers = unsafe { entry.enumerate_instance_layer_properties()? };
        let available_layer_names: Vec<&CStr> = available_layers
            .iter()
            .filter_map(|properties| properties.layer_name_as_c_str().ok())
            .collect();
        if let Some(missing) = crate::util::first_missing(&available_layer_names, &layers) {
            return Err(TabbyError::ValidationLayerUnavailable(
                missing.to_string_lossy().into_owned(),
            ));
        }

        let application_name = CString::new(settings.name.as_str())
            .map_err(|_| TabbyError::InstanceCreate(vk::Result::ERROR_INITIALIZATION_FAILED))?;
        let engine_name = CString::new(settings.engine_name.as_str())
            .map_err(|_| TabbyError::InstanceCreate(vk::Result::ERROR_INITIALIZATION_FAILED))?;
        let (major, minor, patch) = settings.api_version;
        let application_info = vk::ApplicationInfo::default()
            .application_name(&application_name)
            .application_version(settings.version)
            .engine_name(&engine_name)
            .engine_version(settings.engine_version)
            .api_version(vk::make_api_version(0, major, minor, patch));

        let extension_ptrs: Vec<*const c_char> =
            extensions.iter().map(|name| name.as_ptr()).collect();
        let layer_ptrs: Vec<*const c_char> = layers.iter().map(|name| name.as_ptr()).collect();
        let instance_ci = vk::InstanceCreateInfo::default()
            .application_info(&application_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);

        let instance = unsafe { entry.create_instance(&instance_ci, None) }
            .map_err(TabbyError::InstanceCreate)?;

        #[cfg(feature = "log-lifetimes")]
        tracing::trace!("Creating VkInstance {:p}", instance.handle());

        let debug_messenger = if settings.enable_validation {
            match super::DebugMessenger::new(&entry, &instance, settings.validation_severity) {
                Ok(messenger) => Some(messenger),
                Err(err) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(err);
                }
            }
        } else {
            None
        };
        debug!(
            "Created instance for {} with {} extensions, validation {}",
            settings.name,
            extensions.len(),
            settings.enable_validation
        );

        Ok(Self {
            inner: Arc::new(InstanceInner {
                entry,
                instance,
                debug_messenger,
            }),
        })
    }

    /// Get the [`ash::Entry`]
    pub fn get_entry(&self) -> &ash::Entry {
        &self.inner.entry
    }

    /// Get the [`ash::Instance`]
    pub fn get_instance(&self) -> &ash::Instance {
        &self.inner.instance
    }
}

impl Deref for Instance {
    type Target = ash::Instance;

    fn deref(&self) -> &Self::Target {
        &self.inner.instance
    }
}
