//! Engine settings.
//!
//! Every subsystem reads its own immutable settings value. Values are assembled through
//! [`EngineSettingsBuilder`] and each settings struct has named constructors supplying
//! its defaults. Fields which the engine may compute on its own are [`Option`]s, so an
//! explicit zero is never confused with "unset".
use std::ffi::CString;
use std::path::Path;

use ash::vk;

use crate::{Result, TabbyError};

/// Application and instance level settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationSettings {
    /// Name of application
    pub name: String,
    /// Application version
    pub version: u32,
    /// Name of engine
    pub engine_name: String,
    /// Version of engine
    pub engine_version: u32,
    /// Vulkan api version in the form of (major, minor, patch)
    pub api_version: (u32, u32, u32),
    /// Enable validation layers and the debug messenger
    pub enable_validation: bool,
    /// Validation messages below this severity are not forwarded
    pub validation_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
}

impl ApplicationSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: vk::make_api_version(0, 0, 1, 0),
            engine_name: String::from("Tabby"),
            engine_version: vk::make_api_version(0, 0, 1, 0),
            api_version: (1, 0, 0),
            enable_validation: cfg!(debug_assertions),
            validation_severity: vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
        }
    }
}

/// Physical and logical device requirements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSettings {
    /// Device extensions that must be present on the selected GPU
    pub extensions: Vec<CString>,
    /// Devices without geometry shader support are rated unsuitable
    pub require_geometry_shader: bool,
}

impl DeviceSettings {
    /// Requirements for presenting to a window surface
    pub fn presentation() -> Self {
        Self {
            extensions: vec![CString::from(ash::khr::swapchain::NAME)],
            require_geometry_shader: true,
        }
    }
}

/// Swapchain negotiation preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainSettings {
    /// Preferred surface format, [`None`] takes whatever the surface lists first
    pub surface_format: Option<vk::SurfaceFormatKHR>,
    /// Preferred present mode, [`None`] goes straight to the fallback order
    pub present_mode: Option<vk::PresentModeKHR>,
    /// Explicit image count. Ignored when below the surface minimum.
    pub image_count: Option<u32>,
    /// Extent used when the surface leaves the extent up to the application. [`None`]
    /// uses the window's pixel size.
    pub extent: Option<vk::Extent2D>,
}

impl SwapchainSettings {
    const DEFAULT_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_UNORM,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };

    /// Mailbox presentation with an extra image of headroom
    pub fn low_latency() -> Self {
        Self {
            surface_format: Some(Self::DEFAULT_FORMAT),
            present_mode: Some(vk::PresentModeKHR::MAILBOX),
            image_count: None,
            extent: None,
        }
    }

    /// FIFO presentation, tied to the display refresh
    pub fn vsync() -> Self {
        Self {
            present_mode: Some(vk::PresentModeKHR::FIFO),
            ..Self::low_latency()
        }
    }
}

/// Graphics pipeline shaders and fixed function state
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// SPIR-V of the vertex shader used by individually placed objects
    pub vertex_shader: Vec<u32>,
    /// SPIR-V of the fragment shader shared by both pipelines
    pub fragment_shader: Vec<u32>,
    /// SPIR-V of the vertex shader used by the instancing pipeline
    pub instance_vertex_shader: Option<Vec<u32>>,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub polygon_mode: vk::PolygonMode,
    /// Color the swapchain image is cleared to
    pub clear_color: [f32; 4],
}

impl PipelineSettings {
    pub fn from_spirv(vertex_shader: Vec<u32>, fragment_shader: Vec<u32>) -> Self {
        Self {
            vertex_shader,
            fragment_shader,
            instance_vertex_shader: None,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            polygon_mode: vk::PolygonMode::FILL,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Reads compiled shaders from disk
    pub fn from_spirv_files(
        vertex_shader: impl AsRef<Path>,
        fragment_shader: impl AsRef<Path>,
        instance_vertex_shader: Option<&Path>,
    ) -> Result<Self> {
        let mut settings = Self::from_spirv(
            read_spirv(vertex_shader.as_ref())?,
            read_spirv(fragment_shader.as_ref())?,
        );
        if let Some(path) = instance_vertex_shader {
            settings.instance_vertex_shader = Some(read_spirv(path)?);
        }
        Ok(settings)
    }

    pub fn with_instancing(mut self, instance_vertex_shader: Vec<u32>) -> Self {
        self.instance_vertex_shader = Some(instance_vertex_shader);
        self
    }
}

fn read_spirv(path: &Path) -> Result<Vec<u32>> {
    let mut file = std::fs::File::open(path)
        .map_err(|err| TabbyError::ShaderModule(format!("{}: {err}", path.display())))?;
    ash::util::read_spv(&mut file)
        .map_err(|err| TabbyError::ShaderModule(format!("{}: {err}", path.display())))
}

/// Texture sampler state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerSettings {
    pub filter: vk::Filter,
    pub address_mode: vk::SamplerAddressMode,
    /// Requested anisotropy. Dropped when the device lacks sampler anisotropy.
    pub max_anisotropy: Option<f32>,
}

impl SamplerSettings {
    pub fn linear_repeat() -> Self {
        Self {
            filter: vk::Filter::LINEAR,
            address_mode: vk::SamplerAddressMode::REPEAT,
            max_anisotropy: Some(16.0),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub application: ApplicationSettings,
    pub device: DeviceSettings,
    pub swapchain: SwapchainSettings,
    pub pipeline: PipelineSettings,
    pub sampler: SamplerSettings,
}

impl EngineSettings {
    pub fn builder() -> EngineSettingsBuilder {
        EngineSettingsBuilder::default()
    }
}

/// Quickly builds [`EngineSettings`]
#[derive(Debug, Clone)]
pub struct EngineSettingsBuilder {
    application: ApplicationSettings,
    device: DeviceSettings,
    swapchain: SwapchainSettings,
    pipeline: Option<PipelineSettings>,
    sampler: SamplerSettings,
}

impl Default for EngineSettingsBuilder {
    fn default() -> Self {
        Self {
            application: ApplicationSettings::new("Tabby application"),
            device: DeviceSettings::presentation(),
            swapchain: SwapchainSettings::low_latency(),
            pipeline: None,
            sampler: SamplerSettings::linear_repeat(),
        }
    }
}

impl EngineSettingsBuilder {
    pub fn application(mut self, application: ApplicationSettings) -> Self {
        self.application = application;
        self
    }

    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application.name = name.into();
        self
    }

    /// Enables validation
    pub fn validation(mut self, enable: bool) -> Self {
        self.application.enable_validation = enable;
        self
    }

    pub fn validation_severity(mut self, severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> Self {
        self.application.validation_severity = severity;
        self
    }

    pub fn device(mut self, device: DeviceSettings) -> Self {
        self.device = device;
        self
    }

    pub fn swapchain(mut self, swapchain: SwapchainSettings) -> Self {
        self.swapchain = swapchain;
        self
    }

    pub fn present_mode(mut self, present_mode: vk::PresentModeKHR) -> Self {
        self.swapchain.present_mode = Some(present_mode);
        self
    }

    pub fn surface_format(mut self, surface_format: vk::SurfaceFormatKHR) -> Self {
        self.swapchain.surface_format = Some(surface_format);
        self
    }

    pub fn image_count(mut self, image_count: u32) -> Self {
        self.swapchain.image_count = Some(image_count);
        self
    }

    pub fn extent(mut self, extent: vk::Extent2D) -> Self {
        self.swapchain.extent = Some(extent);
        self
    }

    pub fn pipeline(mut self, pipeline: PipelineSettings) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn sampler(mut self, sampler: SamplerSettings) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn build(self) -> Result<EngineSettings> {
        let pipeline = self.pipeline.ok_or(TabbyError::MissingShader("vertex"))?;
        if pipeline.vertex_shader.is_empty() {
            return Err(TabbyError::MissingShader("vertex"));
        }
        if pipeline.fragment_shader.is_empty() {
            return Err(TabbyError::MissingShader("fragment"));
        }
        if pipeline
            .instance_vertex_shader
            .as_ref()
            .is_some_and(|words| words.is_empty())
        {
            return Err(TabbyError::MissingShader("instance vertex"));
        }
        Ok(EngineSettings {
            application: self.application,
            device: self.device,
            swapchain: self.swapchain,
            pipeline,
            sampler: self.sampler,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shaders() -> PipelineSettings {
        PipelineSettings::from_spirv(vec![0x0723_0203], vec![0x0723_0203])
    }

    #[test]
    fn builder_uses_named_defaults() {
        let settings = EngineSettings::builder().pipeline(shaders()).build().unwrap();
        assert_eq!(settings.swapchain, SwapchainSettings::low_latency());
        assert_eq!(settings.sampler, SamplerSettings::linear_repeat());
        assert_eq!(settings.device, DeviceSettings::presentation());
        assert_eq!(settings.application.engine_name, "Tabby");
    }

    #[test]
    fn vsync_only_changes_present_mode() {
        let vsync = SwapchainSettings::vsync();
        assert_eq!(vsync.present_mode, Some(vk::PresentModeKHR::FIFO));
        assert_eq!(vsync.surface_format, SwapchainSettings::low_latency().surface_format);
    }

    #[test]
    fn zero_extent_is_distinct_from_unset() {
        let settings = EngineSettings::builder()
            .pipeline(shaders())
            .extent(vk::Extent2D { width: 0, height: 0 })
            .build()
            .unwrap();
        assert_eq!(settings.swapchain.extent, Some(vk::Extent2D::default()));
        assert_eq!(SwapchainSettings::vsync().extent, None);
    }

    #[test]
    fn missing_shaders_are_rejected() {
        assert_eq!(
            EngineSettings::builder().build(),
            Err(TabbyError::MissingShader("vertex"))
        );
        let no_fragment = PipelineSettings::from_spirv(vec![1], Vec::new());
        assert_eq!(
            EngineSettings::builder().pipeline(no_fragment).build(),
            Err(TabbyError::MissingShader("fragment"))
        );
        let bad_instance = shaders().with_instancing(Vec::new());
        assert_eq!(
            EngineSettings::builder().pipeline(bad_instance).build(),
            Err(TabbyError::MissingShader("instance vertex"))
        );
    }
}
