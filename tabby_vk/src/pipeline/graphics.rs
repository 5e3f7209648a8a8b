use std::ffi::CStr;
use std::mem::size_of;

use ash::vk;
use derivative::Derivative;
use tracing::debug;
#[cfg(feature = "log-lifetimes")]
use tracing::trace;

use super::vertex_input;
use crate::command::PipelineKind;
use crate::config::PipelineSettings;
use crate::traits::Destructible;
use crate::types::PushConstants;
use crate::{Result, TabbyError};

const ENTRY_POINT: &CStr = c"main";

fn create_shader_module(
    device: &crate::device::DeviceContext,
    code: &[u32],
) -> Result<vk::ShaderModule> {
    let shader_ci = vk::ShaderModuleCreateInfo::default().code(code);
    let handle = unsafe { device.create_shader_module(&shader_ci, None) }
        .map_err(|err| TabbyError::ShaderModule(err.to_string()))?;

    #[cfg(feature = "log-lifetimes")]
    trace!("Creating VkShaderModule {:p}", handle);

    Ok(handle)
}

/// Pipeline layout shared by both pipelines plus the pipelines themselves
#[derive(Derivative)]
#[derivative(Debug)]
pub struct GraphicsPipelines {
    layout: vk::PipelineLayout,
    main: vk::Pipeline,
    instancing: Option<vk::Pipeline>,
    #[derivative(Debug = "ignore")]
    device: crate::device::DeviceContext,
}

impl GraphicsPipelines {
    /// Builds the main pipeline, and the instancing pipeline when `instancing` is set.
    /// Viewport and scissor are baked in at `extent`.
    pub fn new(
        device: crate::device::DeviceContext,
        settings: &PipelineSettings,
        render_pass: vk::RenderPass,
        extent: vk::Extent2D,
        set_layouts: &[vk::DescriptorSetLayout],
        instancing: bool,
    ) -> Result<Self> {
        let instance_shader = match (instancing, settings.instance_vertex_shader.as_ref()) {
            (true, None) => return Err(TabbyError::MissingShader("instance vertex")),
            (true, Some(code)) => Some(code.as_slice()),
            (false, _) => None,
        };

        let push_constant_ranges = [vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::FRAGMENT,
            offset: 0,
            size: size_of::<PushConstants>() as u32,
        }];
        let layout_ci = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(set_layouts)
            .push_constant_ranges(&push_constant_ranges);
        let layout = unsafe { device.create_pipeline_layout(&layout_ci, None) }
            .map_err(TabbyError::PipelineCreate)?;

        #[cfg(feature = "log-lifetimes")]
        trace!("Creating VkPipelineLayout {:p}", layout);

        let mut pipelines = Self {
            layout,
            main: vk::Pipeline::null(),
            instancing: None,
            device,
        };
        match pipelines.build(settings, render_pass, extent, &settings.vertex_shader, false) {
            Ok(pipeline) => pipelines.main = pipeline,
            Err(err) => {
                pipelines.destroy();
                return Err(err);
            }
        }
        if let Some(code) = instance_shader {
            match pipelines.build(settings, render_pass, extent, code, true) {
                Ok(pipeline) => pipelines.instancing = Some(pipeline),
                Err(err) => {
                    pipelines.destroy();
                    return Err(err);
                }
            }
        }
        debug!("Built graphics pipelines, instancing {}", instancing);
        Ok(pipelines)
    }

    fn build(
        &self,
        settings: &PipelineSettings,
        render_pass: vk::RenderPass,
        extent: vk::Extent2D,
        vertex_code: &[u32],
        instancing: bool,
    ) -> Result<vk::Pipeline> {
        let vertex_module = create_shader_module(&self.device, vertex_code)?;
        let fragment_module = match create_shader_module(&self.device, &settings.fragment_shader)
        {
            Ok(module) => module,
            Err(err) => {
                unsafe { self.device.destroy_shader_module(vertex_module, None) };
                return Err(err);
            }
        };

        let stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_module)
                .name(ENTRY_POINT),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment_module)
                .name(ENTRY_POINT),
        ];
        let bindings = vertex_input::binding_descriptions(instancing);
        let attributes = vertex_input::attribute_descriptions(instancing);
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);
        let viewports = [vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }];
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        }];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);
        let rasterizer = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(settings.polygon_mode)
            .line_width(1.0)
            .cull_mode(settings.cull_mode)
            .front_face(settings.front_face);
        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS)
            .max_depth_bounds(1.0);
        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState {
            blend_enable: vk::FALSE,
            color_write_mask: vk::ColorComponentFlags::RGBA,
            ..Default::default()
        }];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .attachments(&color_blend_attachments);

        let pipeline_ci = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .layout(self.layout)
            .render_pass(render_pass)
            .subpass(0);
        let created = unsafe {
            self.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_ci], None)
        };
        unsafe {
            self.device.destroy_shader_module(vertex_module, None);
            self.device.destroy_shader_module(fragment_module, None);
        }
        let pipeline = created
            .map_err(|(_, err)| TabbyError::PipelineCreate(err))?
            .into_iter()
            .next()
            .ok_or(TabbyError::PipelineCreate(vk::Result::ERROR_UNKNOWN))?;

        #[cfg(feature = "log-lifetimes")]
        trace!("Creating VkPipeline {:p}", pipeline);

        Ok(pipeline)
    }

    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    pub fn main(&self) -> vk::Pipeline {
        self.main
    }

    pub fn instancing(&self) -> Option<vk::Pipeline> {
        self.instancing
    }

    pub fn get(&self, kind: PipelineKind) -> Option<vk::Pipeline> {
        match kind {
            PipelineKind::Main => Some(self.main),
            PipelineKind::Instancing => self.instancing,
        }
    }
}

impl Destructible for GraphicsPipelines {
    fn destroy(&mut self) {
        let pipelines = [Some(self.main), self.instancing.take()];
        for pipeline in pipelines.into_iter().flatten() {
            if pipeline == vk::Pipeline::null() {
                continue;
            }
            #[cfg(feature = "log-lifetimes")]
            trace!("Destroying VkPipeline {:p}", pipeline);
            unsafe {
                self.device.destroy_pipeline(pipeline, None);
            }
        }
        self.main = vk::Pipeline::null();
        if self.layout != vk::PipelineLayout::null() {
            #[cfg(feature = "log-lifetimes")]
            trace!("Destroying VkPipelineLayout {:p}", self.layout);
            unsafe {
                self.device.destroy_pipeline_layout(self.layout, None);
            }
            self.layout = vk::PipelineLayout::null();
        }
    }
}

#[cfg(feature = "raii")]
impl Drop for GraphicsPipelines {
    fn drop(&mut self) {
        self.destroy();
    }
}
