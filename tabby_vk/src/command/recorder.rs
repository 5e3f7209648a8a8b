use ash::vk;

use super::draw_list::PipelineKind;
use crate::types::PushConstants;

/// Sink for draw commands. Implemented over a recording command buffer and by anything
/// that wants to observe what would be recorded.
pub trait DrawRecorder {
    fn bind_pipeline(&mut self, kind: PipelineKind);

    fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[vk::Buffer]);

    fn bind_index_buffer(&mut self, buffer: vk::Buffer);

    fn bind_descriptor_sets(&mut self, sets: &[vk::DescriptorSet], dynamic_offsets: &[u32]);

    fn push_constants(&mut self, constants: &PushConstants);

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );
}

/// Records into a command buffer which is between begin and end
pub struct CommandBufferRecorder<'a> {
    pub device: &'a ash::Device,
    pub command_buffer: vk::CommandBuffer,
    pub layout: vk::PipelineLayout,
    pub main: vk::Pipeline,
    /// Binding the instancing pipeline is skipped when there is none
    pub instancing: Option<vk::Pipeline>,
}

impl DrawRecorder for CommandBufferRecorder<'_> {
    fn bind_pipeline(&mut self, kind: PipelineKind) {
        let pipeline = match kind {
            PipelineKind::Main => self.main,
            PipelineKind::Instancing => match self.instancing {
                Some(pipeline) => pipeline,
                None => {
                    tracing::warn!("Instanced draws recorded without an instancing pipeline");
                    return;
                }
            },
        };
        unsafe {
            self.device.cmd_bind_pipeline(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
        }
    }

    fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[vk::Buffer]) {
        let offsets = vec![0 as vk::DeviceSize; buffers.len()];
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(self.command_buffer, first_binding, buffers, &offsets);
        }
    }

    fn bind_index_buffer(&mut self, buffer: vk::Buffer) {
        unsafe {
            self.device.cmd_bind_index_buffer(
                self.command_buffer,
                buffer,
                0,
                vk::IndexType::UINT32,
            );
        }
    }

    fn bind_descriptor_sets(&mut self, sets: &[vk::DescriptorSet], dynamic_offsets: &[u32]) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.layout,
                0,
                sets,
                dynamic_offsets,
            );
        }
    }

    fn push_constants(&mut self, constants: &PushConstants) {
        unsafe {
            self.device.cmd_push_constants(
                self.command_buffer,
                self.layout,
                vk::ShaderStageFlags::FRAGMENT,
                0,
                bytemuck::bytes_of(constants),
            );
        }
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        unsafe {
            self.device.cmd_draw_indexed(
                self.command_buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
    }
}
