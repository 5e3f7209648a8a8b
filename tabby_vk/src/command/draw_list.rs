//! Draw commands kept as plain data.
//!
//! A [`DrawList`] is what gets recorded into every static command buffer. Keeping it as
//! data lets the graphics context replay it whenever the swapchain is rebuilt, with the
//! pipelines of that moment.
use ash::vk;

use super::recorder::DrawRecorder;
use crate::types::PushConstants;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    /// Individually placed objects
    Main,
    /// Objects drawn once per instance with vertex binding 1
    Instancing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawCommand {
    BindPipeline(PipelineKind),
    BindVertexBuffers {
        first_binding: u32,
        buffers: Vec<vk::Buffer>,
    },
    /// Always `UINT32` indices
    BindIndexBuffer(vk::Buffer),
    /// Binds `sets` starting at set 0
    BindDescriptorSets {
        sets: Vec<vk::DescriptorSet>,
        dynamic_offsets: Vec<u32>,
    },
    PushConstants(PushConstants),
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Iterates every `DrawIndexed` with the pipeline bound at that point
    pub fn draws(&self) -> impl Iterator<Item = (Option<PipelineKind>, &DrawCommand)> {
        let mut bound: Option<PipelineKind> = None;
        self.commands.iter().filter_map(move |command| match command {
            DrawCommand::BindPipeline(kind) => {
                bound = Some(*kind);
                None
            }
            DrawCommand::DrawIndexed { .. } => Some((bound, command)),
            _ => None,
        })
    }

    /// Issues every command in order to `recorder`
    pub fn replay(&self, recorder: &mut dyn DrawRecorder) {
        for command in &self.commands {
            match command {
                DrawCommand::BindPipeline(kind) => recorder.bind_pipeline(*kind),
                DrawCommand::BindVertexBuffers {
                    first_binding,
                    buffers,
                } => recorder.bind_vertex_buffers(*first_binding, buffers),
                DrawCommand::BindIndexBuffer(buffer) => recorder.bind_index_buffer(*buffer),
                DrawCommand::BindDescriptorSets {
                    sets,
                    dynamic_offsets,
                } => recorder.bind_descriptor_sets(sets, dynamic_offsets),
                DrawCommand::PushConstants(constants) => recorder.push_constants(constants),
                DrawCommand::DrawIndexed {
                    index_count,
                    instance_count,
                    first_index,
                    vertex_offset,
                    first_instance,
                } => recorder.draw_indexed(
                    *index_count,
                    *instance_count,
                    *first_index,
                    *vertex_offset,
                    *first_instance,
                ),
            }
        }
    }
}

impl FromIterator<DrawCommand> for DrawList {
    fn from_iter<T: IntoIterator<Item = DrawCommand>>(iter: T) -> Self {
        Self {
            commands: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Log(Vec<String>);

    impl DrawRecorder for Log {
        fn bind_pipeline(&mut self, kind: PipelineKind) {
            self.0.push(format!("pipeline {kind:?}"));
        }
        fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[vk::Buffer]) {
            self.0.push(format!("vertex {first_binding} x{}", buffers.len()));
        }
        fn bind_index_buffer(&mut self, _buffer: vk::Buffer) {
            self.0.push(String::from("index"));
        }
        fn bind_descriptor_sets(&mut self, sets: &[vk::DescriptorSet], dynamic_offsets: &[u32]) {
            self.0.push(format!("sets {} {:?}", sets.len(), dynamic_offsets));
        }
        fn push_constants(&mut self, constants: &PushConstants) {
            self.0.push(format!("push {}", constants.light_count));
        }
        fn draw_indexed(
            &mut self,
            index_count: u32,
            instance_count: u32,
            first_index: u32,
            vertex_offset: i32,
            first_instance: u32,
        ) {
            self.0.push(format!(
                "draw {index_count} {instance_count} {first_index} {vertex_offset} {first_instance}"
            ));
        }
    }

    fn list() -> DrawList {
        [
            DrawCommand::BindPipeline(PipelineKind::Main),
            DrawCommand::BindVertexBuffers {
                first_binding: 0,
                buffers: vec![vk::Buffer::null()],
            },
            DrawCommand::BindIndexBuffer(vk::Buffer::null()),
            DrawCommand::BindDescriptorSets {
                sets: vec![vk::DescriptorSet::null(); 4],
                dynamic_offsets: vec![256],
            },
            DrawCommand::PushConstants(PushConstants {
                use_phong: vk::TRUE,
                light_count: 2,
            }),
            DrawCommand::DrawIndexed {
                index_count: 6,
                instance_count: 1,
                first_index: 3,
                vertex_offset: 3,
                first_instance: 0,
            },
            DrawCommand::BindPipeline(PipelineKind::Instancing),
            DrawCommand::DrawIndexed {
                index_count: 3,
                instance_count: 4,
                first_index: 0,
                vertex_offset: 0,
                first_instance: 0,
            },
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn replays_in_order() {
        let mut log = Log::default();
        list().replay(&mut log);
        assert_eq!(
            log.0,
            vec![
                "pipeline Main",
                "vertex 0 x1",
                "index",
                "sets 4 [256]",
                "push 2",
                "draw 6 1 3 3 0",
                "pipeline Instancing",
                "draw 3 4 0 0 0",
            ]
        );
    }

    #[test]
    fn draws_know_their_pipeline() {
        let list = list();
        let kinds: Vec<_> = list.draws().map(|(kind, _)| kind).collect();
        assert_eq!(
            kinds,
            vec![Some(PipelineKind::Main), Some(PipelineKind::Instancing)]
        );
    }
}
