//! The scene and the per-frame update loop.

use log::debug;

use crate::gestures::events::TouchEvent;
use crate::gestures::GestureProcessor;
use crate::math::{Matrix, Vector2};
use crate::messages::{MessageQueue, MessageSender};
use crate::property::{other_buffer, BufferIndex};
use crate::relayout::RelayoutController;
use crate::rendering::instructions::{RenderInstruction, RenderInstructionBuilder};
use crate::rendering::layer::Layer;
use crate::rendering::renderer::{RendererArena, ShaderArena};
use crate::node::NodeTree;

/// Everything the update thread owns: the node tree, renderer and shader
/// registries, layers, gesture routing and layout negotiation.
pub struct Scene {
    pub nodes: NodeTree,
    pub renderers: RendererArena,
    pub shaders: ShaderArena,
    /// Painter's order: index 0 is the back layer.
    pub layers: Vec<Layer>,
    pub gestures: GestureProcessor,
    pub relayout: RelayoutController,
    size: Vector2,
}

impl Scene {
    pub fn new(size: Vector2) -> Self {
        Self {
            nodes: NodeTree::new(),
            renderers: RendererArena::new(),
            shaders: ShaderArena::new(),
            layers: vec![Layer::new()],
            gestures: GestureProcessor::new(),
            relayout: RelayoutController::new(),
            size,
        }
    }

    pub fn size(&self) -> Vector2 {
        self.size
    }

    pub fn set_size(&mut self, size: Vector2) {
        self.size = size;
    }
}

/// Drives the frame loop: drains messages, advances gestures, negotiates
/// layout, refreshes world matrices, builds render instructions, flushes
/// deferred teardown and flips the buffer index, in that order, once per
/// tick.
pub struct Core {
    scene: Scene,
    messages: MessageQueue,
    builder: RenderInstructionBuilder,
    instruction: RenderInstruction,
    buffer_index: BufferIndex,
    view_matrix: Matrix,
    view_matrix_changed: bool,
    pending_touches: Vec<TouchEvent>,
}

impl Core {
    pub fn new(size: Vector2) -> Self {
        Self {
            scene: Scene::new(size),
            messages: MessageQueue::new(),
            builder: RenderInstructionBuilder::new(),
            instruction: RenderInstruction::default(),
            buffer_index: 0,
            view_matrix: Matrix::IDENTITY,
            view_matrix_changed: true,
            pending_touches: Vec::new(),
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// Handle for the event thread to enqueue scene mutations.
    pub fn message_sender(&self) -> MessageSender {
        self.messages.sender()
    }

    /// The buffer index the current frame reads from.
    pub fn buffer_index(&self) -> BufferIndex {
        self.buffer_index
    }

    /// Queue a raw touch event for the next update.
    pub fn feed_touch(&mut self, event: TouchEvent) {
        self.pending_touches.push(event);
    }

    pub fn set_view_matrix(&mut self, view: Matrix) {
        if self.view_matrix != view {
            self.view_matrix = view;
            self.view_matrix_changed = true;
        }
    }

    /// The render lists produced by the last update; the sole interface
    /// handed to the graphics backend.
    pub fn render_instruction(&self) -> &RenderInstruction {
        &self.instruction
    }

    /// Run one frame tick at `now` (milliseconds, monotonic).
    ///
    /// Messages enqueued before this call are applied before any property
    /// read of this frame; messages enqueued during it apply next frame.
    pub fn update(&mut self, now: u32) {
        let index = self.buffer_index;
        debug!("frame update, buffer {}", index);

        self.messages.process(&mut self.scene);

        {
            let Scene {
                ref nodes,
                ref mut gestures,
                ..
            } = self.scene;
            for event in self.pending_touches.drain(..) {
                gestures.process_touch(nodes, index, &event);
            }
            gestures.poll(nodes, index, now);
        }

        let size = self.scene.size();
        self.scene
            .relayout
            .process_requests(&mut self.scene.nodes, size, index);

        self.scene.nodes.update_world_matrices(index);

        self.builder.build(
            index,
            &self.scene.nodes,
            &self.scene.renderers,
            &mut self.scene.layers,
            &self.view_matrix,
            self.view_matrix_changed,
            &mut self.instruction,
        );
        self.view_matrix_changed = false;

        // Teardown runs after instruction hand-off so nothing this frame
        // referenced has been freed under it.
        self.scene.nodes.flush_removals();

        self.buffer_index = other_buffer(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vector3;

    #[test]
    fn test_buffer_index_flips_each_frame() {
        let mut core = Core::new(Vector2::new(480.0, 800.0));
        assert_eq!(core.buffer_index(), 0);
        core.update(16);
        assert_eq!(core.buffer_index(), 1);
        core.update(33);
        assert_eq!(core.buffer_index(), 0);
    }

    #[test]
    fn test_message_applies_before_frame_reads() {
        let mut core = Core::new(Vector2::new(480.0, 800.0));
        let node = core.scene_mut().nodes.create_node();

        let sender = core.message_sender();
        sender.send(Box::new(move |scene: &mut Scene| {
            if let Some(n) = scene.nodes.get_mut(node) {
                n.position.set(0, Vector3::new(7.0, 0.0, 0.0));
            }
        }));

        core.update(16);

        // The world matrix computed this frame already sees the change.
        let index = 0; // the frame that just ran
        let world = core.scene().nodes.get(node).unwrap().world_matrix.get(index);
        assert!((world.translation3().x - 7.0).abs() < 1e-5);
    }

    #[test]
    fn test_removal_deferred_past_instruction_build() {
        let mut core = Core::new(Vector2::new(480.0, 800.0));
        let node = core.scene_mut().nodes.create_node();

        core.scene_mut().nodes.schedule_removal(node);
        assert!(core.scene().nodes.is_alive(node));

        core.update(16);
        assert!(!core.scene().nodes.is_alive(node));
    }
}
