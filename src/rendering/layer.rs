//! Layers: painter's-algorithm groupings of renderable nodes.

use crate::math::Vector3;
use crate::node::{NodeId, NodeTree};
use crate::property::BufferIndex;
use crate::rendering::renderer::{RendererArena, RendererId, StencilMode};

/// How a layer orders its transparent items.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum LayerBehavior {
    /// UI content: transparents draw in depth-index order.
    #[default]
    Layer2D,
    /// 3D content: transparents sort back-to-front by Z.
    Layer3D,
}

/// The four render categories a layer splits its renderables into.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RenderCategory {
    Stencil,
    Opaque,
    Transparent,
    Overlay,
}

/// A (node, renderer) pair that may produce one render item this frame.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Renderable {
    pub node: NodeId,
    pub renderer: RendererId,
}

/// Custom transparent-sort function: maps the item's model-view translation
/// to a Z value. Greater values draw earlier (further away).
pub type SortFunction = fn(Vector3) -> f32;

/// Default Z function: distance along the view Z axis.
pub fn default_z_value(translation: Vector3) -> f32 {
    translation.z
}

/// One layer of the scene: an ordered membership of nodes whose renderers
/// are classified into stencil/opaque/transparent/overlay lists each frame.
pub struct Layer {
    pub behavior: LayerBehavior,
    /// Disables depth test/clear for the whole layer.
    pub depth_test_disabled: bool,
    sort_function: SortFunction,
    uses_default_sort: bool,
    members: Vec<NodeId>,
    /// Set when membership or attached renderers changed since the last
    /// frame; gates render-list reuse.
    dirty: bool,
}

impl Default for Layer {
    fn default() -> Self {
        Self::new()
    }
}

impl Layer {
    pub fn new() -> Self {
        Self {
            behavior: LayerBehavior::Layer2D,
            depth_test_disabled: false,
            sort_function: default_z_value,
            uses_default_sort: true,
            members: Vec::new(),
            dirty: true,
        }
    }

    pub fn with_behavior(behavior: LayerBehavior) -> Self {
        Self {
            behavior,
            ..Self::new()
        }
    }

    /// Override the transparent sort function.
    pub fn set_sort_function(&mut self, f: SortFunction) {
        self.sort_function = f;
        self.uses_default_sort = false;
        self.dirty = true;
    }

    pub fn sort_function(&self) -> SortFunction {
        self.sort_function
    }

    pub fn uses_default_sort_function(&self) -> bool {
        self.uses_default_sort
    }

    /// Add a node to this layer's draw membership (insertion order is draw
    /// order within a category until sorting applies).
    pub fn add_member(&mut self, node: NodeId) {
        if !self.members.contains(&node) {
            self.members.push(node);
            self.dirty = true;
        }
    }

    pub fn remove_member(&mut self, node: NodeId) {
        let before = self.members.len();
        self.members.retain(|n| *n != node);
        if self.members.len() != before {
            self.dirty = true;
        }
    }

    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    /// Mark the layer changed; the next frame rebuilds its lists.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Split the live, visible membership into per-category renderable
    /// lists for this frame.
    pub fn collect(
        &self,
        nodes: &NodeTree,
        renderers: &RendererArena,
        index: BufferIndex,
    ) -> CategorizedRenderables {
        let mut out = CategorizedRenderables::default();

        for node_id in &self.members {
            let Some(node) = nodes.get(*node_id) else {
                continue;
            };
            if !visible_in_tree(nodes, index, *node_id) {
                continue;
            }
            let node_opaque = *node.opacity.get(index) >= 1.0;

            for renderer_id in &node.renderers {
                let Some(renderer) = renderers.get(*renderer_id) else {
                    continue;
                };
                let renderable = Renderable {
                    node: *node_id,
                    renderer: *renderer_id,
                };
                if renderer.stencil_mode == StencilMode::Mask {
                    out.stencil.push(renderable);
                } else if renderer.overlay {
                    out.overlay.push(renderable);
                } else if renderer.opaque && node_opaque {
                    out.opaque.push(renderable);
                } else {
                    out.transparent.push(renderable);
                }
            }
        }

        out
    }
}

/// Visibility is inherited: hiding a node hides its whole subtree, the
/// same pruning the hit test applies.
fn visible_in_tree(nodes: &NodeTree, index: BufferIndex, id: NodeId) -> bool {
    let mut current = Some(id);
    while let Some(node_id) = current {
        let Some(node) = nodes.get(node_id) else {
            return false;
        };
        if !*node.visible.get(index) {
            return false;
        }
        current = node.parent();
    }
    true
}

/// Per-frame classification of a layer's renderables.
#[derive(Default)]
pub struct CategorizedRenderables {
    pub stencil: Vec<Renderable>,
    pub opaque: Vec<Renderable>,
    pub transparent: Vec<Renderable>,
    pub overlay: Vec<Renderable>,
}
