//! Per-frame render-instruction building.
//!
//! Walks the sorted layer list back-to-front and produces ordered, flagged
//! render-item lists (stencil, opaque, transparent, overlay) for a single
//! depth-correct draw order. Lists from the previous frame are reused
//! verbatim when the layer is unchanged and the view matrix did not move,
//! skipping the per-item model-view multiply.

use bitflags::bitflags;
use log::{debug, trace};

use crate::math::{equals, Matrix};
use crate::node::NodeTree;
use crate::property::BufferIndex;
use crate::rendering::layer::{Layer, LayerBehavior, RenderCategory, Renderable};
use crate::rendering::renderer::{RendererArena, RendererId};

bitflags! {
    /// Buffer state required before drawing a render list.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct RenderFlags: u32 {
        const DEPTH_BUFFER_ENABLED   = 1 << 0;
        const DEPTH_WRITE            = 1 << 1;
        const DEPTH_CLEAR            = 1 << 2;
        const STENCIL_BUFFER_ENABLED = 1 << 3;
        const STENCIL_WRITE          = 1 << 4;
        const STENCIL_CLEAR          = 1 << 5;
    }
}

/// One draw call: a renderer plus the model-view matrix computed for it
/// this frame.
#[derive(Clone, Copy, Debug)]
pub struct RenderItem {
    pub renderer: RendererId,
    pub model_view: Matrix,
    pub depth_index: i32,
}

/// A per-(layer, category) ordered sequence of render items for one frame.
#[derive(Default)]
pub struct RenderList {
    pub items: Vec<RenderItem>,
    pub flags: RenderFlags,
    /// (layer index, category) this list was built from; reuse requires an
    /// exact match.
    source: Option<(usize, RenderCategory)>,
    /// True when the previous frame's items were kept verbatim.
    reused: bool,
}

impl RenderList {
    pub fn source(&self) -> Option<(usize, RenderCategory)> {
        self.source
    }

    pub fn was_reused(&self) -> bool {
        self.reused
    }

    fn checksum(&self) -> u64 {
        self.items
            .iter()
            .fold(0u64, |sum, item| sum.wrapping_add(item.renderer.as_u64()))
    }
}

/// The ordered collection of render lists for one render task and frame,
/// the sole interface handed to the graphics backend.
#[derive(Default)]
pub struct RenderInstruction {
    lists: Vec<RenderList>,
    in_use: usize,
}

impl RenderInstruction {
    pub fn lists(&self) -> &[RenderList] {
        &self.lists[..self.in_use]
    }

    fn begin_frame(&mut self) {
        self.in_use = 0;
    }

    /// Hand out the next list slot, retaining last frame's content so the
    /// builder can attempt reuse.
    fn next_free_list(&mut self) -> &mut RenderList {
        if self.in_use == self.lists.len() {
            self.lists.push(RenderList::default());
        }
        self.in_use += 1;
        let list = &mut self.lists[self.in_use - 1];
        list.reused = false;
        list
    }

    fn complete_frame(&mut self) {
        self.lists.truncate(self.in_use);
    }
}

/// Sort attributes gathered per item so the comparator never chases ids
/// mid-sort.
#[derive(Clone, Copy)]
struct SortEntry {
    item: RenderItem,
    z_value: f32,
    shader: u32,
    texture_set: u32,
    geometry: u32,
}

/// Builds render instructions once per frame per render task.
pub struct RenderInstructionBuilder {
    sorting_helper: Vec<SortEntry>,
    mv_multiply_count: u64,
}

impl Default for RenderInstructionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderInstructionBuilder {
    pub fn new() -> Self {
        Self {
            sorting_helper: Vec::new(),
            mv_multiply_count: 0,
        }
    }

    /// Number of model-view multiplies performed so far. Static layers
    /// reusing their lists do not advance this counter.
    pub fn model_view_multiply_count(&self) -> u64 {
        self.mv_multiply_count
    }

    /// Build the frame's instruction from the sorted layer list (index 0
    /// is the back layer).
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        &mut self,
        index: BufferIndex,
        nodes: &NodeTree,
        renderers: &RendererArena,
        layers: &mut [Layer],
        view_matrix: &Matrix,
        view_matrix_changed: bool,
        instruction: &mut RenderInstruction,
    ) {
        instruction.begin_frame();

        for (layer_index, layer) in layers.iter_mut().enumerate() {
            let lists = layer.collect(nodes, renderers, index);

            let stencil_exists = !lists.stencil.is_empty();
            let opaque_exists = !lists.opaque.is_empty();
            let transparent_exists = !lists.transparent.is_empty();
            let overlay_exists = !lists.overlay.is_empty();
            let depth_test_disabled = layer.depth_test_disabled;
            let try_reuse = !view_matrix_changed && !layer.is_dirty();

            trace!(
                "layer {}: stencil={} opaque={} transparent={} overlay={} reuse={}",
                layer_index,
                lists.stencil.len(),
                lists.opaque.len(),
                lists.transparent.len(),
                lists.overlay.len(),
                try_reuse
            );

            // Stencils are pointless with nothing to test against them.
            if stencil_exists && (opaque_exists || transparent_exists || overlay_exists) {
                let list = instruction.next_free_list();
                self.fill_list(
                    list,
                    (layer_index, RenderCategory::Stencil),
                    &lists.stencil,
                    nodes,
                    renderers,
                    view_matrix,
                    index,
                    try_reuse,
                );
                list.flags = RenderFlags::STENCIL_CLEAR
                    | RenderFlags::STENCIL_WRITE
                    | RenderFlags::STENCIL_BUFFER_ENABLED;
            }

            if opaque_exists {
                let list = instruction.next_free_list();
                self.fill_list(
                    list,
                    (layer_index, RenderCategory::Opaque),
                    &lists.opaque,
                    nodes,
                    renderers,
                    view_matrix,
                    index,
                    try_reuse,
                );
                if !list.reused {
                    self.sort_opaque(list, renderers);
                }
                list.flags = opaque_flags(
                    list,
                    renderers,
                    transparent_exists,
                    stencil_exists,
                    depth_test_disabled,
                );
            }

            if transparent_exists {
                let list = instruction.next_free_list();
                self.fill_list(
                    list,
                    (layer_index, RenderCategory::Transparent),
                    &lists.transparent,
                    nodes,
                    renderers,
                    view_matrix,
                    index,
                    try_reuse,
                );
                if !list.reused {
                    self.sort_transparent(list, renderers, layer);
                }
                list.flags =
                    transparent_flags(opaque_exists, stencil_exists, depth_test_disabled);
            }

            if overlay_exists {
                let list = instruction.next_free_list();
                self.fill_list(
                    list,
                    (layer_index, RenderCategory::Overlay),
                    &lists.overlay,
                    nodes,
                    renderers,
                    view_matrix,
                    index,
                    try_reuse,
                );
                list.flags = if stencil_exists {
                    RenderFlags::STENCIL_BUFFER_ENABLED
                } else {
                    RenderFlags::empty()
                };
            }

            layer.clear_dirty();
        }

        instruction.complete_frame();
        debug!(
            "built render instruction: {} lists, {} mv multiplies total",
            instruction.lists().len(),
            self.mv_multiply_count
        );
    }

    /// Populate a list, preferring verbatim reuse of last frame's items.
    #[allow(clippy::too_many_arguments)]
    fn fill_list(
        &mut self,
        list: &mut RenderList,
        source: (usize, RenderCategory),
        renderables: &[Renderable],
        nodes: &NodeTree,
        renderers: &RendererArena,
        view_matrix: &Matrix,
        index: BufferIndex,
        try_reuse: bool,
    ) {
        if try_reuse && list.source == Some(source) && list.items.len() == renderables.len() {
            // The cached list is sorted while renderables are not, so
            // compare a combined sum of renderer ids instead of pairs.
            let new_checksum = renderables
                .iter()
                .fold(0u64, |sum, r| sum.wrapping_add(r.renderer.as_u64()));
            if new_checksum == list.checksum() {
                trace!("reusing cached render list for {:?}", source);
                list.reused = true;
                return;
            }
        }

        list.items.clear();
        list.source = Some(source);

        for renderable in renderables {
            let Some(node) = nodes.get(renderable.node) else {
                continue;
            };
            let Some(renderer) = renderers.get(renderable.renderer) else {
                continue;
            };

            let world = node.world_matrix.get(index);
            let model_view = *view_matrix * *world;
            self.mv_multiply_count += 1;

            list.items.push(RenderItem {
                renderer: renderable.renderer,
                model_view,
                depth_index: renderer.depth_index,
            });
        }
    }

    /// Opaque items sort by depth index, then by shader / texture-set /
    /// geometry ids for batch coherence.
    fn sort_opaque(&mut self, list: &mut RenderList, renderers: &RendererArena) {
        if list.items.len() < 2 {
            return;
        }
        self.load_sort_entries(list, renderers, None);
        self.sorting_helper.sort_by(|lhs, rhs| {
            lhs.item
                .depth_index
                .cmp(&rhs.item.depth_index)
                .then_with(|| partial_compare(lhs, rhs))
        });
        self.store_sorted(list);
    }

    /// Transparent items sort back-to-front by Z in 3D layers, by depth
    /// index in 2D layers; ties break on batch keys.
    fn sort_transparent(
        &mut self,
        list: &mut RenderList,
        renderers: &RendererArena,
        layer: &Layer,
    ) {
        if list.items.len() < 2 {
            return;
        }
        self.load_sort_entries(list, renderers, Some(layer));

        match layer.behavior {
            LayerBehavior::Layer3D => {
                self.sorting_helper.sort_by(|lhs, rhs| {
                    if equals(lhs.z_value, rhs.z_value) {
                        partial_compare(lhs, rhs)
                    } else {
                        // Greater Z is further away and must draw first.
                        rhs.z_value
                            .partial_cmp(&lhs.z_value)
                            .unwrap_or(std::cmp::Ordering::Equal)
                    }
                });
            }
            LayerBehavior::Layer2D => {
                self.sorting_helper.sort_by(|lhs, rhs| {
                    lhs.item
                        .depth_index
                        .cmp(&rhs.item.depth_index)
                        .then_with(|| partial_compare(lhs, rhs))
                });
            }
        }

        self.store_sorted(list);
    }

    fn load_sort_entries(
        &mut self,
        list: &RenderList,
        renderers: &RendererArena,
        layer: Option<&Layer>,
    ) {
        self.sorting_helper.clear();
        for item in &list.items {
            let (z_value, shader, texture_set, geometry) = match renderers.get(item.renderer) {
                Some(r) => {
                    let z = layer
                        .map(|l| (l.sort_function())(item.model_view.translation3()) + r.sort_modifier)
                        .unwrap_or(0.0);
                    (z, r.shader.0, r.texture_set, r.geometry)
                }
                None => (0.0, 0, 0, 0),
            };
            self.sorting_helper.push(SortEntry {
                item: *item,
                z_value,
                shader,
                texture_set,
                geometry,
            });
        }
    }

    fn store_sorted(&mut self, list: &mut RenderList) {
        for (slot, entry) in list.items.iter_mut().zip(self.sorting_helper.iter()) {
            *slot = entry.item;
        }
    }
}

/// Batch-coherence tie-break: shader, then texture set, then geometry.
fn partial_compare(lhs: &SortEntry, rhs: &SortEntry) -> std::cmp::Ordering {
    lhs.shader
        .cmp(&rhs.shader)
        .then_with(|| lhs.texture_set.cmp(&rhs.texture_set))
        .then_with(|| lhs.geometry.cmp(&rhs.geometry))
}

fn opaque_flags(
    list: &RenderList,
    renderers: &RendererArena,
    transparent_exists: bool,
    stencil_exists: bool,
    depth_test_disabled: bool,
) -> RenderFlags {
    let single_cheap_item = list.items.len() == 1
        && !transparent_exists
        && list
            .items
            .first()
            .and_then(|item| renderers.get(item.renderer))
            .map(|r| !r.requires_depth_test)
            .unwrap_or(false);

    let mut flags = if single_cheap_item {
        // The common "single background image" case: nothing can depth
        // conflict with it, so skip depth test and clear entirely.
        RenderFlags::empty()
    } else if depth_test_disabled {
        RenderFlags::empty()
    } else {
        RenderFlags::DEPTH_BUFFER_ENABLED | RenderFlags::DEPTH_WRITE | RenderFlags::DEPTH_CLEAR
    };

    if stencil_exists {
        flags |= RenderFlags::STENCIL_BUFFER_ENABLED;
    }
    flags
}

fn transparent_flags(
    opaque_exists: bool,
    stencil_exists: bool,
    depth_test_disabled: bool,
) -> RenderFlags {
    // Transparent items never write depth: they do not obscure each other.
    let mut flags = RenderFlags::empty();
    if opaque_exists && !depth_test_disabled {
        // Depth-test against opaque so background objects cannot pop in
        // front of opaque foreground ones.
        flags |= RenderFlags::DEPTH_BUFFER_ENABLED;
    }
    if stencil_exists {
        flags |= RenderFlags::STENCIL_BUFFER_ENABLED;
    }
    flags
}
