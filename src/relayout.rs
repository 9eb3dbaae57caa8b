//! Size negotiation.
//!
//! Each node carries a resize policy per dimension; a relayout pass walks
//! the tree resolving every dimension against its dependencies (the other
//! dimension, the parent, or the children). Dependencies may form cycles
//! (parent fits children while a child fills the parent), so the negotiator
//! keeps an explicit recursion stack and treats a revisited (node,
//! dimension) pair as already resolved at its current value, which makes
//! every pass terminate.

use std::collections::HashSet;

use log::{debug, trace};

use crate::math::Vector2;
use crate::node::{NodeId, NodeTree};
use crate::property::BufferIndex;

/// A negotiable dimension of a node's size.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Dimension {
    Width = 0,
    Height = 1,
}

pub const ALL_DIMENSIONS: [Dimension; 2] = [Dimension::Width, Dimension::Height];

impl Dimension {
    pub fn other(self) -> Dimension {
        match self {
            Dimension::Width => Dimension::Height,
            Dimension::Height => Dimension::Width,
        }
    }
}

/// How a node's size in one dimension is decided.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ResizePolicy {
    /// Use the explicitly set preferred size.
    #[default]
    Fixed,
    /// Use the node's natural size (image dimensions, text extents).
    UseNaturalSize,
    /// Take the parent's negotiated size.
    FillToParent,
    /// Parent's size multiplied by a per-dimension factor.
    SizeRelativeToParent,
    /// Parent's size plus a per-dimension offset.
    SizeFixedOffsetFromParent,
    /// Grow to the bounding extent of the children.
    FitToChildren,
    /// Derived from the other dimension via the natural aspect ratio.
    DimensionDependency,
    /// Use the size assigned by the parent's measure pass verbatim.
    UseAssignedSize,
}

impl ResizePolicy {
    fn depends_on_parent(self) -> bool {
        matches!(
            self,
            ResizePolicy::FillToParent
                | ResizePolicy::SizeRelativeToParent
                | ResizePolicy::SizeFixedOffsetFromParent
        )
    }

    fn depends_on_children(self) -> bool {
        self == ResizePolicy::FitToChildren
    }
}

/// How an explicitly set preferred size is reconciled with the natural
/// aspect ratio.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SizeScalePolicy {
    /// Use the set size as-is.
    #[default]
    UseSizeSet,
    /// Scale to fit inside the set size, keeping the natural aspect ratio.
    FitWithAspectRatio,
    /// Scale to fill the set size, keeping the natural aspect ratio.
    FillWithAspectRatio,
}

/// Per-node size-negotiation state.
#[derive(Clone, Debug)]
pub struct RelayoutData {
    policies: [ResizePolicy; 2],
    negotiated: [f32; 2],
    /// Content-defined size used by `UseNaturalSize` and as the aspect
    /// source for `DimensionDependency`.
    pub natural_size: Vector2,
    /// Explicitly set size used by `Fixed`.
    pub preferred_size: Vector2,
    /// Per-dimension factor for `SizeRelativeToParent` / offset for
    /// `SizeFixedOffsetFromParent`.
    pub size_mode_factor: Vector2,
    pub size_scale_policy: SizeScalePolicy,
    minimum: [f32; 2],
    maximum: [f32; 2],
    /// Nodes opt in; a node that never changed policy skips negotiation.
    pub relayout_enabled: bool,
}

impl Default for RelayoutData {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayoutData {
    pub fn new() -> Self {
        Self {
            policies: [ResizePolicy::Fixed; 2],
            negotiated: [0.0; 2],
            natural_size: Vector2::ZERO,
            preferred_size: Vector2::ZERO,
            size_mode_factor: Vector2::ZERO,
            size_scale_policy: SizeScalePolicy::UseSizeSet,
            minimum: [0.0; 2],
            maximum: [f32::MAX; 2],
            relayout_enabled: false,
        }
    }

    pub fn set_policy(&mut self, policy: ResizePolicy, dimension: Dimension) {
        self.policies[dimension as usize] = policy;
        self.relayout_enabled = true;
    }

    pub fn policy(&self, dimension: Dimension) -> ResizePolicy {
        self.policies[dimension as usize]
    }

    pub fn negotiated_size(&self, dimension: Dimension) -> f32 {
        self.negotiated[dimension as usize]
    }

    pub fn negotiated(&self) -> Vector2 {
        Vector2::new(self.negotiated[0], self.negotiated[1])
    }

    pub fn set_minimum_size(&mut self, size: f32, dimension: Dimension) {
        self.minimum[dimension as usize] = size;
    }

    pub fn set_maximum_size(&mut self, size: f32, dimension: Dimension) {
        self.maximum[dimension as usize] = size;
    }

    fn clamp(&self, size: f32, dimension: Dimension) -> f32 {
        size.clamp(self.minimum[dimension as usize], self.maximum[dimension as usize])
    }

    /// Reconcile an explicitly set size with the natural aspect ratio
    /// according to the size-scale policy.
    pub fn apply_size_scale_policy(&self, size: Vector2) -> Vector2 {
        match self.size_scale_policy {
            SizeScalePolicy::UseSizeSet => size,
            SizeScalePolicy::FitWithAspectRatio | SizeScalePolicy::FillWithAspectRatio => {
                if self.natural_size.x <= 0.0 || self.natural_size.y <= 0.0 {
                    return size;
                }
                let sx = size.x / self.natural_size.x;
                let sy = size.y / self.natural_size.y;
                let scale = if self.size_scale_policy == SizeScalePolicy::FitWithAspectRatio {
                    sx.min(sy)
                } else {
                    sx.max(sy)
                };
                Vector2::new(self.natural_size.x * scale, self.natural_size.y * scale)
            }
        }
    }
}

/// Drives size negotiation over a [`NodeTree`].
///
/// Relayout requests accumulate between frames; `process_requests` resolves
/// them once per frame, top-down from each affected subtree root.
#[derive(Default)]
pub struct RelayoutController {
    /// Subtree roots queued for negotiation this frame.
    queue: Vec<NodeId>,
    /// (node, dimension) pairs currently being resolved; a revisit is a
    /// dependency cycle and resolves to the current negotiated value.
    stack: Vec<(NodeId, Dimension)>,
    /// Pairs fully resolved this pass.
    resolved: HashSet<(NodeId, Dimension)>,
}

impl RelayoutController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a node for relayout. The request propagates to the topmost
    /// ancestor whose size depends on its children, since resizing this
    /// node can resize that whole chain.
    pub fn request_relayout(&mut self, tree: &NodeTree, id: NodeId) {
        let mut top = id;
        while let Some(parent) = tree.get(top).and_then(|n| n.parent()) {
            let parent_fits_children = tree
                .get(parent)
                .map(|n| {
                    ALL_DIMENSIONS
                        .iter()
                        .any(|d| n.relayout.policy(*d).depends_on_children())
                })
                .unwrap_or(false);
            if !parent_fits_children {
                break;
            }
            top = parent;
        }
        if !self.queue.contains(&top) {
            trace!("relayout request for {:?} propagated to {:?}", id, top);
            self.queue.push(top);
        }
    }

    pub fn has_pending_requests(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Negotiate every queued subtree against the given allocation (the
    /// scene size for roots) and write the results into node sizes for the
    /// given buffer.
    pub fn process_requests(
        &mut self,
        tree: &mut NodeTree,
        allocation: Vector2,
        index: BufferIndex,
    ) {
        let queue = std::mem::take(&mut self.queue);
        if queue.is_empty() {
            return;
        }
        self.resolved.clear();

        for id in &queue {
            self.negotiate(tree, *id, allocation);
        }
        debug!("relayout pass resolved {} (node, dimension) pairs", self.resolved.len());

        self.apply_sizes(tree, index);
    }

    /// Negotiate a subtree immediately, outside the request queue.
    pub fn negotiate(&mut self, tree: &mut NodeTree, id: NodeId, allocation: Vector2) {
        if !tree.is_alive(id) {
            return;
        }
        for dimension in ALL_DIMENSIONS {
            self.negotiate_dimension(tree, id, dimension, allocation);
        }

        let negotiated = tree
            .get(id)
            .map(|n| n.relayout.negotiated())
            .unwrap_or(allocation);

        let children = tree
            .get(id)
            .map(|n| n.children().to_vec())
            .unwrap_or_default();
        for child in children {
            self.negotiate(tree, child, negotiated);
        }
    }

    fn negotiate_dimension(
        &mut self,
        tree: &mut NodeTree,
        id: NodeId,
        dimension: Dimension,
        allocation: Vector2,
    ) {
        let key = (id, dimension);
        if self.resolved.contains(&key) {
            return;
        }
        if self.stack.contains(&key) {
            // Cycle: resolve at whatever was negotiated so far.
            trace!("relayout cycle at {:?} {:?}, using current value", id, dimension);
            return;
        }

        let (enabled, policy) = match tree.get(id) {
            Some(node) => (
                node.relayout.relayout_enabled,
                node.relayout.policy(dimension),
            ),
            None => return,
        };
        if !enabled {
            // Size is whatever was assigned; record it so dependents see it.
            let assigned = dimension_of(allocation, dimension);
            if let Some(node) = tree.get_mut(id) {
                node.relayout.negotiated[dimension as usize] = assigned;
            }
            self.resolved.insert(key);
            return;
        }

        self.stack.push(key);

        if policy == ResizePolicy::DimensionDependency {
            self.negotiate_dimension(tree, id, dimension.other(), allocation);
        }
        if policy.depends_on_parent() {
            if let Some(parent) = tree.get(id).and_then(|n| n.parent()) {
                self.negotiate_dimension(tree, parent, dimension, allocation);
            }
        }

        let size = self.calculate_size(tree, id, dimension, allocation);
        if let Some(node) = tree.get_mut(id) {
            let clamped = node.relayout.clamp(size, dimension);
            node.relayout.negotiated[dimension as usize] = clamped;
        }

        self.stack.pop();
        self.resolved.insert(key);
    }

    fn calculate_size(
        &mut self,
        tree: &mut NodeTree,
        id: NodeId,
        dimension: Dimension,
        allocation: Vector2,
    ) -> f32 {
        let Some(node) = tree.get(id) else { return 0.0 };
        let data = &node.relayout;
        let dim = dimension as usize;

        match data.policy(dimension) {
            ResizePolicy::Fixed => {
                let preferred = data.apply_size_scale_policy(data.preferred_size);
                dimension_of(preferred, dimension)
            }
            ResizePolicy::UseAssignedSize => dimension_of(allocation, dimension),
            ResizePolicy::UseNaturalSize => dimension_of(data.natural_size, dimension),
            ResizePolicy::FillToParent
            | ResizePolicy::SizeRelativeToParent
            | ResizePolicy::SizeFixedOffsetFromParent => {
                let policy = data.policy(dimension);
                let factor = dimension_of(data.size_mode_factor, dimension);
                let parent_size = node
                    .parent()
                    .and_then(|p| tree.get(p))
                    .map(|p| p.relayout.negotiated[dim])
                    .unwrap_or_else(|| dimension_of(allocation, dimension));
                match policy {
                    ResizePolicy::SizeRelativeToParent => parent_size * factor,
                    ResizePolicy::SizeFixedOffsetFromParent => parent_size + factor,
                    _ => parent_size,
                }
            }
            ResizePolicy::FitToChildren => {
                let children = node.children().to_vec();
                let mut extent: f32 = 0.0;
                for child in children {
                    let child_parent_dependent = tree
                        .get(child)
                        .map(|c| c.relayout.policy(dimension).depends_on_parent())
                        .unwrap_or(true);
                    // A parent-dependent child cannot contribute a size of
                    // its own; skipping it breaks the cycle meaningfully.
                    if child_parent_dependent {
                        continue;
                    }
                    self.negotiate_dimension(tree, child, dimension, allocation);
                    if let Some(c) = tree.get(child) {
                        let child_position = dimension_of(
                            Vector2::new(
                                c.position.get(0).x,
                                c.position.get(0).y,
                            ),
                            dimension,
                        );
                        extent = extent.max(child_position + c.relayout.negotiated[dim]);
                    }
                }
                extent
            }
            ResizePolicy::DimensionDependency => {
                let other = dimension.other();
                let natural = dimension_of(data.natural_size, dimension);
                let natural_other = dimension_of(data.natural_size, other);
                let negotiated_other = data.negotiated[other as usize];
                if natural_other <= 0.0 {
                    natural
                } else {
                    natural * (negotiated_other / natural_other)
                }
            }
        }
    }

    /// Write negotiated sizes into the nodes' size properties.
    fn apply_sizes(&self, tree: &mut NodeTree, index: BufferIndex) {
        let ids: Vec<NodeId> = tree.ids().collect();
        for id in ids {
            if let Some(node) = tree.get_mut(id) {
                if !node.relayout.relayout_enabled {
                    continue;
                }
                let negotiated = node.relayout.negotiated();
                let depth = node.size.get(index).z;
                node.size.set(
                    index,
                    crate::math::Vector3::new(negotiated.x, negotiated.y, depth),
                );
            }
        }
    }
}

fn dimension_of(v: Vector2, dimension: Dimension) -> f32 {
    match dimension {
        Dimension::Width => v.x,
        Dimension::Height => v.y,
    }
}
