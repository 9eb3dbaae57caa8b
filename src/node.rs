//! Arena-based scene-graph node storage.
//!
//! Nodes live in a sparse-set arena with generational indices: a `NodeId`
//! carries index + generation so a stale handle to a reallocated slot is
//! detected instead of silently aliasing a new node (ABA guard). Parent
//! links are plain `NodeId`s: non-owning back-references that become
//! invalid (and detectable) when the parent is removed.
//!
//! Transform properties are double-buffered; the world matrix for buffer
//! index B is valid only after the parent's world matrix for B has been
//! computed this frame, which `update_world_matrices` guarantees with a
//! single top-down pass.

use crate::math::{Matrix, Quaternion, Vector3};
use crate::property::{BufferIndex, DoubleBuffered};
use crate::relayout::RelayoutData;
use crate::rendering::renderer::RendererId;

/// Unique identifier for a node in the scene graph.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Pack into a u64 (generation high, index low) for external keys.
    pub fn as_u64(self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }
}

/// One scene-graph element: double-buffered local transform, derived world
/// matrix, appearance flags, tree links and attached renderers.
pub struct Node {
    /// Local translation relative to the parent.
    pub position: DoubleBuffered<Vector3>,
    /// Local orientation.
    pub orientation: DoubleBuffered<Quaternion>,
    /// Local scale.
    pub scale: DoubleBuffered<Vector3>,
    /// Size of the node (width, height, depth); origin is the node's
    /// top-left corner in local space.
    pub size: DoubleBuffered<Vector3>,
    /// World transform, recomputed once per frame from the parent chain.
    pub world_matrix: DoubleBuffered<Matrix>,
    /// Whether the node (and its subtree) is drawn and hittable.
    pub visible: DoubleBuffered<bool>,
    /// Node opacity in [0, 1].
    pub opacity: DoubleBuffered<f32>,
    /// Size-negotiation state.
    pub relayout: RelayoutData,
    /// Renderers attached to this node, in draw order.
    pub renderers: Vec<RendererId>,

    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new() -> Self {
        Self {
            position: DoubleBuffered::new(Vector3::ZERO),
            orientation: DoubleBuffered::new(Quaternion::IDENTITY),
            scale: DoubleBuffered::new(Vector3::ONE),
            size: DoubleBuffered::new(Vector3::ZERO),
            world_matrix: DoubleBuffered::new(Matrix::IDENTITY),
            visible: DoubleBuffered::new(true),
            opacity: DoubleBuffered::new(1.0),
            relayout: RelayoutData::new(),
            renderers: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Compose the local transform for the given buffer:
    /// scale, then rotation, then translation.
    pub fn local_matrix(&self, index: BufferIndex) -> Matrix {
        let mut m = Matrix::IDENTITY;
        m.set_transform_components(
            *self.scale.get(index),
            *self.orientation.get(index),
            *self.position.get(index),
        );
        m
    }
}

struct SparseEntry {
    dense_index: usize,
    generation: u32,
}

struct Slot {
    node: Node,
    id: NodeId,
}

/// Central arena for scene-graph nodes.
///
/// Dense storage for cache-friendly frame passes, sparse map for O(1)
/// lookup by id, swap-remove for O(1) deletion. Subtree teardown is
/// deferred to the end of the frame so references held by the frame in
/// flight stay valid (double-buffer-safe teardown).
pub struct NodeTree {
    dense: Vec<Slot>,
    sparse: Vec<Option<SparseEntry>>,
    free_indices: Vec<u32>,
    roots: Vec<NodeId>,
    pending_removals: Vec<NodeId>,
}

impl Default for NodeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeTree {
    pub fn new() -> Self {
        Self {
            dense: Vec::new(),
            sparse: Vec::new(),
            free_indices: Vec::new(),
            roots: Vec::new(),
            pending_removals: Vec::new(),
        }
    }

    /// Create a new detached node and return its id. The node becomes a
    /// root until attached to a parent.
    pub fn create_node(&mut self) -> NodeId {
        let node = Node::new();
        let id = if let Some(index) = self.free_indices.pop() {
            let entry = self.sparse[index as usize]
                .as_mut()
                .expect("free slot must retain its entry for generation reuse");
            entry.dense_index = self.dense.len();
            NodeId::new(index, entry.generation)
        } else {
            let index = self.sparse.len() as u32;
            self.sparse.push(Some(SparseEntry {
                dense_index: self.dense.len(),
                generation: 0,
            }));
            NodeId::new(index, 0)
        };

        self.dense.push(Slot { node, id });
        self.roots.push(id);
        id
    }

    pub fn is_alive(&self, id: NodeId) -> bool {
        self.dense_index(id).is_some()
    }

    fn dense_index(&self, id: NodeId) -> Option<usize> {
        match self.sparse.get(id.index as usize) {
            Some(Some(entry)) if entry.generation == id.generation => {
                // A freed slot keeps its entry; check it still points at us.
                let slot = &self.dense.get(entry.dense_index)?;
                (slot.id == id).then_some(entry.dense_index)
            }
            _ => None,
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.dense_index(id).map(|i| &self.dense[i].node)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.dense_index(id).map(|i| &mut self.dense[i].node)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Attach `child` under `parent`, detaching it from its previous
    /// parent (or the root list) first. Insertion order is draw order.
    /// Attaching a node under itself or one of its descendants is ignored.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.is_alive(parent) || !self.is_alive(child) {
            return;
        }
        let mut ancestor = Some(parent);
        while let Some(id) = ancestor {
            if id == child {
                return;
            }
            ancestor = self.get(id).and_then(|n| n.parent);
        }

        self.detach(child);
        // A parented node must appear exactly once in the traversal, under
        // its parent; a stray root entry would seed it a second time with
        // an identity parent matrix.
        self.roots.retain(|r| *r != child);

        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.get_mut(parent) {
            node.children.push(child);
        }
    }

    /// Detach a node from its parent, making it a root.
    pub fn detach(&mut self, id: NodeId) {
        let Some(node) = self.get(id) else { return };
        match node.parent {
            Some(parent) => {
                if let Some(p) = self.get_mut(parent) {
                    p.children.retain(|c| *c != id);
                }
                if let Some(n) = self.get_mut(id) {
                    n.parent = None;
                }
                self.roots.push(id);
            }
            None => {
                // Already a root.
            }
        }
    }

    /// Schedule a node (and its subtree) for removal at the end of the
    /// frame. The frame already in flight may still be holding references,
    /// so the actual free is deferred to `flush_removals`.
    pub fn schedule_removal(&mut self, id: NodeId) {
        if self.is_alive(id) {
            self.pending_removals.push(id);
        }
    }

    /// Free every scheduled subtree. Called by the frame loop after render
    /// instructions have been handed off.
    pub fn flush_removals(&mut self) {
        let pending = std::mem::take(&mut self.pending_removals);
        for id in pending {
            self.remove_subtree(id);
        }
    }

    fn remove_subtree(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            return;
        }
        let children = self
            .get(id)
            .map(|n| n.children.clone())
            .unwrap_or_default();
        for child in children {
            self.remove_subtree(child);
        }
        self.detach(id);
        self.roots.retain(|r| *r != id);
        self.remove_slot(id);
    }

    fn remove_slot(&mut self, id: NodeId) {
        let Some(dense_index) = self.dense_index(id) else {
            return;
        };

        self.dense.swap_remove(dense_index);

        // Fix up the sparse entry of whichever slot got swapped in.
        if dense_index < self.dense.len() {
            let moved_id = self.dense[dense_index].id;
            if let Some(Some(entry)) = self.sparse.get_mut(moved_id.index as usize) {
                entry.dense_index = dense_index;
            }
        }

        if let Some(Some(entry)) = self.sparse.get_mut(id.index as usize) {
            entry.generation = entry.generation.wrapping_add(1);
            self.free_indices.push(id.index);
        }
    }

    /// Recompute every node's world matrix for the given buffer, parents
    /// strictly before children.
    pub fn update_world_matrices(&mut self, index: BufferIndex) {
        let mut stack: Vec<(NodeId, Matrix)> = self
            .roots
            .iter()
            .map(|id| (*id, Matrix::IDENTITY))
            .collect();

        while let Some((id, parent_world)) = stack.pop() {
            let Some(node) = self.get_mut(id) else { continue };
            let world = parent_world * node.local_matrix(index);
            // Derived per-frame value: write only this frame's buffer, the
            // other buffer belongs to the frame still in flight.
            *node.world_matrix.get_mut(index) = world;
            let children = node.children.clone();
            for child in children {
                stack.push((child, world));
            }
        }
    }

    /// Iterate all live node ids.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.dense.iter().map(|slot| slot.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_lookup() {
        let mut tree = NodeTree::new();
        let id = tree.create_node();
        assert!(tree.is_alive(id));
        assert!(tree.get(id).is_some());
        assert_eq!(tree.roots(), &[id]);
    }

    #[test]
    fn test_stale_id_after_removal() {
        let mut tree = NodeTree::new();
        let id = tree.create_node();
        tree.schedule_removal(id);
        assert!(tree.is_alive(id), "removal is deferred to end of frame");
        tree.flush_removals();
        assert!(!tree.is_alive(id));

        // Slot reuse must not resurrect the old id.
        let id2 = tree.create_node();
        assert!(!tree.is_alive(id));
        assert!(tree.is_alive(id2));
        assert_ne!(id.as_u64(), id2.as_u64());
    }

    #[test]
    fn test_subtree_removal() {
        let mut tree = NodeTree::new();
        let root = tree.create_node();
        let child = tree.create_node();
        let grandchild = tree.create_node();
        tree.add_child(root, child);
        tree.add_child(child, grandchild);

        tree.schedule_removal(child);
        tree.flush_removals();

        assert!(tree.is_alive(root));
        assert!(!tree.is_alive(child));
        assert!(!tree.is_alive(grandchild));
        assert!(tree.get(root).unwrap().children().is_empty());
    }

    #[test]
    fn test_world_matrix_composes_parent_chain() {
        let mut tree = NodeTree::new();
        let parent = tree.create_node();
        let child = tree.create_node();
        tree.add_child(parent, child);

        tree.get_mut(parent)
            .unwrap()
            .position
            .set(0, Vector3::new(10.0, 0.0, 0.0));
        tree.get_mut(child)
            .unwrap()
            .position
            .set(0, Vector3::new(0.0, 5.0, 0.0));

        tree.update_world_matrices(0);

        let world = *tree.get(child).unwrap().world_matrix.get(0);
        let p = world.transform_point(Vector3::ZERO);
        assert!((p.x - 10.0).abs() < 1e-5);
        assert!((p.y - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_parented_node_leaves_the_root_list() {
        let mut tree = NodeTree::new();
        // Creation order must not matter: the child slot precedes the
        // parent slot here, so a stray root entry for the child would be
        // traversed after the parent pass and overwrite its world matrix.
        let child = tree.create_node();
        let parent = tree.create_node();
        tree.add_child(parent, child);
        assert_eq!(tree.roots(), &[parent]);

        tree.get_mut(parent)
            .unwrap()
            .position
            .set(0, Vector3::new(10.0, 0.0, 0.0));
        tree.update_world_matrices(0);

        let p = tree.get(child).unwrap().world_matrix.get(0).translation3();
        assert!((p.x - 10.0).abs() < 1e-5, "child must inherit the parent offset");

        // Detaching restores exactly one root entry.
        tree.detach(child);
        assert_eq!(tree.roots().len(), 2);
        tree.add_child(parent, child);
        assert_eq!(tree.roots(), &[parent]);
    }

    #[test]
    fn test_add_child_rejects_ancestor_cycle() {
        let mut tree = NodeTree::new();
        let root = tree.create_node();
        let child = tree.create_node();
        let grandchild = tree.create_node();
        tree.add_child(root, child);
        tree.add_child(child, grandchild);

        tree.add_child(grandchild, root);
        assert!(tree.get(root).unwrap().parent().is_none());
        assert!(tree.get(grandchild).unwrap().children().is_empty());

        tree.add_child(root, root);
        assert!(tree.get(root).unwrap().parent().is_none());

        // The tree is still traversable top-down.
        tree.update_world_matrices(0);
    }

    #[test]
    fn test_world_matrix_respects_buffer_index() {
        let mut tree = NodeTree::new();
        let n = tree.create_node();
        tree.get_mut(n)
            .unwrap()
            .position
            .bake(0, Vector3::new(3.0, 0.0, 0.0));

        // Buffer 0 still sees the old position.
        tree.update_world_matrices(0);
        let w0 = tree.get(n).unwrap().world_matrix.get(0).translation3();
        assert!(w0.x.abs() < 1e-5);

        // After the flip, buffer 1 sees the baked value.
        tree.update_world_matrices(1);
        let w1 = tree.get(n).unwrap().world_matrix.get(1).translation3();
        assert!((w1.x - 3.0).abs() < 1e-5);
    }
}
