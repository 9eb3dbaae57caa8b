//! Screen-position hit testing against the scene graph.

use crate::math::{Matrix, Vector2, Vector3};
use crate::node::{NodeId, NodeTree};
use crate::property::BufferIndex;

/// Result of a successful hit test.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitResult {
    pub node: NodeId,
    /// Hit position in the node's local space (origin at its top-left).
    pub local: Vector2,
}

/// Find the topmost visible node whose local rectangle contains the screen
/// position. Draw order is depth-first with later siblings on top, so the
/// last hit in traversal order wins.
pub fn hit_test(tree: &NodeTree, index: BufferIndex, screen: Vector2) -> Option<HitResult> {
    let mut hit = None;
    for root in tree.roots() {
        hit_test_recursive(tree, index, *root, screen, &mut hit);
    }
    hit
}

/// Hit-test a single node, ignoring its children.
pub fn hit_test_node(
    tree: &NodeTree,
    index: BufferIndex,
    id: NodeId,
    screen: Vector2,
) -> Option<HitResult> {
    let node = tree.get(id)?;
    if !*node.visible.get(index) {
        return None;
    }

    let local = screen_to_local(node.world_matrix.get(index), screen)?;
    let size = node.size.get(index);
    let inside = local.x >= 0.0 && local.x <= size.x && local.y >= 0.0 && local.y <= size.y;
    inside.then_some(HitResult { node: id, local })
}

fn hit_test_recursive(
    tree: &NodeTree,
    index: BufferIndex,
    id: NodeId,
    screen: Vector2,
    hit: &mut Option<HitResult>,
) {
    let Some(node) = tree.get(id) else { return };
    if !*node.visible.get(index) {
        // Invisible prunes the whole subtree.
        return;
    }

    if let Some(result) = hit_test_node(tree, index, id, screen) {
        *hit = Some(result);
    }

    for child in node.children() {
        hit_test_recursive(tree, index, *child, screen, hit);
    }
}

/// Map a screen position into a node's local space via its inverse world
/// matrix. Returns `None` for a degenerate (zero-scale) transform.
pub fn screen_to_local(world: &Matrix, screen: Vector2) -> Option<Vector2> {
    let mut inverse = *world;
    if !inverse.invert() {
        return None;
    }
    let local = inverse.transform_point(Vector3::new(screen.x, screen.y, 0.0));
    Some(Vector2::new(local.x, local.y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sized_node(tree: &mut NodeTree, x: f32, y: f32, w: f32, h: f32) -> NodeId {
        let id = tree.create_node();
        let node = tree.get_mut(id).unwrap();
        node.position.set(0, Vector3::new(x, y, 0.0));
        node.size.set(0, Vector3::new(w, h, 0.0));
        id
    }

    #[test]
    fn test_hit_inside_bounds() {
        let mut tree = NodeTree::new();
        let n = sized_node(&mut tree, 0.0, 0.0, 100.0, 100.0);
        tree.update_world_matrices(0);

        let hit = hit_test(&tree, 0, Vector2::new(20.0, 20.0)).unwrap();
        assert_eq!(hit.node, n);
        assert_eq!(hit.local, Vector2::new(20.0, 20.0));

        assert!(hit_test(&tree, 0, Vector2::new(150.0, 20.0)).is_none());
    }

    #[test]
    fn test_translated_node_local_coordinates() {
        let mut tree = NodeTree::new();
        let n = sized_node(&mut tree, 50.0, 50.0, 100.0, 100.0);
        tree.update_world_matrices(0);

        let hit = hit_test(&tree, 0, Vector2::new(60.0, 70.0)).unwrap();
        assert_eq!(hit.node, n);
        assert_eq!(hit.local, Vector2::new(10.0, 20.0));
    }

    #[test]
    fn test_topmost_sibling_wins() {
        let mut tree = NodeTree::new();
        let _below = sized_node(&mut tree, 0.0, 0.0, 100.0, 100.0);
        let above = sized_node(&mut tree, 0.0, 0.0, 100.0, 100.0);
        tree.update_world_matrices(0);

        let hit = hit_test(&tree, 0, Vector2::new(50.0, 50.0)).unwrap();
        assert_eq!(hit.node, above, "later sibling draws on top");
    }

    #[test]
    fn test_invisible_subtree_not_hittable() {
        let mut tree = NodeTree::new();
        let parent = sized_node(&mut tree, 0.0, 0.0, 100.0, 100.0);
        let child = sized_node(&mut tree, 10.0, 10.0, 50.0, 50.0);
        tree.add_child(parent, child);
        tree.get_mut(parent).unwrap().visible.set(0, false);
        tree.update_world_matrices(0);

        assert!(hit_test(&tree, 0, Vector2::new(30.0, 30.0)).is_none());
    }
}
