//! Application-facing gesture detectors.
//!
//! A detector asks to be told about one gesture family on a set of attached
//! nodes, with per-family configuration (touch-count range, tap count,
//! directional constraints). Attachment is by id, non-owning: a node that
//! leaves the scene simply stops producing hits.

use std::f32::consts::PI;

use crate::gestures::events::{
    LongPressGesture, PanGesture, PinchGesture, RotationGesture, TapGesture,
};
use crate::math::wrap_in_domain;
use crate::node::NodeId;

/// Default angular window around a registered pan direction.
pub const DEFAULT_DIRECTION_THRESHOLD: f32 = PI * 0.25;

/// Handle to a detector registered with the gesture processor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct DetectorId(pub(crate) usize);

pub type PanCallback = Box<dyn FnMut(NodeId, &PanGesture)>;
pub type TapCallback = Box<dyn FnMut(NodeId, &TapGesture)>;
pub type LongPressCallback = Box<dyn FnMut(NodeId, &LongPressGesture)>;
pub type PinchCallback = Box<dyn FnMut(NodeId, &PinchGesture)>;
pub type RotationCallback = Box<dyn FnMut(NodeId, &RotationGesture)>;

fn attach_to(attached: &mut Vec<NodeId>, node: NodeId) {
    if !attached.contains(&node) {
        attached.push(node);
    }
}

/// Detects pans on its attached nodes.
pub struct PanGestureDetector {
    pub min_touches: usize,
    pub max_touches: usize,
    /// Oldest motion sample (ms) the recognizer may use for displacement
    /// and velocity; unlimited by default.
    pub maximum_motion_event_age: u32,
    /// Registered (angle, threshold) pairs, radians. Empty means any
    /// direction is allowed.
    angles: Vec<(f32, f32)>,
    attached: Vec<NodeId>,
    pub(crate) callback: PanCallback,
}

impl PanGestureDetector {
    pub fn new(callback: PanCallback) -> Self {
        Self {
            min_touches: 1,
            max_touches: 1,
            maximum_motion_event_age: u32::MAX,
            angles: Vec::new(),
            attached: Vec::new(),
            callback,
        }
    }

    pub fn attach(&mut self, node: NodeId) {
        attach_to(&mut self.attached, node);
    }

    pub fn detach(&mut self, node: NodeId) {
        self.attached.retain(|n| *n != node);
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        self.attached.contains(&node)
    }

    /// Register an allowed pan angle. A threshold above π means any panned
    /// angle matches this entry.
    pub fn add_angle(&mut self, angle: f32, threshold: f32) {
        let threshold = threshold.abs().min(PI);
        let angle = wrap_in_domain(angle, -PI, PI);
        self.angles.push((angle, threshold));
    }

    /// Register a direction: the angle and its opposite, so a pan along
    /// the whole axis matches.
    pub fn add_direction(&mut self, direction: f32, threshold: f32) {
        self.add_angle(direction, threshold);
        self.add_angle(opposite_angle(direction), threshold);
    }

    pub fn remove_angle(&mut self, angle: f32) {
        let angle = wrap_in_domain(angle, -PI, PI);
        if let Some(pos) = self.angles.iter().position(|(a, _)| *a == angle) {
            self.angles.remove(pos);
        }
    }

    pub fn clear_angles(&mut self) {
        self.angles.clear();
    }

    pub fn angle_count(&self) -> usize {
        self.angles.len()
    }

    pub fn requires_directional_pan(&self) -> bool {
        !self.angles.is_empty()
    }

    /// Whether a pan at the given local-space angle may fire this detector.
    pub fn check_angle_allowed(&self, angle: f32) -> bool {
        if self.angles.is_empty() {
            return true;
        }
        self.angles.iter().any(|(allowed, threshold)| {
            let relative = wrap_in_domain(angle - allowed, -PI, PI).abs();
            relative <= *threshold
        })
    }

    pub fn touch_count_in_range(&self, touches: usize) -> bool {
        touches >= self.min_touches && touches <= self.max_touches
    }
}

fn opposite_angle(angle: f32) -> f32 {
    if angle <= 0.0 {
        angle + PI
    } else {
        angle - PI
    }
}

/// Detects N consecutive taps on its attached nodes.
pub struct TapGestureDetector {
    pub min_taps: u32,
    pub max_taps: u32,
    attached: Vec<NodeId>,
    pub(crate) callback: TapCallback,
}

impl TapGestureDetector {
    pub fn new(callback: TapCallback) -> Self {
        Self {
            min_taps: 1,
            max_taps: 1,
            attached: Vec::new(),
            callback,
        }
    }

    pub fn with_taps(taps: u32, callback: TapCallback) -> Self {
        Self {
            min_taps: taps,
            max_taps: taps,
            attached: Vec::new(),
            callback,
        }
    }

    pub fn attach(&mut self, node: NodeId) {
        attach_to(&mut self.attached, node);
    }

    pub fn detach(&mut self, node: NodeId) {
        self.attached.retain(|n| *n != node);
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        self.attached.contains(&node)
    }

    pub fn taps_in_range(&self, taps: u32) -> bool {
        taps >= self.min_taps && taps <= self.max_taps
    }
}

/// Detects long presses on its attached nodes.
pub struct LongPressGestureDetector {
    pub min_touches: usize,
    pub max_touches: usize,
    attached: Vec<NodeId>,
    pub(crate) callback: LongPressCallback,
}

impl LongPressGestureDetector {
    pub fn new(callback: LongPressCallback) -> Self {
        Self {
            min_touches: 1,
            max_touches: 1,
            attached: Vec::new(),
            callback,
        }
    }

    pub fn attach(&mut self, node: NodeId) {
        attach_to(&mut self.attached, node);
    }

    pub fn detach(&mut self, node: NodeId) {
        self.attached.retain(|n| *n != node);
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        self.attached.contains(&node)
    }
}

/// Detects pinches on its attached nodes.
pub struct PinchGestureDetector {
    attached: Vec<NodeId>,
    pub(crate) callback: PinchCallback,
}

impl PinchGestureDetector {
    pub fn new(callback: PinchCallback) -> Self {
        Self {
            attached: Vec::new(),
            callback,
        }
    }

    pub fn attach(&mut self, node: NodeId) {
        attach_to(&mut self.attached, node);
    }

    pub fn detach(&mut self, node: NodeId) {
        self.attached.retain(|n| *n != node);
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        self.attached.contains(&node)
    }
}

/// Detects two-finger rotations on its attached nodes.
pub struct RotationGestureDetector {
    attached: Vec<NodeId>,
    pub(crate) callback: RotationCallback,
}

impl RotationGestureDetector {
    pub fn new(callback: RotationCallback) -> Self {
        Self {
            attached: Vec::new(),
            callback,
        }
    }

    pub fn attach(&mut self, node: NodeId) {
        attach_to(&mut self.attached, node);
    }

    pub fn detach(&mut self, node: NodeId) {
        self.attached.retain(|n| *n != node);
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        self.attached.contains(&node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> PanGestureDetector {
        PanGestureDetector::new(Box::new(|_, _| {}))
    }

    #[test]
    fn test_empty_angle_set_allows_any_direction() {
        let d = detector();
        assert!(d.check_angle_allowed(0.0));
        assert!(d.check_angle_allowed(2.5));
        assert!(d.check_angle_allowed(-3.0));
    }

    #[test]
    fn test_angle_window() {
        let mut d = detector();
        d.add_angle(0.0, DEFAULT_DIRECTION_THRESHOLD);

        assert!(d.check_angle_allowed(0.0));
        assert!(d.check_angle_allowed(0.7), "within the π/4 window");
        assert!(!d.check_angle_allowed(1.0), "outside the window");
        assert!(!d.check_angle_allowed(PI), "opposite not registered");
    }

    #[test]
    fn test_direction_registers_opposite_angle() {
        let mut d = detector();
        d.add_direction(0.0, DEFAULT_DIRECTION_THRESHOLD);

        assert_eq!(d.angle_count(), 2);
        assert!(d.check_angle_allowed(0.0));
        assert!(d.check_angle_allowed(PI), "opposite direction covered");
        assert!(!d.check_angle_allowed(PI / 2.0));
    }

    #[test]
    fn test_angle_wraps_into_domain() {
        let mut d = detector();
        // 3π wraps to π.
        d.add_angle(3.0 * PI, 0.1);
        assert!(d.check_angle_allowed(PI));
    }

    #[test]
    fn test_oversized_threshold_matches_everything() {
        let mut d = detector();
        d.add_angle(0.0, 10.0);
        assert!(d.check_angle_allowed(PI));
        assert!(d.check_angle_allowed(-PI / 2.0));
    }
}
