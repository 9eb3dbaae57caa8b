//! Gesture processing: routing recognized gestures to detectors.
//!
//! The processor owns one recognizer per gesture family and the registered
//! detectors. It hit-tests the scene when a gesture becomes possible,
//! confirms the target when it starts, then restricts emission to the
//! detectors attached to that one node for the rest of the gesture.

use log::{debug, trace};

use crate::gestures::detector::{
    DetectorId, LongPressGestureDetector, PanGestureDetector, PinchGestureDetector,
    RotationGestureDetector, TapGestureDetector,
};
use crate::gestures::events::{
    GestureState, LongPressGesture, LongPressGestureEvent, PanGesture, PanGestureEvent,
    PinchGesture, PinchGestureEvent, RotationGesture, RotationGestureEvent, TapGesture,
    TapGestureEvent, TouchEvent,
};
use crate::gestures::hit_test::{hit_test, screen_to_local};
use crate::gestures::long_press::{LongPressGestureRecognizer, LongPressGestureRequest};
use crate::gestures::pan::{PanGestureRecognizer, PanGestureRequest};
use crate::gestures::pinch::PinchGestureRecognizer;
use crate::gestures::rotation::RotationGestureRecognizer;
use crate::gestures::tap::{TapGestureRecognizer, TapGestureRequest};
use crate::math::Vector2;
use crate::node::{NodeId, NodeTree};
use crate::property::BufferIndex;

/// A finished pan whose screen velocity is zero substitutes the last
/// recorded velocity if the final sample is at most this old (ms).
const MAXIMUM_TIME_WITH_VALID_LAST_VELOCITY: u32 = 50;

/// Owns the per-family recognizers and detectors, and routes recognized
/// gestures to detector callbacks with actor-local coordinates.
#[derive(Default)]
pub struct GestureProcessor {
    pan_recognizer: PanGestureRecognizer,
    tap_recognizer: TapGestureRecognizer,
    long_press_recognizer: LongPressGestureRecognizer,
    pinch_recognizer: PinchGestureRecognizer,
    rotation_recognizer: RotationGestureRecognizer,

    pan_detectors: Vec<Option<PanGestureDetector>>,
    tap_detectors: Vec<Option<TapGestureDetector>>,
    long_press_detectors: Vec<Option<LongPressGestureDetector>>,
    pinch_detectors: Vec<Option<PinchGestureDetector>>,
    rotation_detectors: Vec<Option<RotationGestureDetector>>,

    pan_node: Option<NodeId>,
    possible_pan_position: Vector2,
    pan_emitters: Vec<DetectorId>,
    last_velocity: Vector2,
    last_screen_velocity: Vector2,

    tap_node: Option<NodeId>,

    press_node: Option<NodeId>,
    press_emitters: Vec<DetectorId>,
    press_started: bool,

    pinch_node: Option<NodeId>,
    pinch_emitters: Vec<DetectorId>,

    rotation_node: Option<NodeId>,
    rotation_emitters: Vec<DetectorId>,
}

impl GestureProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pan_detector(&mut self, detector: PanGestureDetector) -> DetectorId {
        // The first registration decides the recognizer's touch window.
        if self.pan_detectors.iter().all(|d| d.is_none()) {
            self.pan_recognizer.update(PanGestureRequest {
                min_touches: detector.min_touches,
                max_touches: detector.max_touches,
                maximum_motion_event_age: detector.maximum_motion_event_age,
            });
        }
        push_detector(&mut self.pan_detectors, detector)
    }

    pub fn remove_pan_detector(&mut self, id: DetectorId) {
        if let Some(slot) = self.pan_detectors.get_mut(id.0) {
            *slot = None;
        }
        self.pan_emitters.retain(|e| *e != id);
        if self.pan_emitters.is_empty() {
            self.pan_node = None;
        }
    }

    pub fn pan_detector_mut(&mut self, id: DetectorId) -> Option<&mut PanGestureDetector> {
        self.pan_detectors.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn add_tap_detector(&mut self, detector: TapGestureDetector) -> DetectorId {
        if self.tap_detectors.iter().all(|d| d.is_none()) {
            self.tap_recognizer.update(TapGestureRequest {
                min_taps: detector.min_taps,
                max_taps: detector.max_taps,
            });
        }
        push_detector(&mut self.tap_detectors, detector)
    }

    pub fn remove_tap_detector(&mut self, id: DetectorId) {
        if let Some(slot) = self.tap_detectors.get_mut(id.0) {
            *slot = None;
        }
    }

    pub fn add_long_press_detector(&mut self, detector: LongPressGestureDetector) -> DetectorId {
        if self.long_press_detectors.iter().all(|d| d.is_none()) {
            self.long_press_recognizer.update(LongPressGestureRequest {
                min_touches: detector.min_touches,
                max_touches: detector.max_touches,
                ..LongPressGestureRequest::default()
            });
        }
        push_detector(&mut self.long_press_detectors, detector)
    }

    pub fn remove_long_press_detector(&mut self, id: DetectorId) {
        if let Some(slot) = self.long_press_detectors.get_mut(id.0) {
            *slot = None;
        }
        self.press_emitters.retain(|e| *e != id);
    }

    pub fn add_pinch_detector(&mut self, detector: PinchGestureDetector) -> DetectorId {
        push_detector(&mut self.pinch_detectors, detector)
    }

    pub fn remove_pinch_detector(&mut self, id: DetectorId) {
        if let Some(slot) = self.pinch_detectors.get_mut(id.0) {
            *slot = None;
        }
        self.pinch_emitters.retain(|e| *e != id);
    }

    pub fn add_rotation_detector(&mut self, detector: RotationGestureDetector) -> DetectorId {
        push_detector(&mut self.rotation_detectors, detector)
    }

    pub fn remove_rotation_detector(&mut self, id: DetectorId) {
        if let Some(slot) = self.rotation_detectors.get_mut(id.0) {
            *slot = None;
        }
        self.rotation_emitters.retain(|e| *e != id);
    }

    /// Feed one touch event through every recognizer and route whatever
    /// they produce.
    pub fn process_touch(&mut self, tree: &NodeTree, index: BufferIndex, event: &TouchEvent) {
        for pan in self.pan_recognizer.send_event(event) {
            self.process_pan(tree, index, &pan);
        }
        for tap in self.tap_recognizer.send_event(event) {
            self.process_tap(tree, index, &tap);
        }
        for press in self.long_press_recognizer.send_event(event) {
            self.process_long_press(tree, index, &press);
        }
        for pinch in self.pinch_recognizer.send_event(event) {
            self.process_pinch(tree, index, &pinch);
        }
        for rotation in self.rotation_recognizer.send_event(event) {
            self.process_rotation(tree, index, &rotation);
        }
    }

    /// Advance time-based recognition (long press). Called once per frame.
    pub fn poll(&mut self, tree: &NodeTree, index: BufferIndex, now: u32) {
        for press in self.long_press_recognizer.poll(now) {
            self.process_long_press(tree, index, &press);
        }
    }

    /// Drop all gesture state referencing a node that left the scene. The
    /// gesture in progress is abandoned without a further event.
    pub fn node_removed(&mut self, node: NodeId) {
        if self.pan_node == Some(node) {
            self.pan_node = None;
            self.pan_emitters.clear();
        }
        if self.tap_node == Some(node) {
            self.tap_node = None;
        }
        if self.press_node == Some(node) {
            self.press_node = None;
            self.press_emitters.clear();
            self.press_started = false;
        }
        if self.pinch_node == Some(node) {
            self.pinch_node = None;
            self.pinch_emitters.clear();
        }
        if self.rotation_node == Some(node) {
            self.rotation_node = None;
            self.rotation_emitters.clear();
        }
    }

    fn process_pan(&mut self, tree: &NodeTree, index: BufferIndex, event: &PanGestureEvent) {
        trace!("pan {:?} touches {}", event.state, event.number_of_touches);
        match event.state {
            GestureState::Possible => {
                self.pan_emitters.clear();
                self.pan_node = None;
                if let Some(hit) = hit_test(tree, index, event.current_position) {
                    self.pan_node = Some(hit.node);
                    self.possible_pan_position = event.current_position;
                }
            }

            GestureState::Started => {
                // Re-hit-test at the position the pan grew from, not where
                // the finger is now.
                let Some(hit) = hit_test(tree, index, event.previous_position) else {
                    self.pan_node = None;
                    self.pan_emitters.clear();
                    return;
                };
                if self.pan_node != Some(hit.node) {
                    // A different node is on top now; retarget.
                    self.possible_pan_position = event.previous_position;
                    self.pan_node = Some(hit.node);
                }

                let node = hit.node;
                self.pan_emitters = self.matching_pan_detectors(tree, index, node, event);
                if self.pan_emitters.is_empty() {
                    self.pan_node = None;
                } else {
                    debug!("pan started on {:?} with {} emitters", node, self.pan_emitters.len());
                    let emitters = self.pan_emitters.clone();
                    self.emit_pan(tree, index, &emitters, event, GestureState::Started);
                }
            }

            GestureState::Continuing | GestureState::Finished | GestureState::Cancelled => {
                let Some(node) = self.pan_node else { return };

                let hittable = tree
                    .get(node)
                    .map(|n| *n.visible.get(index))
                    .unwrap_or(false);
                if !hittable || self.pan_emitters.is_empty() {
                    // The gestured node left the scene or nothing listens
                    // any more; abandon without emitting.
                    self.pan_emitters.clear();
                    self.pan_node = None;
                    return;
                }

                // Detectors whose touch window no longer matches get one
                // final FINISHED so they terminate cleanly.
                let mut outside_range = Vec::new();
                let mut remaining = Vec::new();
                for id in self.pan_emitters.drain(..) {
                    let in_range = self.pan_detectors[id.0]
                        .as_ref()
                        .map(|d| d.is_attached(node) && d.touch_count_in_range(event.number_of_touches))
                        .unwrap_or(false);
                    let still_attached = self.pan_detectors[id.0]
                        .as_ref()
                        .map(|d| d.is_attached(node))
                        .unwrap_or(false);
                    if in_range {
                        remaining.push(id);
                    } else if still_attached {
                        outside_range.push(id);
                    }
                }
                self.pan_emitters = remaining;

                if !outside_range.is_empty() || !self.pan_emitters.is_empty() {
                    self.emit_pan(tree, index, &outside_range, event, GestureState::Finished);
                    let emitters = self.pan_emitters.clone();
                    self.emit_pan(tree, index, &emitters, event, event.state);
                }

                if self.pan_emitters.is_empty() {
                    self.pan_node = None;
                }
                if event.state == GestureState::Finished || event.state == GestureState::Cancelled {
                    self.pan_emitters.clear();
                    self.pan_node = None;
                }
            }

            GestureState::Clear => {
                panic!("pan recognizer emitted CLEAR, which must never reach the processor");
            }
        }
    }

    /// Detectors attached to `node` whose touch count and directional
    /// constraints match the starting pan.
    fn matching_pan_detectors(
        &self,
        tree: &NodeTree,
        index: BufferIndex,
        node: NodeId,
        event: &PanGestureEvent,
    ) -> Vec<DetectorId> {
        let local_angle = tree.get(node).and_then(|n| {
            let world = n.world_matrix.get(index);
            let start = screen_to_local(world, self.possible_pan_position)?;
            let current = screen_to_local(world, event.current_position)?;
            Some(displacement_angle(current - start))
        });

        self.pan_detectors
            .iter()
            .enumerate()
            .filter_map(|(i, d)| {
                let d = d.as_ref()?;
                if !d.is_attached(node) || !d.touch_count_in_range(event.number_of_touches) {
                    return None;
                }
                if d.requires_directional_pan() {
                    let angle = local_angle?;
                    if !d.check_angle_allowed(angle) {
                        return None;
                    }
                }
                Some(DetectorId(i))
            })
            .collect()
    }

    fn emit_pan(
        &mut self,
        tree: &NodeTree,
        index: BufferIndex,
        emitters: &[DetectorId],
        event: &PanGestureEvent,
        state: GestureState,
    ) {
        let Some(node) = self.pan_node else { return };
        if emitters.is_empty() {
            return;
        }
        let Some(world) = tree.get(node).map(|n| *n.world_matrix.get(index)) else {
            return;
        };
        let (Some(local_current), Some(local_previous)) = (
            screen_to_local(&world, event.current_position),
            screen_to_local(&world, event.previous_position),
        ) else {
            return;
        };

        let screen_previous = if state == GestureState::Started {
            self.possible_pan_position
        } else {
            event.previous_position
        };

        let displacement = event.current_position - screen_previous;
        let local_displacement = local_current - local_previous;

        let mut velocity = Vector2::ZERO;
        let mut local_velocity = Vector2::ZERO;
        if event.time_delta > 0 {
            velocity = displacement / event.time_delta as f32;
            local_velocity = local_displacement / event.time_delta as f32;
        }

        // Lifting a finger without movement reports zero velocity; a fling
        // should keep the speed it had just before release.
        if state == GestureState::Finished
            && velocity == Vector2::ZERO
            && event.time_delta < MAXIMUM_TIME_WITH_VALID_LAST_VELOCITY
        {
            velocity = self.last_screen_velocity;
            local_velocity = self.last_velocity;
        } else {
            self.last_velocity = local_velocity;
            self.last_screen_velocity = velocity;
        }

        let gesture = PanGesture {
            state,
            time: event.time,
            position: event.current_position,
            local_position: local_current,
            displacement,
            local_displacement,
            velocity,
            local_velocity,
            number_of_touches: event.number_of_touches,
        };

        for id in emitters {
            if let Some(detector) = self.pan_detectors[id.0].as_mut() {
                (detector.callback)(node, &gesture);
            }
        }
    }

    fn process_tap(&mut self, tree: &NodeTree, index: BufferIndex, event: &TapGestureEvent) {
        match event.state {
            GestureState::Possible => {
                self.tap_node = hit_test(tree, index, event.position).map(|h| h.node);
            }
            GestureState::Started => {
                let Some(hit) = hit_test(tree, index, event.position) else {
                    self.tap_node = None;
                    return;
                };
                // The tap only confirms on the node that took the touch
                // down; a different node on top now swallows it.
                if self.tap_node != Some(hit.node) {
                    self.tap_node = None;
                    return;
                }
                self.tap_node = None;
                let gesture = TapGesture {
                    time: event.time,
                    position: event.position,
                    local_position: hit.local,
                    number_of_taps: event.number_of_taps,
                };
                for detector in self.tap_detectors.iter_mut().flatten() {
                    if detector.is_attached(hit.node)
                        && detector.taps_in_range(event.number_of_taps)
                    {
                        (detector.callback)(hit.node, &gesture);
                    }
                }
            }
            GestureState::Cancelled => {
                self.tap_node = None;
            }
            GestureState::Clear => {
                panic!("tap recognizer emitted CLEAR, which must never reach the processor");
            }
            _ => {}
        }
    }

    fn process_long_press(
        &mut self,
        tree: &NodeTree,
        index: BufferIndex,
        event: &LongPressGestureEvent,
    ) {
        match event.state {
            GestureState::Possible => {
                self.press_node = hit_test(tree, index, event.position).map(|h| h.node);
                self.press_started = false;
            }
            GestureState::Started => {
                let Some(node) = self.press_node.filter(|n| tree.is_alive(*n)) else {
                    self.press_node = None;
                    return;
                };
                self.press_emitters = self
                    .long_press_detectors
                    .iter()
                    .enumerate()
                    .filter_map(|(i, d)| {
                        let d = d.as_ref()?;
                        (d.is_attached(node)
                            && event.number_of_touches >= d.min_touches
                            && event.number_of_touches <= d.max_touches)
                            .then_some(DetectorId(i))
                    })
                    .collect();
                self.press_started = true;
                let emitters = self.press_emitters.clone();
                self.emit_long_press(tree, index, &emitters, event);
            }
            GestureState::Finished | GestureState::Cancelled => {
                if self.press_started {
                    let emitters = self.press_emitters.clone();
                    self.emit_long_press(tree, index, &emitters, event);
                }
                self.press_node = None;
                self.press_emitters.clear();
                self.press_started = false;
            }
            GestureState::Clear => {
                panic!("long-press recognizer emitted CLEAR, which must never reach the processor");
            }
            _ => {}
        }
    }

    fn emit_long_press(
        &mut self,
        tree: &NodeTree,
        index: BufferIndex,
        emitters: &[DetectorId],
        event: &LongPressGestureEvent,
    ) {
        let Some(node) = self.press_node.filter(|n| tree.is_alive(*n)) else {
            return;
        };
        let local = tree
            .get(node)
            .and_then(|n| screen_to_local(n.world_matrix.get(index), event.position))
            .unwrap_or(event.position);
        let gesture = LongPressGesture {
            state: event.state,
            time: event.time,
            position: event.position,
            local_position: local,
        };
        for id in emitters {
            if let Some(detector) = self.long_press_detectors[id.0].as_mut() {
                (detector.callback)(node, &gesture);
            }
        }
    }

    fn process_pinch(&mut self, tree: &NodeTree, index: BufferIndex, event: &PinchGestureEvent) {
        match event.state {
            GestureState::Started => {
                let Some(hit) = hit_test(tree, index, event.center) else {
                    return;
                };
                self.pinch_node = Some(hit.node);
                self.pinch_emitters = self
                    .pinch_detectors
                    .iter()
                    .enumerate()
                    .filter_map(|(i, d)| {
                        d.as_ref()
                            .filter(|d| d.is_attached(hit.node))
                            .map(|_| DetectorId(i))
                    })
                    .collect();
                self.emit_pinch(tree, index, event);
            }
            GestureState::Continuing => {
                self.emit_pinch(tree, index, event);
            }
            GestureState::Finished | GestureState::Cancelled => {
                self.emit_pinch(tree, index, event);
                self.pinch_node = None;
                self.pinch_emitters.clear();
            }
            GestureState::Clear => {
                panic!("pinch recognizer emitted CLEAR, which must never reach the processor");
            }
            _ => {}
        }
    }

    fn emit_pinch(&mut self, tree: &NodeTree, index: BufferIndex, event: &PinchGestureEvent) {
        let Some(node) = self.pinch_node.filter(|n| tree.is_alive(*n)) else {
            self.pinch_node = None;
            self.pinch_emitters.clear();
            return;
        };
        let local = tree
            .get(node)
            .and_then(|n| screen_to_local(n.world_matrix.get(index), event.center))
            .unwrap_or(event.center);
        let gesture = PinchGesture {
            state: event.state,
            time: event.time,
            center: event.center,
            local_center: local,
            scale: event.scale,
            speed: event.speed,
        };
        for id in self.pinch_emitters.clone() {
            if let Some(detector) = self.pinch_detectors[id.0].as_mut() {
                (detector.callback)(node, &gesture);
            }
        }
    }

    fn process_rotation(
        &mut self,
        tree: &NodeTree,
        index: BufferIndex,
        event: &RotationGestureEvent,
    ) {
        match event.state {
            GestureState::Started => {
                let Some(hit) = hit_test(tree, index, event.center) else {
                    return;
                };
                self.rotation_node = Some(hit.node);
                self.rotation_emitters = self
                    .rotation_detectors
                    .iter()
                    .enumerate()
                    .filter_map(|(i, d)| {
                        d.as_ref()
                            .filter(|d| d.is_attached(hit.node))
                            .map(|_| DetectorId(i))
                    })
                    .collect();
                self.emit_rotation(tree, index, event);
            }
            GestureState::Continuing => {
                self.emit_rotation(tree, index, event);
            }
            GestureState::Finished | GestureState::Cancelled => {
                self.emit_rotation(tree, index, event);
                self.rotation_node = None;
                self.rotation_emitters.clear();
            }
            GestureState::Clear => {
                panic!("rotation recognizer emitted CLEAR, which must never reach the processor");
            }
            _ => {}
        }
    }

    fn emit_rotation(&mut self, tree: &NodeTree, index: BufferIndex, event: &RotationGestureEvent) {
        let Some(node) = self.rotation_node.filter(|n| tree.is_alive(*n)) else {
            self.rotation_node = None;
            self.rotation_emitters.clear();
            return;
        };
        let local = tree
            .get(node)
            .and_then(|n| screen_to_local(n.world_matrix.get(index), event.center))
            .unwrap_or(event.center);
        let gesture = RotationGesture {
            state: event.state,
            time: event.time,
            center: event.center,
            local_center: local,
            rotation: event.rotation,
        };
        for id in self.rotation_emitters.clone() {
            if let Some(detector) = self.rotation_detectors[id.0].as_mut() {
                (detector.callback)(node, &gesture);
            }
        }
    }
}

fn push_detector<T>(slots: &mut Vec<Option<T>>, detector: T) -> DetectorId {
    if let Some(i) = slots.iter().position(|d| d.is_none()) {
        slots[i] = Some(detector);
        DetectorId(i)
    } else {
        slots.push(Some(detector));
        DetectorId(slots.len() - 1)
    }
}

/// Angle of a displacement in radians. `atan` alone cannot distinguish
/// quadrants 2 and 3, so those get a ±π correction.
fn displacement_angle(displacement: Vector2) -> f32 {
    use std::f32::consts::PI;
    let mut angle = (displacement.y / displacement.x).atan();
    if displacement.x < 0.0 {
        if displacement.y >= 0.0 {
            angle += PI;
        } else {
            angle -= PI;
        }
    }
    angle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gestures::events::{PointState, TouchPoint};
    use crate::math::Vector3;
    use std::cell::Cell;
    use std::f32::consts::PI;
    use std::rc::Rc;

    fn touch(time: u32, state: PointState, x: f32, y: f32) -> TouchEvent {
        TouchEvent::with_point(time, TouchPoint::new(1, state, Vector2::new(x, y)))
    }

    fn scene_with_actor(x: f32, y: f32, w: f32, h: f32) -> (NodeTree, NodeId) {
        let mut tree = NodeTree::new();
        let node = tree.create_node();
        {
            let n = tree.get_mut(node).unwrap();
            n.position.set(0, Vector3::new(x, y, 0.0));
            n.size.set(0, Vector3::new(w, h, 0.0));
        }
        tree.update_world_matrices(0);
        (tree, node)
    }

    fn counting_pan_detector(counter: &Rc<Cell<u32>>) -> PanGestureDetector {
        let counter = Rc::clone(counter);
        PanGestureDetector::new(Box::new(move |_, gesture| {
            if gesture.state == GestureState::Started {
                counter.set(counter.get() + 1);
            }
        }))
    }

    #[test]
    fn test_pan_fires_exactly_once_on_simple_drag() {
        let (tree, node) = scene_with_actor(0.0, 0.0, 100.0, 100.0);
        let mut processor = GestureProcessor::new();

        let fired = Rc::new(Cell::new(0u32));
        let mut detector = counting_pan_detector(&fired);
        detector.attach(node);
        processor.add_pan_detector(detector);

        processor.process_touch(&tree, 0, &touch(150, PointState::Down, 20.0, 20.0));
        processor.process_touch(&tree, 0, &touch(151, PointState::Motion, 20.0, 40.0));
        processor.process_touch(&tree, 0, &touch(152, PointState::Motion, 20.0, 60.0));

        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_pan_never_fires_on_interruption() {
        let (tree, node) = scene_with_actor(0.0, 0.0, 100.0, 100.0);
        let mut processor = GestureProcessor::new();

        let fired = Rc::new(Cell::new(0u32));
        let mut detector = counting_pan_detector(&fired);
        detector.attach(node);
        processor.add_pan_detector(detector);

        processor.process_touch(&tree, 0, &touch(150, PointState::Down, 20.0, 20.0));
        processor.process_touch(&tree, 0, &touch(151, PointState::Motion, 20.0, 25.0));
        processor.process_touch(&tree, 0, &touch(152, PointState::Interrupted, 20.0, 30.0));

        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn test_pan_outside_actor_does_not_fire() {
        let (tree, node) = scene_with_actor(0.0, 0.0, 100.0, 100.0);
        let mut processor = GestureProcessor::new();

        let fired = Rc::new(Cell::new(0u32));
        let mut detector = counting_pan_detector(&fired);
        detector.attach(node);
        processor.add_pan_detector(detector);

        processor.process_touch(&tree, 0, &touch(150, PointState::Down, 200.0, 200.0));
        processor.process_touch(&tree, 0, &touch(151, PointState::Motion, 200.0, 220.0));
        processor.process_touch(&tree, 0, &touch(152, PointState::Motion, 200.0, 240.0));

        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn test_vertical_pan_filtered_by_horizontal_direction() {
        let (tree, node) = scene_with_actor(0.0, 0.0, 100.0, 100.0);
        let mut processor = GestureProcessor::new();

        let fired = Rc::new(Cell::new(0u32));
        let mut detector = counting_pan_detector(&fired);
        detector.attach(node);
        detector.add_direction(0.0, PI * 0.25);
        processor.add_pan_detector(detector);

        // Straight down: π/2, outside the horizontal window.
        processor.process_touch(&tree, 0, &touch(150, PointState::Down, 20.0, 20.0));
        processor.process_touch(&tree, 0, &touch(151, PointState::Motion, 20.0, 40.0));
        processor.process_touch(&tree, 0, &touch(152, PointState::Motion, 20.0, 60.0));
        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn test_horizontal_pan_passes_horizontal_direction() {
        let (tree, node) = scene_with_actor(0.0, 0.0, 200.0, 100.0);
        let mut processor = GestureProcessor::new();

        let fired = Rc::new(Cell::new(0u32));
        let mut detector = counting_pan_detector(&fired);
        detector.attach(node);
        detector.add_direction(0.0, PI * 0.25);
        processor.add_pan_detector(detector);

        // Leftwards: π (quadrant-corrected), covered by the direction's
        // opposite angle.
        processor.process_touch(&tree, 0, &touch(150, PointState::Down, 100.0, 20.0));
        processor.process_touch(&tree, 0, &touch(151, PointState::Motion, 80.0, 20.0));
        processor.process_touch(&tree, 0, &touch(152, PointState::Motion, 60.0, 20.0));
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_pan_abandoned_when_node_removed_mid_gesture() {
        let (mut tree, node) = scene_with_actor(0.0, 0.0, 100.0, 100.0);
        let mut processor = GestureProcessor::new();

        let events: Rc<std::cell::RefCell<Vec<GestureState>>> = Rc::default();
        let log = Rc::clone(&events);
        let mut detector = PanGestureDetector::new(Box::new(move |_, g| {
            log.borrow_mut().push(g.state);
        }));
        detector.attach(node);
        processor.add_pan_detector(detector);

        processor.process_touch(&tree, 0, &touch(150, PointState::Down, 20.0, 20.0));
        processor.process_touch(&tree, 0, &touch(151, PointState::Motion, 20.0, 40.0));
        processor.process_touch(&tree, 0, &touch(152, PointState::Motion, 20.0, 60.0));
        assert_eq!(events.borrow().as_slice(), &[GestureState::Started]);

        tree.schedule_removal(node);
        tree.flush_removals();
        processor.node_removed(node);

        processor.process_touch(&tree, 0, &touch(153, PointState::Motion, 20.0, 80.0));
        processor.process_touch(&tree, 0, &touch(154, PointState::Up, 20.0, 90.0));
        assert_eq!(
            events.borrow().as_slice(),
            &[GestureState::Started],
            "no further events after abandonment"
        );
    }

    #[test]
    fn test_tap_routed_to_attached_detector() {
        let (tree, node) = scene_with_actor(0.0, 0.0, 100.0, 100.0);
        let mut processor = GestureProcessor::new();

        let fired = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&fired);
        let mut detector = TapGestureDetector::new(Box::new(move |_, _| {
            counter.set(counter.get() + 1);
        }));
        detector.attach(node);
        processor.add_tap_detector(detector);

        processor.process_touch(&tree, 0, &touch(150, PointState::Down, 50.0, 50.0));
        processor.process_touch(&tree, 0, &touch(200, PointState::Up, 50.0, 50.0));
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_tap_dropped_when_target_changes_before_release() {
        // Two stacked nodes; the top one takes the touch down, then hides
        // before the release so the bottom one is hit on confirmation.
        let mut tree = NodeTree::new();
        let bottom = tree.create_node();
        let top = tree.create_node();
        for id in [bottom, top] {
            tree.get_mut(id).unwrap().size.set(0, Vector3::new(100.0, 100.0, 0.0));
        }
        tree.update_world_matrices(0);

        let mut processor = GestureProcessor::new();
        let fired = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&fired);
        let mut detector = TapGestureDetector::new(Box::new(move |_, _| {
            counter.set(counter.get() + 1);
        }));
        detector.attach(bottom);
        detector.attach(top);
        processor.add_tap_detector(detector);

        processor.process_touch(&tree, 0, &touch(150, PointState::Down, 50.0, 50.0));
        tree.get_mut(top).unwrap().visible.set(0, false);
        processor.process_touch(&tree, 0, &touch(200, PointState::Up, 50.0, 50.0));

        assert_eq!(fired.get(), 0, "the node that took the down is gone");

        // A fresh tap on the now-exposed bottom node still works.
        processor.process_touch(&tree, 0, &touch(300, PointState::Down, 50.0, 50.0));
        processor.process_touch(&tree, 0, &touch(350, PointState::Up, 50.0, 50.0));
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_long_press_via_poll() {
        let (tree, node) = scene_with_actor(0.0, 0.0, 100.0, 100.0);
        let mut processor = GestureProcessor::new();

        let fired = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&fired);
        let mut detector = LongPressGestureDetector::new(Box::new(move |_, g| {
            if g.state == GestureState::Started {
                counter.set(counter.get() + 1);
            }
        }));
        detector.attach(node);
        processor.add_long_press_detector(detector);

        processor.process_touch(&tree, 0, &touch(100, PointState::Down, 50.0, 50.0));
        processor.poll(&tree, 0, 300);
        assert_eq!(fired.get(), 0);
        processor.poll(&tree, 0, 650);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_pan_local_coordinates_account_for_node_position() {
        let (tree, node) = scene_with_actor(10.0, 10.0, 100.0, 100.0);
        let mut processor = GestureProcessor::new();

        let local = Rc::new(Cell::new(Vector2::ZERO));
        let captured = Rc::clone(&local);
        let mut detector = PanGestureDetector::new(Box::new(move |_, g| {
            if g.state == GestureState::Started {
                captured.set(g.local_position);
            }
        }));
        detector.attach(node);
        processor.add_pan_detector(detector);

        processor.process_touch(&tree, 0, &touch(150, PointState::Down, 30.0, 30.0));
        processor.process_touch(&tree, 0, &touch(151, PointState::Motion, 30.0, 50.0));
        processor.process_touch(&tree, 0, &touch(152, PointState::Motion, 30.0, 70.0));

        assert_eq!(local.get(), Vector2::new(20.0, 60.0));
    }
}
