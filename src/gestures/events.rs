//! Touch input and gesture event value types.

use crate::math::Vector2;

/// State of a single touch point within a touch event.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PointState {
    Down,
    Up,
    Motion,
    Stationary,
    /// Input was interrupted (e.g. focus loss); any gesture in progress
    /// must cancel.
    Interrupted,
}

/// One finger's contribution to a touch event.
#[derive(Clone, Copy, Debug)]
pub struct TouchPoint {
    pub device_id: i32,
    pub state: PointState,
    pub screen: Vector2,
}

impl TouchPoint {
    pub fn new(device_id: i32, state: PointState, screen: Vector2) -> Self {
        Self {
            device_id,
            state,
            screen,
        }
    }
}

/// A snapshot of all active touch points at one instant.
#[derive(Clone, Debug, Default)]
pub struct TouchEvent {
    /// Milliseconds, monotonic.
    pub time: u32,
    pub points: Vec<TouchPoint>,
}

impl TouchEvent {
    pub fn new(time: u32) -> Self {
        Self {
            time,
            points: Vec::new(),
        }
    }

    pub fn with_point(time: u32, point: TouchPoint) -> Self {
        Self {
            time,
            points: vec![point],
        }
    }

    pub fn add_point(&mut self, point: TouchPoint) -> &mut Self {
        self.points.push(point);
        self
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// The primary (first) point. Recognizers key their state machines off
    /// this point; events without points never reach them.
    pub fn primary(&self) -> &TouchPoint {
        &self.points[0]
    }
}

/// Lifecycle phase of a recognized gesture.
///
/// `Clear` is the recognizers' internal resting sentinel; it must never be
/// emitted to a processor.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GestureState {
    Clear,
    Possible,
    Started,
    Continuing,
    Finished,
    Cancelled,
}

/// A pan phase emitted by the recognizer, in screen space. The processor
/// derives local-space values before it reaches detectors.
#[derive(Clone, Copy, Debug)]
pub struct PanGestureEvent {
    pub state: GestureState,
    pub time: u32,
    pub current_position: Vector2,
    pub previous_position: Vector2,
    /// Milliseconds between the previous and current sample.
    pub time_delta: u32,
    pub number_of_touches: usize,
}

/// The pan payload delivered to detector callbacks, with screen and
/// actor-local coordinates.
#[derive(Clone, Copy, Debug)]
pub struct PanGesture {
    pub state: GestureState,
    pub time: u32,
    pub position: Vector2,
    pub local_position: Vector2,
    pub displacement: Vector2,
    pub local_displacement: Vector2,
    /// Pixels per millisecond.
    pub velocity: Vector2,
    pub local_velocity: Vector2,
    pub number_of_touches: usize,
}

/// A recognized tap.
#[derive(Clone, Copy, Debug)]
pub struct TapGestureEvent {
    pub state: GestureState,
    pub time: u32,
    pub position: Vector2,
    pub number_of_taps: u32,
    pub number_of_touches: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct TapGesture {
    pub time: u32,
    pub position: Vector2,
    pub local_position: Vector2,
    pub number_of_taps: u32,
}

/// A long-press phase.
#[derive(Clone, Copy, Debug)]
pub struct LongPressGestureEvent {
    pub state: GestureState,
    pub time: u32,
    pub position: Vector2,
    pub number_of_touches: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct LongPressGesture {
    pub state: GestureState,
    pub time: u32,
    pub position: Vector2,
    pub local_position: Vector2,
}

/// A pinch phase. Scale is relative to the distance between the two touch
/// points when the pinch started.
#[derive(Clone, Copy, Debug)]
pub struct PinchGestureEvent {
    pub state: GestureState,
    pub time: u32,
    pub center: Vector2,
    pub scale: f32,
    /// Rate of scale change, per millisecond.
    pub speed: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct PinchGesture {
    pub state: GestureState,
    pub time: u32,
    pub center: Vector2,
    pub local_center: Vector2,
    pub scale: f32,
    pub speed: f32,
}

/// A two-finger rotation phase. The angle is the signed change since the
/// gesture started, in radians.
#[derive(Clone, Copy, Debug)]
pub struct RotationGestureEvent {
    pub state: GestureState,
    pub time: u32,
    pub center: Vector2,
    pub rotation: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct RotationGesture {
    pub state: GestureState,
    pub time: u32,
    pub center: Vector2,
    pub local_center: Vector2,
    pub rotation: f32,
}
