//! Multi-touch gesture recognition and routing.
//!
//! Raw touch events flow into per-family recognizer state machines (pan,
//! tap, long-press, pinch, rotation); the [`GestureProcessor`] hit-tests
//! the scene and routes recognized gestures to the detectors attached to
//! the hit node.

pub mod detector;
pub mod events;
pub mod hit_test;
pub mod long_press;
pub mod pan;
pub mod pinch;
pub mod processor;
pub mod rotation;
pub mod tap;

pub use detector::{
    DetectorId, LongPressGestureDetector, PanGestureDetector, PinchGestureDetector,
    RotationGestureDetector, TapGestureDetector, DEFAULT_DIRECTION_THRESHOLD,
};
pub use events::{
    GestureState, LongPressGesture, PanGesture, PinchGesture, PointState, RotationGesture,
    TapGesture, TouchEvent, TouchPoint,
};
pub use hit_test::{hit_test, HitResult};
pub use processor::GestureProcessor;
