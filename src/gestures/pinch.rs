//! Pinch gesture recognition.
//!
//! A pinch is two touch points moving towards or away from each other. The
//! gesture starts once the distance between the points has changed by the
//! minimum delta from where they landed; scale is reported relative to the
//! starting distance.

use crate::gestures::events::{GestureState, PinchGestureEvent, PointState, TouchEvent};
use crate::math::Vector2;

/// Distance-between-fingers change (pixels) required to start a pinch.
const MINIMUM_DISTANCE_DELTA: f32 = 15.0;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
    Clear,
    Possible,
    Started,
    Failed,
}

/// State machine turning two-point touch streams into pinch events.
pub struct PinchGestureRecognizer {
    state: State,
    starting_distance: f32,
    previous_distance: f32,
    previous_time: u32,
    emitted: Vec<PinchGestureEvent>,
}

impl Default for PinchGestureRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PinchGestureRecognizer {
    pub fn new() -> Self {
        Self {
            state: State::Clear,
            starting_distance: 0.0,
            previous_distance: 0.0,
            previous_time: 0,
            emitted: Vec::new(),
        }
    }

    pub fn send_event(&mut self, event: &TouchEvent) -> Vec<PinchGestureEvent> {
        if event.points.is_empty() {
            return Vec::new();
        }

        if event.primary().state == PointState::Interrupted {
            if self.state == State::Started {
                self.emit(GestureState::Cancelled, event);
            }
            self.state = State::Clear;
            return std::mem::take(&mut self.emitted);
        }

        let two_points = event.point_count() == 2;
        match self.state {
            State::Clear => {
                if two_points {
                    self.starting_distance = finger_distance(event);
                    self.previous_distance = self.starting_distance;
                    self.previous_time = event.time;
                    self.state = State::Possible;
                }
            }

            State::Possible => {
                if !two_points {
                    self.state = State::Clear;
                } else if event.primary().state == PointState::Motion
                    || event.points[1].state == PointState::Motion
                {
                    let distance = finger_distance(event);
                    if (distance - self.starting_distance).abs() >= MINIMUM_DISTANCE_DELTA {
                        // Rebase so scale starts at 1.0 when the gesture
                        // actually begins.
                        self.starting_distance = distance;
                        self.previous_distance = distance;
                        self.previous_time = event.time;
                        self.state = State::Started;
                        self.emit(GestureState::Started, event);
                    }
                }
            }

            State::Started => {
                if !two_points {
                    // A finger lifted; the pinch is complete.
                    self.emit(GestureState::Finished, event);
                    self.state = if event.point_count() == 1
                        && event.primary().state == PointState::Up
                    {
                        State::Clear
                    } else {
                        State::Failed
                    };
                } else {
                    self.emit(GestureState::Continuing, event);
                }
            }

            State::Failed => {
                if event.point_count() == 1 && event.primary().state == PointState::Up {
                    self.state = State::Clear;
                }
            }
        }

        std::mem::take(&mut self.emitted)
    }

    fn emit(&mut self, state: GestureState, event: &TouchEvent) {
        let distance = if event.point_count() >= 2 {
            finger_distance(event)
        } else {
            self.previous_distance
        };
        let scale = if self.starting_distance > 0.0 {
            distance / self.starting_distance
        } else {
            1.0
        };
        let dt = event.time.saturating_sub(self.previous_time).max(1);
        let speed = ((distance - self.previous_distance) / self.starting_distance.max(1.0)).abs()
            / dt as f32;

        self.previous_distance = distance;
        self.previous_time = event.time;

        self.emitted.push(PinchGestureEvent {
            state,
            time: event.time,
            center: finger_center(event),
            scale,
            speed,
        });
    }
}

fn finger_distance(event: &TouchEvent) -> f32 {
    (event.points[0].screen - event.points[1].screen).length()
}

fn finger_center(event: &TouchEvent) -> Vector2 {
    if event.point_count() >= 2 {
        (event.points[0].screen + event.points[1].screen) / 2.0
    } else {
        event.points[0].screen
    }
}
