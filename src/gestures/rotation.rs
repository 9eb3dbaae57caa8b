//! Two-finger rotation gesture recognition.

use std::f32::consts::PI;

use crate::gestures::events::{GestureState, PointState, RotationGestureEvent, TouchEvent};
use crate::math::{wrap_in_domain, Vector2};

/// Radians the finger axis must turn before a rotation starts.
const MINIMUM_ROTATION_ANGLE: f32 = 0.25;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
    Clear,
    Possible,
    Started,
    Failed,
}

/// State machine turning two-point touch streams into rotation events.
pub struct RotationGestureRecognizer {
    state: State,
    starting_angle: f32,
    emitted: Vec<RotationGestureEvent>,
}

impl Default for RotationGestureRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl RotationGestureRecognizer {
    pub fn new() -> Self {
        Self {
            state: State::Clear,
            starting_angle: 0.0,
            emitted: Vec::new(),
        }
    }

    pub fn send_event(&mut self, event: &TouchEvent) -> Vec<RotationGestureEvent> {
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
                    self.starting_angle = finger_angle(event);
                    self.state = State::Possible;
                }
            }

            State::Possible => {
                if !two_points {
                    self.state = State::Clear;
                } else {
                    let turned = angle_delta(self.starting_angle, finger_angle(event));
                    if turned.abs() >= MINIMUM_ROTATION_ANGLE {
                        // Rebase so the reported rotation starts near zero.
                        self.starting_angle = finger_angle(event);
                        self.state = State::Started;
                        self.emit(GestureState::Started, event);
                    }
                }
            }

            State::Started => {
                if !two_points {
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
        let rotation = if event.point_count() >= 2 {
            angle_delta(self.starting_angle, finger_angle(event))
        } else {
            0.0
        };
        self.emitted.push(RotationGestureEvent {
            state,
            time: event.time,
            center: finger_center(event),
            rotation,
        });
    }
}

/// Signed shortest rotation from one angle to another, in (-pi, pi].
fn angle_delta(from: f32, to: f32) -> f32 {
    wrap_in_domain(to - from, -PI, PI)
}

fn finger_angle(event: &TouchEvent) -> f32 {
    let delta = event.points[1].screen - event.points[0].screen;
    delta.y.atan2(delta.x)
}

fn finger_center(event: &TouchEvent) -> Vector2 {
    if event.point_count() >= 2 {
        (event.points[0].screen + event.points[1].screen) / 2.0
    } else {
        event.points[0].screen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gestures::events::TouchPoint;

    fn two_fingers(time: u32, state: PointState, p0: (f32, f32), p1: (f32, f32)) -> TouchEvent {
        let mut event = TouchEvent::new(time);
        event.add_point(TouchPoint::new(1, state, Vector2::new(p0.0, p0.1)));
        event.add_point(TouchPoint::new(2, state, Vector2::new(p1.0, p1.1)));
        event
    }

    #[test]
    fn test_rotation_starts_after_minimum_angle() {
        let mut r = RotationGestureRecognizer::new();
        // Horizontal axis.
        r.send_event(&two_fingers(100, PointState::Down, (40.0, 50.0), (60.0, 50.0)));

        // Tiny turn: below 0.25 rad.
        let e = r.send_event(&two_fingers(110, PointState::Motion, (40.0, 49.0), (60.0, 51.0)));
        assert!(e.is_empty());

        // Quarter turn.
        let e = r.send_event(&two_fingers(120, PointState::Motion, (50.0, 40.0), (50.0, 60.0)));
        assert_eq!(e[0].state, GestureState::Started);

        let e = r.send_event(&two_fingers(130, PointState::Motion, (60.0, 40.0), (40.0, 60.0)));
        assert_eq!(e[0].state, GestureState::Continuing);
        assert!(e[0].rotation.abs() > 0.0);
    }

    #[test]
    fn test_finger_lift_finishes() {
        let mut r = RotationGestureRecognizer::new();
        r.send_event(&two_fingers(100, PointState::Down, (40.0, 50.0), (60.0, 50.0)));
        r.send_event(&two_fingers(120, PointState::Motion, (50.0, 40.0), (50.0, 60.0)));

        let mut up = TouchEvent::new(130);
        up.add_point(TouchPoint::new(1, PointState::Up, Vector2::new(50.0, 40.0)));
        let e = r.send_event(&up);
        assert_eq!(e[0].state, GestureState::Finished);
    }
}
