//! Tap gesture recognition.
//!
//! A tap is a down/up pair that stays within a movement tolerance and a
//! maximum duration. Consecutive taps accumulate towards multi-tap
//! detectors; breaking any threshold resets the accumulated count to zero
//! instead of failing, so a slow double-tap degrades to two single taps.

use log::trace;

use crate::gestures::events::{GestureState, PointState, TapGestureEvent, TouchEvent};
use crate::math::Vector2;

/// Maximum milliseconds for one down/up pair and for the gap between taps.
const MAXIMUM_TIME_ALLOWED: u32 = 500;
/// Maximum finger travel (pixels) during a single tap.
const MAXIMUM_MOTION_ALLOWED: f32 = 20.0;
const MAXIMUM_MOTION_ALLOWED_SQUARED: f32 = MAXIMUM_MOTION_ALLOWED * MAXIMUM_MOTION_ALLOWED;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
    Clear,
    /// Finger is down, waiting for the up.
    Touched,
    /// One or more taps registered, waiting for a possible next tap.
    Registered,
    Failed,
}

/// Number of consecutive taps a detector asks for.
#[derive(Clone, Copy, Debug)]
pub struct TapGestureRequest {
    pub min_taps: u32,
    pub max_taps: u32,
}

impl Default for TapGestureRequest {
    fn default() -> Self {
        Self {
            min_taps: 1,
            max_taps: 1,
        }
    }
}

/// State machine turning raw touch streams into tap events.
pub struct TapGestureRecognizer {
    state: State,
    min_taps: u32,
    max_taps: u32,
    taps: u32,
    touch_position: Vector2,
    touch_time: u32,
    last_tap_time: u32,
    emitted: Vec<TapGestureEvent>,
}

impl Default for TapGestureRecognizer {
    fn default() -> Self {
        Self::new(TapGestureRequest::default())
    }
}

impl TapGestureRecognizer {
    pub fn new(request: TapGestureRequest) -> Self {
        Self {
            state: State::Clear,
            min_taps: request.min_taps,
            max_taps: request.max_taps,
            taps: 0,
            touch_position: Vector2::ZERO,
            touch_time: 0,
            last_tap_time: 0,
            emitted: Vec::new(),
        }
    }

    pub fn update(&mut self, request: TapGestureRequest) {
        self.min_taps = request.min_taps;
        self.max_taps = request.max_taps;
    }

    /// Feed one touch event; returns the tap phases it produced.
    pub fn send_event(&mut self, event: &TouchEvent) -> Vec<TapGestureEvent> {
        if event.points.is_empty() {
            return Vec::new();
        }
        let primary = event.primary();

        if primary.state == PointState::Interrupted {
            if self.state != State::Clear {
                self.emit(GestureState::Cancelled, event);
            }
            self.reset();
            return std::mem::take(&mut self.emitted);
        }

        if event.point_count() != 1 {
            // Taps are single-touch; extra fingers void the attempt.
            if self.state == State::Touched || self.state == State::Registered {
                self.emit(GestureState::Cancelled, event);
            }
            self.reset();
            self.state = State::Failed;
            return std::mem::take(&mut self.emitted);
        }

        match self.state {
            State::Clear => {
                if primary.state == PointState::Down {
                    self.begin_touch(event);
                    self.emit(GestureState::Possible, event);
                }
            }

            State::Touched => match primary.state {
                PointState::Up => {
                    let duration = event.time - self.touch_time;
                    let travel =
                        (primary.screen - self.touch_position).length_squared();
                    if duration <= MAXIMUM_TIME_ALLOWED
                        && travel <= MAXIMUM_MOTION_ALLOWED_SQUARED
                    {
                        self.taps += 1;
                        self.last_tap_time = event.time;
                        trace!("tap {} registered", self.taps);
                        if self.taps >= self.min_taps {
                            self.emit(GestureState::Started, event);
                        }
                        if self.taps >= self.max_taps {
                            self.reset();
                        } else {
                            self.state = State::Registered;
                        }
                    } else {
                        // Too slow or moved too far: not a tap, start over.
                        self.emit(GestureState::Cancelled, event);
                        self.reset();
                    }
                }
                PointState::Motion => {
                    let travel =
                        (primary.screen - self.touch_position).length_squared();
                    if travel > MAXIMUM_MOTION_ALLOWED_SQUARED {
                        self.emit(GestureState::Cancelled, event);
                        self.reset();
                        self.state = State::Failed;
                    }
                }
                _ => {}
            },

            State::Registered => {
                if primary.state == PointState::Down {
                    if event.time - self.last_tap_time <= MAXIMUM_TIME_ALLOWED {
                        // Next tap of a multi-tap within the gap window;
                        // the accumulated count carries over. Each down is
                        // a fresh possible so routing re-confirms the node.
                        self.touch_position = primary.screen;
                        self.touch_time = event.time;
                        self.state = State::Touched;
                        self.emit(GestureState::Possible, event);
                    } else {
                        // Gap too long: this down starts a fresh sequence.
                        self.reset();
                        self.begin_touch(event);
                        self.emit(GestureState::Possible, event);
                    }
                }
            }

            State::Failed => {
                if primary.state == PointState::Up {
                    self.reset();
                }
            }
        }

        std::mem::take(&mut self.emitted)
    }

    fn begin_touch(&mut self, event: &TouchEvent) {
        self.touch_position = event.primary().screen;
        self.touch_time = event.time;
        self.taps = 0;
        self.state = State::Touched;
    }

    fn reset(&mut self) {
        self.state = State::Clear;
        self.taps = 0;
    }

    fn emit(&mut self, state: GestureState, event: &TouchEvent) {
        self.emitted.push(TapGestureEvent {
            state,
            time: event.time,
            position: event.primary().screen,
            number_of_taps: self.taps,
            number_of_touches: event.point_count(),
        });
    }
}
