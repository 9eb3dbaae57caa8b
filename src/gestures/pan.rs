//! Pan gesture recognition.
//!
//! A pan starts once enough motion events have accumulated and the primary
//! point has travelled the minimum distance from its down position. Fast
//! pans apply the distance threshold phased over the first few events so
//! the content does not jump by the threshold amount on start.

use log::trace;

use crate::gestures::events::{GestureState, PanGestureEvent, PointState, TouchEvent};
use crate::math::Vector2;

const MINIMUM_MOTION_DISTANCE_BEFORE_PAN: f32 = 15.0;
const MINIMUM_MOTION_DISTANCE_BEFORE_PAN_SQUARED: f32 =
    MINIMUM_MOTION_DISTANCE_BEFORE_PAN * MINIMUM_MOTION_DISTANCE_BEFORE_PAN;
const MINIMUM_MOTION_DISTANCE_TO_THRESHOLD_ADJUSTMENTS_RATIO: f32 = 2.0 / 3.0;
const MINIMUM_TIME_BEFORE_THRESHOLD_ADJUSTMENTS: u32 = 100;
const MINIMUM_MOTION_EVENTS_BEFORE_PAN: u32 = 2;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
    Clear,
    Possible,
    Started,
    Finished,
    Failed,
}

/// Touch-count requirements for pan recognition, updated when detectors
/// attach or reconfigure.
#[derive(Clone, Copy, Debug)]
pub struct PanGestureRequest {
    pub min_touches: usize,
    pub max_touches: usize,
    /// Motion samples older than this (ms) are discarded from the history
    /// feeding displacement and velocity.
    pub maximum_motion_event_age: u32,
}

impl Default for PanGestureRequest {
    fn default() -> Self {
        Self {
            min_touches: 1,
            max_touches: 1,
            maximum_motion_event_age: u32::MAX,
        }
    }
}

/// State machine turning raw touch streams into pan phases.
pub struct PanGestureRecognizer {
    state: State,
    touch_history: Vec<TouchEvent>,
    primary_down_location: Vector2,
    primary_down_time: u32,
    previous_position: Vector2,

    min_touches: usize,
    max_touches: usize,
    maximum_motion_event_age: u32,
    minimum_distance_squared: f32,
    minimum_motion_events: u32,
    motion_events: u32,

    threshold_total_adjustments: u32,
    threshold_adjustments_remaining: u32,
    threshold_adjustment_per_frame: Vector2,

    emitted: Vec<PanGestureEvent>,
}

impl Default for PanGestureRecognizer {
    fn default() -> Self {
        Self::new(PanGestureRequest::default(), None, None)
    }
}

impl PanGestureRecognizer {
    /// `minimum_distance` and `minimum_pan_events` override the built-in
    /// thresholds when given.
    pub fn new(
        request: PanGestureRequest,
        minimum_distance: Option<f32>,
        minimum_pan_events: Option<u32>,
    ) -> Self {
        let mut minimum_distance_squared = MINIMUM_MOTION_DISTANCE_BEFORE_PAN_SQUARED;
        let mut threshold_total_adjustments = (MINIMUM_MOTION_DISTANCE_BEFORE_PAN
            * MINIMUM_MOTION_DISTANCE_TO_THRESHOLD_ADJUSTMENTS_RATIO)
            as u32;
        if let Some(distance) = minimum_distance {
            if distance >= 0.0 {
                minimum_distance_squared = distance * distance;
                threshold_total_adjustments =
                    (distance * MINIMUM_MOTION_DISTANCE_TO_THRESHOLD_ADJUSTMENTS_RATIO) as u32;
            }
        }

        let mut minimum_motion_events = MINIMUM_MOTION_EVENTS_BEFORE_PAN;
        if let Some(events) = minimum_pan_events {
            if events >= 1 {
                // The down event is the first event.
                minimum_motion_events = events - 1;
            }
        }

        Self {
            state: State::Clear,
            touch_history: Vec::new(),
            primary_down_location: Vector2::ZERO,
            primary_down_time: 0,
            previous_position: Vector2::ZERO,
            min_touches: request.min_touches,
            max_touches: request.max_touches,
            maximum_motion_event_age: request.maximum_motion_event_age,
            minimum_distance_squared,
            minimum_motion_events,
            motion_events: 0,
            threshold_total_adjustments,
            threshold_adjustments_remaining: 0,
            threshold_adjustment_per_frame: Vector2::ZERO,
            emitted: Vec::new(),
        }
    }

    /// Reconfigure the touch-count window and the motion-age limit.
    pub fn update(&mut self, request: PanGestureRequest) {
        self.min_touches = request.min_touches;
        self.max_touches = request.max_touches;
        self.maximum_motion_event_age = request.maximum_motion_event_age;
    }

    /// Feed one touch event; returns the pan phases it produced, in order.
    pub fn send_event(&mut self, event: &TouchEvent) -> Vec<PanGestureEvent> {
        if event.points.is_empty() {
            return Vec::new();
        }
        let primary_state = event.primary().state;

        if primary_state == PointState::Interrupted {
            if self.state == State::Started || self.state == State::Possible {
                self.touch_history.push(event.clone());
                self.send_pan(GestureState::Cancelled, event);
            }
            self.state = State::Clear;
            self.touch_history.clear();
            return std::mem::take(&mut self.emitted);
        }

        // Stale samples must not become the previous-event reference for
        // displacement or velocity; this also bounds the history of a
        // long-running pan.
        self.touch_history
            .retain(|e| event.time.saturating_sub(e.time) <= self.maximum_motion_event_age);

        match self.state {
            State::Clear => {
                if matches!(
                    primary_state,
                    PointState::Down | PointState::Stationary | PointState::Motion
                ) {
                    self.primary_down_location = event.primary().screen;
                    self.primary_down_time = event.time;
                    self.motion_events = 0;
                    if event.point_count() == self.min_touches {
                        self.state = State::Possible;
                        self.send_pan(GestureState::Possible, event);
                    }
                    self.touch_history.push(event.clone());
                }
            }

            State::Possible => {
                let point_count = event.point_count();
                if point_count >= self.min_touches && point_count <= self.max_touches {
                    match primary_state {
                        PointState::Motion => {
                            self.touch_history.push(event.clone());
                            self.motion_events += 1;

                            let delta = event.primary().screen - self.primary_down_location;
                            if self.motion_events >= self.minimum_motion_events
                                && delta.length_squared() >= self.minimum_distance_squared
                            {
                                self.state = State::Started;
                                self.send_pan(GestureState::Started, event);
                            }
                        }
                        PointState::Up => {
                            let delta = event.primary().screen - self.primary_down_location;
                            if delta.length_squared() >= self.minimum_distance_squared {
                                // A flick: down and straight up past the
                                // threshold counts as a complete pan.
                                self.send_pan(GestureState::Started, event);
                                self.touch_history.push(event.clone());
                                self.send_pan(GestureState::Finished, event);
                            } else {
                                self.send_pan(GestureState::Cancelled, event);
                            }
                            self.state = State::Clear;
                            self.touch_history.clear();
                        }
                        _ => {}
                    }
                } else {
                    // Touch count fell outside the window before starting.
                    self.send_pan(GestureState::Cancelled, event);
                    if point_count == 1 && primary_state == PointState::Up {
                        self.state = State::Clear;
                        self.touch_history.clear();
                    } else {
                        self.state = State::Failed;
                    }
                }
            }

            State::Started => {
                self.touch_history.push(event.clone());

                let point_count = event.point_count();
                if point_count >= self.min_touches && point_count <= self.max_touches {
                    match primary_state {
                        PointState::Motion => {
                            self.send_pan(GestureState::Continuing, event);
                        }
                        PointState::Up => {
                            self.state = State::Clear;
                            self.send_pan(GestureState::Finished, event);
                            self.touch_history.clear();
                        }
                        PointState::Stationary => {
                            if point_count == self.min_touches
                                && event.points[1..]
                                    .iter()
                                    .any(|p| p.state == PointState::Up)
                            {
                                // A secondary point lifting drops us below
                                // the minimum.
                                self.send_pan(GestureState::Finished, event);
                                self.state = State::Finished;
                            }
                        }
                        _ => {}
                    }
                } else {
                    self.send_pan(GestureState::Finished, event);
                    if point_count == 1 && primary_state == PointState::Up {
                        self.state = State::Clear;
                        self.touch_history.clear();
                    } else {
                        self.state = State::Finished;
                    }
                }
            }

            State::Finished | State::Failed => {
                if primary_state == PointState::Up {
                    self.state = State::Clear;
                    self.touch_history.clear();
                }
            }
        }

        std::mem::take(&mut self.emitted)
    }

    fn send_pan(&mut self, state: GestureState, current: &TouchEvent) {
        let mut current_position = current.primary().screen;
        let mut previous_position = current_position;
        let mut time_delta = 0;

        if self.touch_history.len() > 1 {
            // The last history entry is the current event.
            let previous_event = &self.touch_history[self.touch_history.len() - 2];
            previous_position = self.previous_position;
            let mut previous_time = previous_event.time;

            if state == GestureState::Started {
                // Measure from the down point so the threshold distance is
                // not reported as instantaneous movement.
                previous_position = self.primary_down_location;
                previous_time = self.primary_down_time;

                if current.time - previous_time > MINIMUM_TIME_BEFORE_THRESHOLD_ADJUSTMENTS {
                    // Slow pan: phase the threshold out over the next few
                    // events instead of jumping.
                    self.threshold_adjustments_remaining = self.threshold_total_adjustments;
                    self.threshold_adjustment_per_frame = (current_position - previous_position)
                        / self.threshold_total_adjustments as f32;
                } else {
                    self.threshold_adjustments_remaining = 0;
                    self.threshold_adjustment_per_frame = Vector2::ZERO;
                }
            }

            time_delta = current.time - previous_time;

            if self.threshold_adjustments_remaining > 0 {
                self.threshold_adjustments_remaining -= 1;
                current_position -= self.threshold_adjustment_per_frame
                    * self.threshold_adjustments_remaining as f32;
            }

            self.previous_position = current_position;
        }

        trace!("pan {:?} at {:?}", state, current_position);
        self.emitted.push(PanGestureEvent {
            state,
            time: current.time,
            current_position,
            previous_position,
            time_delta,
            number_of_touches: current.point_count(),
        });
    }
}
