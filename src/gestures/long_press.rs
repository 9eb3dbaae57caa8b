//! Long-press gesture recognition.
//!
//! A long press starts when a touch stays down, within a movement
//! tolerance, for the minimum holding time. There is no OS timer here; the
//! frame loop calls [`LongPressGestureRecognizer::poll`] with the current
//! time each tick, which fires the pending press once the hold elapses.

use crate::gestures::events::{GestureState, LongPressGestureEvent, PointState, TouchEvent};
use crate::math::Vector2;

const DEFAULT_MINIMUM_HOLDING_TIME: u32 = 500;
const MAXIMUM_MOTION_ALLOWED: f32 = 20.0;
const MAXIMUM_MOTION_ALLOWED_SQUARED: f32 = MAXIMUM_MOTION_ALLOWED * MAXIMUM_MOTION_ALLOWED;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
    Clear,
    /// Touch is down, hold time not yet elapsed.
    Touched,
    /// Hold time elapsed, press emitted, waiting for release.
    Started,
    Failed,
}

/// Touch-count requirements for long-press recognition.
#[derive(Clone, Copy, Debug)]
pub struct LongPressGestureRequest {
    pub min_touches: usize,
    pub max_touches: usize,
    pub minimum_holding_time: u32,
}

impl Default for LongPressGestureRequest {
    fn default() -> Self {
        Self {
            min_touches: 1,
            max_touches: 1,
            minimum_holding_time: DEFAULT_MINIMUM_HOLDING_TIME,
        }
    }
}

/// State machine turning raw touch streams plus frame-loop polling into
/// long-press events.
pub struct LongPressGestureRecognizer {
    state: State,
    request: LongPressGestureRequest,
    touch_position: Vector2,
    touch_time: u32,
    touch_count: usize,
    emitted: Vec<LongPressGestureEvent>,
}

impl Default for LongPressGestureRecognizer {
    fn default() -> Self {
        Self::new(LongPressGestureRequest::default())
    }
}

impl LongPressGestureRecognizer {
    pub fn new(request: LongPressGestureRequest) -> Self {
        Self {
            state: State::Clear,
            request,
            touch_position: Vector2::ZERO,
            touch_time: 0,
            touch_count: 0,
            emitted: Vec::new(),
        }
    }

    pub fn update(&mut self, request: LongPressGestureRequest) {
        self.request = request;
    }

    /// Feed one touch event; returns the phases it produced.
    pub fn send_event(&mut self, event: &TouchEvent) -> Vec<LongPressGestureEvent> {
        if event.points.is_empty() {
            return Vec::new();
        }
        let primary = event.primary();

        if primary.state == PointState::Interrupted {
            if self.state == State::Touched || self.state == State::Started {
                self.emit(GestureState::Cancelled, event.time, primary.screen);
            }
            self.state = State::Clear;
            return std::mem::take(&mut self.emitted);
        }

        let point_count = event.point_count();
        match self.state {
            State::Clear => {
                if primary.state == PointState::Down
                    && point_count >= self.request.min_touches
                    && point_count <= self.request.max_touches
                {
                    self.touch_position = primary.screen;
                    self.touch_time = event.time;
                    self.touch_count = point_count;
                    self.state = State::Touched;
                    self.emit(GestureState::Possible, event.time, primary.screen);
                }
            }

            State::Touched => match primary.state {
                PointState::Motion => {
                    let travel = (primary.screen - self.touch_position).length_squared();
                    if travel > MAXIMUM_MOTION_ALLOWED_SQUARED {
                        self.emit(GestureState::Cancelled, event.time, primary.screen);
                        self.state = State::Failed;
                    }
                }
                PointState::Up => {
                    // Released before the hold elapsed.
                    self.emit(GestureState::Cancelled, event.time, primary.screen);
                    self.state = State::Clear;
                }
                _ => {}
            },

            State::Started => {
                if primary.state == PointState::Up {
                    self.emit(GestureState::Finished, event.time, primary.screen);
                    self.state = State::Clear;
                }
            }

            State::Failed => {
                if primary.state == PointState::Up {
                    self.state = State::Clear;
                }
            }
        }

        std::mem::take(&mut self.emitted)
    }

    /// Advance time; fires the press if the hold duration has elapsed.
    /// Called once per frame tick by the processor.
    pub fn poll(&mut self, now: u32) -> Vec<LongPressGestureEvent> {
        if self.state == State::Touched
            && now.saturating_sub(self.touch_time) >= self.request.minimum_holding_time
        {
            self.state = State::Started;
            self.emit(GestureState::Started, now, self.touch_position);
        }
        std::mem::take(&mut self.emitted)
    }

    fn emit(&mut self, state: GestureState, time: u32, position: Vector2) {
        self.emitted.push(LongPressGestureEvent {
            state,
            time,
            position,
            number_of_touches: self.touch_count.max(1),
        });
    }
}
