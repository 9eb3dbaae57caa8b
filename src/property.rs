//! Double-buffered property values.
//!
//! Every mutable scene value keeps two copies, addressed by a frame-parity
//! bit (`BufferIndex`) that the update loop flips exactly once per
//! completed frame. Readers always pass the buffer index that is current
//! for their thread; writers pick between two visibilities:
//!
//! - **set**: write both buffers, visible this frame and next.
//! - **bake**: write only the *other* buffer, becoming visible after the
//!   index flips. An in-flight render pass keeps reading the old value.
//!
//! Passing the index explicitly through every call keeps the
//! data-race-freedom argument inspectable at each call site instead of
//! hiding it behind a global "current frame" notion.

/// Selects one of the two property buffers. Always 0 or 1.
pub type BufferIndex = usize;

/// Number of buffers a double-buffered value holds.
pub const BUFFER_COUNT: usize = 2;

/// Flip a buffer index to the other buffer.
#[inline]
pub fn other_buffer(index: BufferIndex) -> BufferIndex {
    1 - index
}

/// A value container holding two copies of `T`, indexed externally.
///
/// Owned by exactly one property slot; created and destroyed with its
/// owner, never shared.
#[derive(Clone, Copy, Debug, Default)]
pub struct DoubleBuffered<T> {
    values: [T; BUFFER_COUNT],
}

impl<T: Clone> DoubleBuffered<T> {
    /// Create with the same initial value in both buffers.
    pub fn new(initial: T) -> Self {
        Self {
            values: [initial.clone(), initial],
        }
    }

    /// Read the value for the given buffer. Always fully written: writers
    /// never mutate the buffer a reader may read this frame.
    pub fn get(&self, index: BufferIndex) -> &T {
        &self.values[index]
    }

    pub fn get_mut(&mut self, index: BufferIndex) -> &mut T {
        &mut self.values[index]
    }

    /// Write both buffers; the value is visible on the current frame and
    /// every following one.
    pub fn set(&mut self, _index: BufferIndex, value: T) {
        self.values[0] = value.clone();
        self.values[1] = value;
    }

    /// Write only the next-visible buffer, leaving the current frame's
    /// value untouched.
    pub fn bake(&mut self, index: BufferIndex, value: T) {
        self.values[other_buffer(index)] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_writes_both_buffers() {
        let mut p = DoubleBuffered::new(1);
        p.set(0, 7);
        assert_eq!(*p.get(0), 7);
        assert_eq!(*p.get(1), 7);
    }

    #[test]
    fn test_bake_leaves_current_frame_untouched() {
        let mut p = DoubleBuffered::new(1);
        p.bake(0, 9);
        assert_eq!(*p.get(0), 1, "current buffer must keep the old value");
        assert_eq!(*p.get(1), 9, "next buffer carries the baked value");

        // After the flip the baked value becomes visible.
        let next = other_buffer(0);
        assert_eq!(*p.get(next), 9);
    }

    #[test]
    fn test_bake_then_set_overrides() {
        let mut p = DoubleBuffered::new(0);
        p.bake(0, 5);
        p.set(0, 3);
        assert_eq!(*p.get(0), 3);
        assert_eq!(*p.get(1), 3);
    }

    #[test]
    fn test_other_buffer_flips() {
        assert_eq!(other_buffer(0), 1);
        assert_eq!(other_buffer(1), 0);
    }
}
