//! Double-buffered frame of palette-resolved pixels.
//!
//! The PPU draws into the back plane; the end of a rendered frame presents it
//! and clears the new back plane.

use crate::memory::ppu::{FRAME_HEIGHT, FRAME_WIDTH};

/// Pixels per frame.
pub const FRAME_PIXELS: usize = FRAME_WIDTH * FRAME_HEIGHT;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameBuffer {
    planes: [Box<[u16]>; 2],
    /// Index of the back (write) plane.
    active_index: usize,
    presented: u64,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            planes: [
                vec![0; FRAME_PIXELS].into_boxed_slice(),
                vec![0; FRAME_PIXELS].into_boxed_slice(),
            ],
            active_index: 1,
            presented: 0,
        }
    }

    /// Last presented frame, row-major, `FRAME_WIDTH` pixels per row.
    pub fn render(&self) -> &[u16] {
        &self.planes[1 - self.active_index]
    }

    /// Frame currently being drawn.
    pub fn back(&self) -> &[u16] {
        &self.planes[self.active_index]
    }

    /// Number of frames presented so far.
    pub fn presented(&self) -> u64 {
        self.presented
    }

    #[inline]
    pub(crate) fn put(&mut self, x: usize, y: usize, color: u16) {
        if x < FRAME_WIDTH && y < FRAME_HEIGHT {
            self.planes[self.active_index][y * FRAME_WIDTH + x] = color;
        }
    }

    pub(crate) fn swap(&mut self) {
        self.active_index = 1 - self.active_index;
        self.planes[self.active_index].fill(0);
        self.presented += 1;
    }

    pub(crate) fn clear(&mut self) {
        for plane in &mut self.planes {
            plane.fill(0);
        }
        self.active_index = 1;
        self.presented = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_presents_back_plane() {
        let mut fb = FrameBuffer::new();
        fb.put(3, 2, 0xBEEF);
        assert_eq!(fb.render()[2 * FRAME_WIDTH + 3], 0);
        fb.swap();
        assert_eq!(fb.render()[2 * FRAME_WIDTH + 3], 0xBEEF);
        assert!(fb.back().iter().all(|&p| p == 0));
        assert_eq!(fb.presented(), 1);
    }

    #[test]
    fn out_of_range_writes_are_dropped() {
        let mut fb = FrameBuffer::new();
        fb.put(FRAME_WIDTH, 0, 1);
        fb.put(0, FRAME_HEIGHT, 1);
        assert!(fb.back().iter().all(|&p| p == 0));
    }
}
