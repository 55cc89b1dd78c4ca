//! Panel transport seam.
//!
//! The flush pipeline only ever talks to the panel through
//! [`PanelTransport::draw_bitmap`]. On the board that is the CO5300 QSPI
//! driver; on the host it is [`MemoryPanel`], which keeps panel memory in a
//! plain vector and records every write.

use alloc::{vec, vec::Vec};

/// Writes a rectangle of pixels into panel memory and returns once the
/// write has completed.
pub trait PanelTransport {
    type Error: core::fmt::Debug;

    /// Paint `[x1, x2) x [y1, y2)` in physical coordinates.
    ///
    /// `pixels` holds exactly `(x2 - x1) * (y2 - y1)` pixels, panel
    /// row-major, already in panel byte order.
    fn draw_bitmap(
        &mut self,
        x1: u16,
        y1: u16,
        x2: u16,
        y2: u16,
        pixels: &[u16],
    ) -> Result<(), Self::Error>;
}

impl<T: PanelTransport + ?Sized> PanelTransport for &mut T {
    type Error = T::Error;

    #[inline]
    fn draw_bitmap(&mut self, x1: u16, y1: u16, x2: u16, y2: u16, pixels: &[u16]) -> Result<(), Self::Error> {
        (**self).draw_bitmap(x1, y1, x2, y2, pixels)
    }
}

/// One recorded `draw_bitmap` call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DrawCall {
    pub x1: u16,
    pub y1: u16,
    pub x2: u16,
    pub y2: u16,
}

impl DrawCall {
    #[inline]
    pub fn width(&self) -> u16 {
        self.x2 - self.x1
    }

    #[inline]
    pub fn height(&self) -> u16 {
        self.y2 - self.y1
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MemoryPanelError {
    /// Rectangle leaves the panel or is inverted.
    OutOfBounds,
    /// Pixel slice length does not match the rectangle.
    Length { expected: usize, actual: usize },
    /// Failure injected with [`MemoryPanel::fail_next`].
    Injected,
}

/// In-memory stand-in for the panel.
pub struct MemoryPanel {
    width: u16,
    height: u16,
    pixels: Vec<u16>,
    writes: Vec<u8>,
    calls: Vec<DrawCall>,
    fail_next: u32,
}

impl MemoryPanel {
    pub fn new(width: u16, height: u16) -> Self {
        let n = width as usize * height as usize;
        Self {
            width,
            height,
            pixels: vec![0; n],
            writes: vec![0; n],
            calls: Vec::new(),
            fail_next: 0,
        }
    }

    #[inline]
    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    /// Stored value of physical pixel `(x, y)`.
    #[inline]
    pub fn pixel(&self, x: u16, y: u16) -> u16 {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    /// How many times physical pixel `(x, y)` was written.
    #[inline]
    pub fn write_count(&self, x: u16, y: u16) -> u8 {
        self.writes[y as usize * self.width as usize + x as usize]
    }

    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    /// Forget call history and write counts, keep panel contents.
    pub fn clear_history(&mut self) {
        self.calls.clear();
        self.writes.fill(0);
    }

    /// Make the next `n` draw calls fail without touching panel memory.
    pub fn fail_next(&mut self, n: u32) {
        self.fail_next = n;
    }
}

impl PanelTransport for MemoryPanel {
    type Error = MemoryPanelError;

    fn draw_bitmap(&mut self, x1: u16, y1: u16, x2: u16, y2: u16, pixels: &[u16]) -> Result<(), Self::Error> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(MemoryPanelError::Injected);
        }
        if x1 >= x2 || y1 >= y2 || x2 > self.width || y2 > self.height {
            return Err(MemoryPanelError::OutOfBounds);
        }
        let w = (x2 - x1) as usize;
        let expected = w * (y2 - y1) as usize;
        if pixels.len() != expected {
            return Err(MemoryPanelError::Length {
                expected,
                actual: pixels.len(),
            });
        }

        let fbw = self.width as usize;
        for (row, src) in pixels.chunks_exact(w).enumerate() {
            let base = (y1 as usize + row) * fbw + x1 as usize;
            self.pixels[base..base + w].copy_from_slice(src);
            for count in &mut self.writes[base..base + w] {
                *count = count.saturating_add(1);
            }
        }
        self.calls.push(DrawCall { x1, y1, x2, y2 });
        Ok(())
    }
}
