//! Dirty-rectangle flush pipeline.
//!
//! Takes a rendered dirty area in logical coordinates and paints it on the
//! panel:
//!
//! - **Native**: fix the byte order in place, one `draw_bitmap` for the area.
//! - **Rotated landscape**: fix the byte order in place, then rotate the area
//!   90° one line group at a time through a small scratch buffer, one
//!   `draw_bitmap` per group. Logical `(x, y)` lands on physical
//!   `(panel_width - 1 - y, x)`.
//!
//! The scratch buffer never holds more than `line_group * logical_width`
//! pixels, whatever the height of the dirty area.

use core::fmt;

use crate::config::{DisplayConfig, Orientation, PixelOrder, ScratchStrategy};
use crate::error::Error;
use crate::geometry::Area;
use crate::pool::ScratchBuffer;
use crate::transport::PanelTransport;

/// Receives rendered dirty areas from the renderer.
pub trait FlushSink {
    type Error: fmt::Debug;

    /// Paint `area` using `pixels` (row-major, `area.width()` per row).
    ///
    /// `pixels` may be modified in place and is only borrowed for the call.
    /// Returning `Ok` means the last transport call for the area has
    /// completed: the renderer may reuse the buffer.
    fn flush(&mut self, area: Area, pixels: &mut [u16]) -> Result<(), Error<Self::Error>>;
}

/// Counters kept by the pipeline.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub flushes: u32,
    pub transport_calls: u32,
    pub pixels_written: u64,
    pub retries: u32,
    pub peak_scratch_bytes: usize,
}

/// Swap each pixel's bytes when the transport wants the other order.
#[inline]
pub fn fix_byte_order(pixels: &mut [u16], order: PixelOrder) {
    if order == PixelOrder::Swapped {
        for p in pixels.iter_mut() {
            *p = p.swap_bytes();
        }
    }
}

/// Shrink a `from`-shaped row-major block to its `to` sub-area, in place.
/// Returns the compacted prefix.
fn compact_in_place<'a>(pixels: &'a mut [u16], from: &Area, to: &Area) -> &'a mut [u16] {
    let src_w = from.width() as usize;
    let dst_w = to.width() as usize;
    let dx = (to.x1 - from.x1) as usize;
    let dy = (to.y1 - from.y1) as usize;
    for row in 0..to.height() as usize {
        let src = (row + dy) * src_w + dx;
        // dst <= src, so front-to-back copying never clobbers unread rows
        pixels.copy_within(src..src + dst_w, row * dst_w);
    }
    &mut pixels[..to.pixel_count()]
}

pub struct FlushPipeline<T: PanelTransport> {
    transport: T,
    cfg: DisplayConfig,
    resident: Option<ScratchBuffer>,
    stats: FlushStats,
}

impl<T: PanelTransport> FlushPipeline<T> {
    pub fn new(transport: T, cfg: DisplayConfig) -> Result<Self, Error<T::Error>> {
        cfg.validate()?;
        let resident = match (cfg.orientation, cfg.scratch) {
            (Orientation::RotatedLandscape, ScratchStrategy::Resident) => {
                Some(ScratchBuffer::try_new(cfg.scratch_pixels(), &cfg)?)
            }
            _ => None,
        };
        log::info!(
            "Flush pipeline: {:?}, canvas {:?}, line group {}, scratch {:?}",
            cfg.orientation,
            cfg.canvas_size(),
            cfg.line_group,
            cfg.scratch
        );
        Ok(Self {
            transport,
            cfg,
            resident,
            stats: FlushStats::default(),
        })
    }

    #[inline]
    pub fn config(&self) -> &DisplayConfig {
        &self.cfg
    }

    #[inline]
    pub fn stats(&self) -> FlushStats {
        self.stats
    }

    #[inline]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[inline]
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    fn draw(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, pixels: &[u16]) -> Result<(), Error<T::Error>> {
        let mut attempt = 0u8;
        loop {
            match self
                .transport
                .draw_bitmap(x1 as u16, y1 as u16, x2 as u16, y2 as u16, pixels)
            {
                Ok(()) => {
                    self.stats.transport_calls += 1;
                    self.stats.pixels_written += pixels.len() as u64;
                    return Ok(());
                }
                Err(e) if attempt < self.cfg.transport_retries => {
                    attempt += 1;
                    self.stats.retries += 1;
                    log::warn!(
                        "draw_bitmap ({x1},{y1})..({x2},{y2}) failed: {e:?}, retry {attempt}/{}",
                        self.cfg.transport_retries
                    );
                }
                Err(e) => {
                    log::error!("draw_bitmap ({x1},{y1})..({x2},{y2}) failed for good: {e:?}");
                    return Err(Error::Transport(e));
                }
            }
        }
    }

    fn flush_native(&mut self, area: Area, pixels: &[u16]) -> Result<(), Error<T::Error>> {
        self.draw(area.x1, area.y1, area.x2 + 1, area.y2 + 1, pixels)
    }

    fn flush_rotated(&mut self, area: Area, pixels: &[u16]) -> Result<(), Error<T::Error>> {
        let w = area.width() as usize;
        let h = area.height();
        let group = self.cfg.line_group as i32;
        let panel_w = self.cfg.panel_width as i32;

        let mut scratch = match self.resident.take() {
            Some(s) => s,
            None => ScratchBuffer::try_new(group.min(h) as usize * w, &self.cfg)?,
        };
        self.stats.peak_scratch_bytes = self.stats.peak_scratch_bytes.max(scratch.byte_len());

        let mut result = Ok(());
        let mut start = 0;
        while start < h {
            let g = group.min(h - start) as usize;
            let buf = scratch.prefix_mut(g * w);
            for y in 0..g {
                let row_off = (start as usize + y) * w;
                let row = &pixels[row_off..row_off + w];
                for (x, &p) in row.iter().enumerate() {
                    buf[x * g + (g - 1 - y)] = p;
                }
            }

            // Group rows become panel columns, counted from the right edge.
            let px2 = panel_w - area.y1 - start;
            let px1 = px2 - g as i32;
            result = self.draw(px1, area.x1, px2, area.x2 + 1, scratch.prefix_mut(g * w));
            if result.is_err() {
                break;
            }
            start += g as i32;
        }

        if self.cfg.scratch == ScratchStrategy::Resident {
            self.resident = Some(scratch);
        }
        result
    }
}

impl<T: PanelTransport> FlushSink for FlushPipeline<T> {
    type Error = T::Error;

    fn flush(&mut self, area: Area, pixels: &mut [u16]) -> Result<(), Error<T::Error>> {
        self.stats.flushes += 1;
        if area.is_empty() {
            return Ok(());
        }
        let expected = area.pixel_count();
        if pixels.len() < expected {
            return Err(Error::PixelCount {
                expected,
                actual: pixels.len(),
            });
        }

        let (canvas_w, canvas_h) = self.cfg.canvas_size();
        let Some(clipped) = area.clamp_to(canvas_w, canvas_h) else {
            log::warn!("flush of {area:?} is off-canvas, ignored");
            return Ok(());
        };
        let pixels = if clipped == area {
            &mut pixels[..expected]
        } else {
            log::warn!("flush of {area:?} clipped to {clipped:?}");
            compact_in_place(pixels, &area, &clipped)
        };

        log::trace!("flush {clipped:?} ({} px)", pixels.len());
        fix_byte_order(pixels, self.cfg.pixel_order);
        match self.cfg.orientation {
            Orientation::Native => self.flush_native(clipped, pixels),
            Orientation::RotatedLandscape => self.flush_rotated(clipped, pixels),
        }
    }
}
