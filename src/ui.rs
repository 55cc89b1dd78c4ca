//! Overlay UI: a beach-gradient background with one text label sliding
//! across it.
//!
//! The renderer side of the pipeline:
//! - invalidated areas go through a [`RegionRounder`] before they are queued
//! - pending areas are rendered in bands that fit one draw buffer
//! - each band is drawn with embedded-graphics, then handed to a [`FlushSink`]

use core::convert::Infallible;

use embedded_graphics::{
    mono_font::{iso_8859_1::FONT_10X20, MonoTextStyle},
    pixelcolor::Rgb565,
    prelude::*,
    primitives::Rectangle,
    text::{Baseline, Text},
};

use crate::config::DisplayConfig;
use crate::error::Error;
use crate::flush::FlushSink;
use crate::geometry::Area;
use crate::pacer::Renderer;
use crate::pool::FramePool;
use crate::rounder::{RegionRounder, TileRounder};

/// Queued areas before everything collapses into one full-canvas repaint.
pub const MAX_DIRTY: usize = 8;

/// Gap between the top of the canvas and the label.
const LABEL_PAD_TOP: i32 = 20;
const LABEL_MARGIN: i32 = 20;
const SLIDE_PERIOD_MS: u32 = 4000;

/// Ping-pong horizontal slide with cosine easing.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Slide {
    pub from: i32,
    pub to: i32,
    pub period_ms: u32,
}

impl Slide {
    pub fn x_at(&self, now_ms: u32) -> i32 {
        let period = self.period_ms.max(1);
        let t = (now_ms % period) as f32 / period as f32;
        let tri = if t < 0.5 { t * 2.0 } else { 2.0 - t * 2.0 };
        let eased = (1.0 - libm::cosf(core::f32::consts::PI * tri)) * 0.5;
        self.from + libm::roundf((self.to - self.from) as f32 * eased) as i32
    }
}

/// DrawTarget over one band of the canvas, backed by a draw buffer.
struct BandTarget<'a> {
    pixels: &'a mut [u16],
    area: Area,
}

impl Dimensions for BandTarget<'_> {
    fn bounding_box(&self) -> Rectangle {
        self.area.into()
    }
}

impl DrawTarget for BandTarget<'_> {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let w = self.area.width();
        for Pixel(p, c) in pixels {
            if !self.area.contains(p.x, p.y) {
                continue;
            }
            let idx = (p.y - self.area.y1) * w + (p.x - self.area.x1);
            self.pixels[idx as usize] = c.into_storage();
        }
        Ok(())
    }
}

/// Sky, sea and sand, top to bottom.
fn background(y: i32, height: i32) -> Rgb565 {
    let horizon = (height * 9 / 20).max(1);
    let shore = height * 7 / 10;
    if y < horizon {
        let t = (y * 16 / horizon) as u8;
        Rgb565::new(10 + t / 2, 36 + t, 31)
    } else if y < shore {
        let t = ((y - horizon) * 8 / (shore - horizon).max(1)) as u8;
        Rgb565::new(2, 30 - t, 24 - t)
    } else {
        Rgb565::new(30, 50, 18)
    }
}

pub struct OverlayUi<R: RegionRounder = TileRounder> {
    width: u16,
    height: u16,
    align: i32,
    rounder: R,
    dirty: heapless::Vec<Area, MAX_DIRTY>,
    label: &'static str,
    label_pos: Point,
    slide: Option<Slide>,
}

impl OverlayUi<TileRounder> {
    /// Label centred horizontally, sliding between the canvas margins.
    pub fn new(cfg: &DisplayConfig, label: &'static str) -> Self {
        let (w, h) = cfg.canvas_size();
        let mut ui = Self::with_rounder(cfg, label, TileRounder::new(cfg.align, w, h));
        let text_w = ui.label_area().width();
        ui.slide = Some(Slide {
            from: LABEL_MARGIN,
            to: (w as i32 - text_w - LABEL_MARGIN).max(LABEL_MARGIN),
            period_ms: SLIDE_PERIOD_MS,
        });
        ui
    }
}

impl<R: RegionRounder> OverlayUi<R> {
    /// Static label; the first `process_pending` repaints the whole canvas.
    pub fn with_rounder(cfg: &DisplayConfig, label: &'static str, rounder: R) -> Self {
        let (w, h) = cfg.canvas_size();
        let mut ui = Self {
            width: w,
            height: h,
            align: cfg.align as i32,
            rounder,
            dirty: heapless::Vec::new(),
            label,
            label_pos: Point::new(0, LABEL_PAD_TOP),
            slide: None,
        };
        let text_w = ui.label_area().width();
        ui.label_pos.x = (w as i32 - text_w) / 2;
        ui.invalidate(Area::canvas(w, h));
        ui
    }

    pub fn set_slide(&mut self, slide: Option<Slide>) {
        self.slide = slide;
    }

    pub fn label_area(&self) -> Area {
        self.label_text().bounding_box().into()
    }

    pub fn pending(&self) -> &[Area] {
        &self.dirty
    }

    /// Queue `area` for repaint, after rounding it to the tile grid.
    pub fn invalidate(&mut self, area: Area) {
        let mut area = self.rounder.round_invalidated_region(area);
        if area.is_empty() {
            return;
        }
        // Absorb every queued area the new one touches; a grown union can
        // reach entries the original did not, so rescan after each merge.
        let mut i = 0;
        while i < self.dirty.len() {
            if self.dirty[i].intersection(&area).is_some() {
                area = area.union(&self.dirty.swap_remove(i));
                i = 0;
            } else {
                i += 1;
            }
        }
        if self.dirty.push(area).is_err() {
            log::debug!("dirty list full, repainting everything");
            self.dirty.clear();
            let _ = self.dirty.push(Area::canvas(self.width, self.height));
        }
    }

    fn label_text(&self) -> Text<'static, MonoTextStyle<'static, Rgb565>> {
        let style = MonoTextStyle::new(&FONT_10X20, Rgb565::WHITE);
        Text::with_baseline(self.label, self.label_pos, style, Baseline::Top)
    }

    fn render_band(&self, band: Area, pixels: &mut [u16]) {
        let w = band.width() as usize;
        for (r, row) in pixels.chunks_exact_mut(w).enumerate() {
            let bg = background(band.y1 + r as i32, self.height as i32).into_storage();
            row.fill(bg);
        }
        let mut target = BandTarget { pixels, area: band };
        let _ = self.label_text().draw(&mut target);
    }

    /// Rows per band: as many as one draw buffer holds, kept on the tile grid.
    fn band_rows(&self, area: &Area, capacity: usize) -> i32 {
        let fit = (capacity / area.width() as usize) as i32;
        let aligned = if fit >= self.align { fit - fit % self.align } else { fit };
        aligned.max(1).min(area.height())
    }
}

impl<R: RegionRounder> Renderer for OverlayUi<R> {
    fn advance(&mut self, now_ms: u32) {
        let Some(slide) = self.slide else {
            return;
        };
        let x = slide.x_at(now_ms);
        if x != self.label_pos.x {
            let old = self.label_area();
            self.label_pos.x = x;
            let new = self.label_area();
            self.invalidate(old);
            self.invalidate(new);
        }
    }

    fn process_pending<S: FlushSink>(
        &mut self,
        pool: &mut FramePool,
        sink: &mut S,
    ) -> Result<usize, Error<S::Error>> {
        let pending = core::mem::replace(&mut self.dirty, heapless::Vec::new());
        let mut flushes = 0;
        for area in pending.iter() {
            let rows = self.band_rows(area, pool.capacity());
            let mut start = 0;
            while start < area.height() {
                let band = area.rows(start, rows);
                let n = band.pixel_count();

                let lease = pool.acquire()?;
                self.render_band(band, &mut pool.pixels_mut(&lease)[..n]);
                let res = pool.with_transfer(&lease, |px| sink.flush(band, &mut px[..n]));
                pool.release(lease);
                res?;

                flushes += 1;
                start += rows;
            }
        }
        Ok(flushes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flush::FlushPipeline;
    use crate::transport::MemoryPanel;
    use alloc::vec::Vec;

    const LABEL: &str = "20.4 °C";

    /// Records areas without touching a panel.
    #[derive(Default)]
    struct AreaLog {
        areas: Vec<Area>,
    }

    impl FlushSink for AreaLog {
        type Error = Infallible;

        fn flush(&mut self, area: Area, pixels: &mut [u16]) -> Result<(), Error<Infallible>> {
            assert_eq!(pixels.len(), area.pixel_count());
            self.areas.push(area);
            Ok(())
        }
    }

    #[test]
    fn test_first_frame_paints_canvas_once() {
        let cfg = DisplayConfig::CO5300_LANDSCAPE;
        let mut ui = OverlayUi::new(&cfg, LABEL);
        let mut pool = FramePool::new(&cfg).unwrap();
        let mut sink = FlushPipeline::new(MemoryPanel::new(280, 456), cfg).unwrap();

        ui.advance(0);
        // 42_560 px per buffer / 456 px per row = 93 rows, 88 on the tile grid
        assert_eq!(ui.process_pending(&mut pool, &mut sink).unwrap(), 4);

        let panel = sink.transport();
        let label = ui.label_area();
        let mut white = 0;
        for py in 0..456u16 {
            for px in 0..280u16 {
                assert_eq!(panel.write_count(px, py), 1, "({px},{py})");
                // physical (px, py) shows logical (py, 279 - px)
                let (lx, ly) = (py as i32, 279 - px as i32);
                if panel.pixel(px, py) == 0xFFFF {
                    assert!(label.contains(lx, ly), "white outside label at ({lx},{ly})");
                    white += 1;
                }
            }
        }
        assert!(white > 0);
        assert_eq!(pool.free(), 2);
    }

    #[test]
    fn test_background_is_swapped_on_panel() {
        let cfg = DisplayConfig::CO5300_PORTRAIT;
        let mut ui = OverlayUi::with_rounder(&cfg, "", TileRounder::new(8, 280, 456));
        let mut pool = FramePool::new(&cfg).unwrap();
        let mut sink = FlushPipeline::new(MemoryPanel::new(280, 456), cfg).unwrap();
        ui.process_pending(&mut pool, &mut sink).unwrap();

        let panel = sink.transport();
        for y in [0, 100, 300, 455] {
            let expected = background(y, 456).into_storage().swap_bytes();
            assert_eq!(panel.pixel(140, y as u16), expected);
        }
    }

    #[test]
    fn test_idle_frame_flushes_nothing() {
        let cfg = DisplayConfig::CO5300_LANDSCAPE;
        let mut ui = OverlayUi::with_rounder(&cfg, LABEL, TileRounder::new(8, 456, 280));
        let mut pool = FramePool::new(&cfg).unwrap();
        let mut log = AreaLog::default();
        ui.process_pending(&mut pool, &mut log).unwrap();

        ui.advance(16);
        assert_eq!(ui.process_pending(&mut pool, &mut log).unwrap(), 0);
    }

    #[test]
    fn test_animation_flushes_aligned_areas() {
        let cfg = DisplayConfig::CO5300_LANDSCAPE;
        let mut ui = OverlayUi::new(&cfg, LABEL);
        let mut pool = FramePool::new(&cfg).unwrap();
        let mut log = AreaLog::default();
        ui.advance(0);
        ui.process_pending(&mut pool, &mut log).unwrap();
        log.areas.clear();

        ui.advance(1000);
        assert!(ui.process_pending(&mut pool, &mut log).unwrap() >= 1);
        for a in &log.areas {
            assert_eq!(a.x1 % 8, 0);
            assert_eq!(a.y1 % 8, 0);
            assert_eq!((a.x2 + 1) % 8, 0);
            assert_eq!((a.y2 + 1) % 8, 0);
            assert!(a.width() < 456, "label move should not repaint the full width");
        }
        let label = ui.label_area();
        assert!(log.areas.iter().any(|a| a.encloses(&label)));
    }

    #[test]
    fn test_dirty_overflow_collapses_to_canvas() {
        let cfg = DisplayConfig::CO5300_LANDSCAPE;
        let mut ui = OverlayUi::with_rounder(&cfg, LABEL, TileRounder::new(8, 456, 280));
        let mut pool = FramePool::new(&cfg).unwrap();
        ui.process_pending(&mut pool, &mut AreaLog::default()).unwrap();

        for i in 0..(MAX_DIRTY as i32 + 1) {
            ui.invalidate(Area::new(i * 40, 200, i * 40 + 3, 203));
        }
        assert_eq!(ui.pending(), &[Area::canvas(456, 280)]);
    }

    #[test]
    fn test_bridging_invalidation_merges_all_touched_areas() {
        let cfg = DisplayConfig::CO5300_LANDSCAPE;
        let mut ui = OverlayUi::with_rounder(&cfg, LABEL, TileRounder::new(8, 456, 280));
        let mut pool = FramePool::new(&cfg).unwrap();
        ui.process_pending(&mut pool, &mut AreaLog::default()).unwrap();

        ui.invalidate(Area::new(0, 0, 7, 7));
        ui.invalidate(Area::new(16, 0, 23, 7));
        ui.invalidate(Area::new(4, 0, 20, 7));
        assert_eq!(ui.pending(), &[Area::new(0, 0, 23, 7)]);

        ui.invalidate(Area::new(40, 40, 47, 47));
        let pending = ui.pending();
        for (i, a) in pending.iter().enumerate() {
            for b in &pending[i + 1..] {
                assert!(a.intersection(b).is_none(), "{a:?} overlaps {b:?}");
            }
        }

        let mut log = AreaLog::default();
        ui.process_pending(&mut pool, &mut log).unwrap();
        let painted: usize = log.areas.iter().map(|a| a.pixel_count()).sum();
        assert_eq!(painted, 24 * 8 + 8 * 8);
    }

    #[test]
    fn test_slide_endpoints() {
        let s = Slide { from: 20, to: 366, period_ms: 4000 };
        assert_eq!(s.x_at(0), 20);
        assert_eq!(s.x_at(2000), 366);
        assert_eq!(s.x_at(4000), 20);
        let mid = s.x_at(1000);
        assert!(mid > 20 && mid < 366);
    }
}
