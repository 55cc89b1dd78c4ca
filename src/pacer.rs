//! Frame pacing.
//!
//! A periodic tick source (a hardware timer interrupt on the board) bumps a
//! [`TickCounter`]. The [`FramePacer`] is the single worker: each step it
//! hands the current tick time to the renderer, lets it flush whatever is
//! pending, then sleeps for the frame period.

use core::sync::atomic::{AtomicU32, Ordering};

use embedded_hal::delay::DelayNs;

use crate::config::DisplayConfig;
use crate::error::Error;
use crate::flush::FlushSink;
use crate::pool::FramePool;

/// Millisecond time base, safe to bump from an interrupt.
pub struct TickCounter(AtomicU32);

impl TickCounter {
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Called from the tick source.
    #[inline]
    pub fn inc(&self, ms: u32) {
        self.0.fetch_add(ms, Ordering::Relaxed);
    }

    #[inline]
    pub fn now_ms(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for TickCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// What the pacer drives: anything that keeps time-based state and turns
/// it into dirty areas.
pub trait Renderer {
    /// Advance animations etc. to `now_ms`.
    fn advance(&mut self, now_ms: u32);

    /// Render and flush everything invalidated so far. Returns the number of
    /// flushes issued.
    fn process_pending<S: FlushSink>(
        &mut self,
        pool: &mut FramePool,
        sink: &mut S,
    ) -> Result<usize, Error<S::Error>>;
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PacerStats {
    pub frames: u32,
    pub flushes: u32,
    /// Steps whose work alone took a whole frame period or more.
    pub overruns: u32,
}

pub struct FramePacer<'t> {
    ticks: &'t TickCounter,
    frame_period_ms: u32,
    stats_interval_ms: u32,
    stats: PacerStats,
    report_start_ms: u32,
    report_at_ms: u32,
    report_frames: u32,
    report_flushes: u32,
    last_fps: Option<u32>,
}

impl<'t> FramePacer<'t> {
    pub fn new(ticks: &'t TickCounter, cfg: &DisplayConfig) -> Self {
        Self {
            ticks,
            frame_period_ms: cfg.frame_period_ms,
            stats_interval_ms: cfg.stats_interval_ms,
            stats: PacerStats::default(),
            report_start_ms: ticks.now_ms(),
            report_at_ms: ticks.now_ms().wrapping_add(cfg.stats_interval_ms),
            report_frames: 0,
            report_flushes: 0,
            last_fps: None,
        }
    }

    #[inline]
    pub fn stats(&self) -> PacerStats {
        self.stats
    }

    /// Frame rate from the last completed stats window, if any.
    #[inline]
    pub fn last_fps(&self) -> Option<u32> {
        self.last_fps
    }

    /// One scheduler step: advance time, process pending work, sleep.
    pub fn step<R, S, D>(
        &mut self,
        renderer: &mut R,
        pool: &mut FramePool,
        sink: &mut S,
        delay: &mut D,
    ) -> Result<usize, Error<S::Error>>
    where
        R: Renderer,
        S: FlushSink,
        D: DelayNs,
    {
        let start = self.ticks.now_ms();
        renderer.advance(start);
        let flushes = renderer.process_pending(pool, sink)?;

        let busy_ms = self.ticks.now_ms().wrapping_sub(start);
        if busy_ms >= self.frame_period_ms {
            self.stats.overruns += 1;
            log::debug!("frame took {busy_ms} ms (period {} ms)", self.frame_period_ms);
        }
        self.stats.frames += 1;
        self.stats.flushes += flushes as u32;
        self.report_frames += 1;
        self.report_flushes += flushes as u32;
        self.maybe_report();

        delay.delay_ms(self.frame_period_ms);
        Ok(flushes)
    }

    /// Step until `keep_running` says stop. Any error ends the loop.
    pub fn run<R, S, D>(
        &mut self,
        renderer: &mut R,
        pool: &mut FramePool,
        sink: &mut S,
        delay: &mut D,
        mut keep_running: impl FnMut(&PacerStats) -> bool,
    ) -> Result<PacerStats, Error<S::Error>>
    where
        R: Renderer,
        S: FlushSink,
        D: DelayNs,
    {
        while keep_running(&self.stats) {
            self.step(renderer, pool, sink, delay)?;
        }
        Ok(self.stats)
    }

    fn maybe_report(&mut self) {
        let now = self.ticks.now_ms();
        // wrapping-safe "now >= report_at"
        if (now.wrapping_sub(self.report_at_ms) as i32) < 0 {
            return;
        }
        // slow frames stretch the window past the interval
        let elapsed = now.wrapping_sub(self.report_start_ms).max(1);
        let fps = self.report_frames * 1000 / elapsed;
        log::info!(
            "{} fps, {} flushes, {} overruns total",
            fps,
            self.report_flushes,
            self.stats.overruns
        );
        self.last_fps = Some(fps);
        self.report_start_ms = now;
        self.report_at_ms = now.wrapping_add(self.stats_interval_ms);
        self.report_frames = 0;
        self.report_flushes = 0;
    }
}
