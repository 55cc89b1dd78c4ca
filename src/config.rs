//! Display pipeline configuration.
//!
//! Everything here is fixed at build time on the board, but it is kept in a
//! plain struct so the pipeline can be exercised on the host with other
//! geometries.

use core::fmt;

/// How logical (renderer) coordinates map onto the panel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Orientation {
    /// Logical and physical coordinates coincide.
    Native,
    /// Portrait panel driven as a landscape canvas; rotated 90° in software.
    RotatedLandscape,
}

/// Byte order the transport expects for each RGB565 pixel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PixelOrder {
    /// Swap the two bytes of every pixel (renderer is LE, the panel wants BE).
    Swapped,
    /// Send pixels as rendered.
    AsIs,
}

/// Where the rotated path gets its line-group scratch buffer from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScratchStrategy {
    /// Allocated at the start of each rotated flush, freed when it ends.
    Transient,
    /// Allocated once with the pipeline and reused.
    Resident,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DisplayConfig {
    /// Native panel width (physical columns).
    pub panel_width: u16,
    /// Native panel height (physical rows).
    pub panel_height: u16,
    pub orientation: Orientation,
    /// Invalidation tile size, in pixels.
    pub align: u16,
    /// Rows per line group on the rotated path.
    pub line_group: u16,
    pub tick_period_ms: u32,
    pub frame_period_ms: u32,
    pub pixel_order: PixelOrder,
    /// Draw buffer height, counted in panel-width rows.
    pub draw_buf_lines: u16,
    /// Byte alignment of every DMA buffer.
    pub dma_align: usize,
    /// Extra attempts for a failing transport call before giving up.
    pub transport_retries: u8,
    pub scratch: ScratchStrategy,
    /// How often the pacer logs its frame statistics.
    pub stats_interval_ms: u32,
}

impl DisplayConfig {
    /// CO5300 1.64" AMOLED (280x456) driven as a 456x280 landscape canvas.
    pub const CO5300_LANDSCAPE: Self = Self {
        panel_width: 280,
        panel_height: 456,
        orientation: Orientation::RotatedLandscape,
        align: 8,
        line_group: 8,
        tick_period_ms: 2,
        frame_period_ms: 16,
        pixel_order: PixelOrder::Swapped,
        draw_buf_lines: 152, // 1/4 of the panel
        dma_align: 64,
        transport_retries: 2,
        scratch: ScratchStrategy::Transient,
        stats_interval_ms: 1000,
    };

    /// Same panel, portrait, no software rotation.
    pub const CO5300_PORTRAIT: Self = Self {
        orientation: Orientation::Native,
        ..Self::CO5300_LANDSCAPE
    };

    /// Logical canvas (width, height) seen by the renderer.
    #[inline]
    pub const fn canvas_size(&self) -> (u16, u16) {
        match self.orientation {
            Orientation::Native => (self.panel_width, self.panel_height),
            Orientation::RotatedLandscape => (self.panel_height, self.panel_width),
        }
    }

    /// Pixels held by each of the two draw buffers.
    #[inline]
    pub const fn draw_buf_pixels(&self) -> usize {
        self.panel_width as usize * self.draw_buf_lines as usize
    }

    /// Upper bound for one scratch line group, in pixels.
    #[inline]
    pub const fn scratch_pixels(&self) -> usize {
        self.line_group as usize * self.canvas_size().0 as usize
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.panel_width == 0 || self.panel_height == 0 {
            return Err(ConfigError::EmptyPanel);
        }
        if self.align == 0 {
            return Err(ConfigError::ZeroAlignment);
        }
        let (canvas_w, canvas_h) = self.canvas_size();
        if self.line_group == 0 || self.line_group > canvas_h {
            return Err(ConfigError::LineGroup(self.line_group));
        }
        if self.tick_period_ms == 0 || self.frame_period_ms < self.tick_period_ms {
            return Err(ConfigError::Periods {
                tick_ms: self.tick_period_ms,
                frame_ms: self.frame_period_ms,
            });
        }
        // The renderer must fit at least one full logical row per buffer.
        if self.draw_buf_pixels() < canvas_w as usize {
            return Err(ConfigError::DrawBufferTooSmall(self.draw_buf_pixels()));
        }
        if !self.dma_align.is_power_of_two() || self.dma_align < core::mem::align_of::<u16>() {
            return Err(ConfigError::DmaAlign(self.dma_align));
        }
        Ok(())
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self::CO5300_LANDSCAPE
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    EmptyPanel,
    ZeroAlignment,
    LineGroup(u16),
    Periods { tick_ms: u32, frame_ms: u32 },
    DrawBufferTooSmall(usize),
    DmaAlign(usize),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPanel => write!(f, "panel has no pixels"),
            Self::ZeroAlignment => write!(f, "invalidation alignment must be non-zero"),
            Self::LineGroup(g) => write!(f, "line group of {g} rows does not fit the canvas"),
            Self::Periods { tick_ms, frame_ms } => {
                write!(f, "bad periods: tick {tick_ms} ms, frame {frame_ms} ms")
            }
            Self::DrawBufferTooSmall(px) => write!(f, "draw buffer of {px} px cannot hold a row"),
            Self::DmaAlign(a) => write!(f, "DMA alignment {a} is not a usable power of two"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_presets_are_valid() {
        assert_eq!(DisplayConfig::CO5300_LANDSCAPE.validate(), Ok(()));
        assert_eq!(DisplayConfig::CO5300_PORTRAIT.validate(), Ok(()));
    }

    #[test]
    fn test_canvas_size_follows_orientation() {
        assert_eq!(DisplayConfig::CO5300_LANDSCAPE.canvas_size(), (456, 280));
        assert_eq!(DisplayConfig::CO5300_PORTRAIT.canvas_size(), (280, 456));
    }

    #[test]
    fn test_landscape_timing_matches_tick_source() {
        // the firmware arms its tick timer and counter from these
        let cfg = DisplayConfig::CO5300_LANDSCAPE;
        assert_eq!(cfg.tick_period_ms, 2);
        assert_eq!(cfg.frame_period_ms, 16);
        assert_eq!(cfg.frame_period_ms % cfg.tick_period_ms, 0);
    }

    #[test]
    fn test_buffer_sizes() {
        let cfg = DisplayConfig::CO5300_LANDSCAPE;
        // 280 * 152 * 2 bytes, as on the board
        assert_eq!(cfg.draw_buf_pixels() * 2, 85_120);
        assert_eq!(cfg.scratch_pixels(), 8 * 456);
    }

    #[test]
    fn test_rejects_inconsistent_values() {
        let base = DisplayConfig::CO5300_LANDSCAPE;
        assert_eq!(
            DisplayConfig { align: 0, ..base }.validate(),
            Err(ConfigError::ZeroAlignment)
        );
        assert_eq!(
            DisplayConfig { line_group: 0, ..base }.validate(),
            Err(ConfigError::LineGroup(0))
        );
        assert!(matches!(
            DisplayConfig { frame_period_ms: 1, ..base }.validate(),
            Err(ConfigError::Periods { .. })
        ));
        assert_eq!(
            DisplayConfig { draw_buf_lines: 1, ..base }.validate(),
            Err(ConfigError::DrawBufferTooSmall(280))
        );
        assert_eq!(
            DisplayConfig { dma_align: 48, ..base }.validate(),
            Err(ConfigError::DmaAlign(48))
        );
    }
}
