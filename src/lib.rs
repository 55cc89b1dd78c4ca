#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod error;
pub mod flush;
pub mod geometry;
pub mod pacer;
pub mod pool;
pub mod rounder;
pub mod transport;
pub mod ui;

#[cfg(feature = "disp_co5300")]
pub mod co5300;
#[cfg(feature = "esp32s3-disp164Oled")]
pub mod display;
#[cfg(feature = "esp32s3-disp164Oled")]
pub mod wiring;

pub use config::{ConfigError, DisplayConfig, Orientation, PixelOrder, ScratchStrategy};
pub use error::Error;
pub use flush::{FlushPipeline, FlushSink, FlushStats};
pub use geometry::Area;
pub use pacer::{FramePacer, PacerStats, Renderer, TickCounter};
pub use pool::{DmaBuffer, FramePool, Lease, PoolError, ScratchBuffer, Transfer};
pub use rounder::{RegionRounder, TileRounder};
pub use transport::{MemoryPanel, PanelTransport};
pub use ui::OverlayUi;
