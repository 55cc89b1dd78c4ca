use core::fmt;

use crate::config::ConfigError;

/// Pipeline error, generic over the panel transport's own error type.
#[derive(Debug, PartialEq, Eq)]
pub enum Error<E> {
    /// Not enough DMA-capable memory for a pixel buffer. Fatal on the board.
    OutOfDmaMemory { bytes: usize },
    /// Both draw buffers are leased.
    Busy,
    /// A scratch request went over the line-group bound.
    ScratchBound { requested: usize, limit: usize },
    /// Pixel slice does not cover the dirty area.
    PixelCount { expected: usize, actual: usize },
    /// Transport kept failing after the configured retries.
    Transport(E),
    Config(ConfigError),
}

impl<E> From<ConfigError> for Error<E> {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfDmaMemory { bytes } => write!(f, "out of DMA memory ({bytes} bytes)"),
            Self::Busy => write!(f, "no free draw buffer"),
            Self::ScratchBound { requested, limit } => {
                write!(f, "scratch request of {requested} bytes exceeds {limit}")
            }
            Self::PixelCount { expected, actual } => {
                write!(f, "expected {expected} pixels, got {actual}")
            }
            Self::Transport(e) => write!(f, "panel transport failed: {e:?}"),
            Self::Config(e) => write!(f, "invalid display config: {e}"),
        }
    }
}
