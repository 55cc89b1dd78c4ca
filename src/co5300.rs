// CO5300 AMOLED driver, QSPI mode.
//
// Wiring on Waveshare ESP32-S3 Touch AMOLED 1.64" (CO5300, 280 x 456):
//   CS  = GPIO9
//   SCK = GPIO10
//   SIO0..SIO3 = GPIO11..GPIO14
//   RST = GPIO21
//
// Framing:
//   init: 0x02, then 24-bit address (0x00, CMD, 0x00), then data, all 1-wire
//   after 0x38 everything goes out on 4 wires: 0x02 for window commands,
//   0x32 for pixel data (0x2C first chunk, 0x3C after)
// The visible area starts 20 columns into panel RAM.

use core::fmt;

use bytemuck::cast_slice;
use embedded_hal::{delay::DelayNs, digital::OutputPin};

use crate::transport::PanelTransport;

pub const CO5300_WIDTH: u16 = 280;
pub const CO5300_HEIGHT: u16 = 456;
pub const CO5300_X_GAP: u16 = 20;

const WRITE_INSTR: u8 = 0x02;
const PIXEL_INSTR: u8 = 0x32;
const QPI_ENTER: u8 = 0x38;
const RAMWR_OPCODE: u8 = 0x2C;
const RAMWRC_OPCODE: u8 = 0x3C;
// max DMA chunk size for ESP32-S3 SPI
pub const DMA_CHUNK_SIZE: usize = 32 * 1023;

/// Bus width of one whole transaction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Lanes {
    Single,
    Quad,
}

/// One CS-framed half-duplex write: 8-bit instruction, optional 24-bit
/// address `(0x00, cmd, 0x00)`, then `data`.
pub trait QspiBus {
    type Error: fmt::Debug;

    fn write(&mut self, lanes: Lanes, instr: u8, cmd: Option<u8>, data: &[u8]) -> Result<(), Self::Error>;
}

#[derive(Debug, PartialEq, Eq)]
pub enum Co5300Error<SpiE, GpioE> {
    Spi(SpiE),
    Gpio(GpioE),
    OutOfBounds,
    Length { expected: usize, actual: usize },
}

impl<SpiE: fmt::Debug, GpioE: fmt::Debug> fmt::Display for Co5300Error<SpiE, GpioE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spi(e) => write!(f, "spi: {e:?}"),
            Self::Gpio(e) => write!(f, "gpio: {e:?}"),
            Self::OutOfBounds => write!(f, "window outside panel"),
            Self::Length { expected, actual } => {
                write!(f, "expected {expected} pixels, got {actual}")
            }
        }
    }
}

pub struct Co5300Display<B, RST> {
    bus: B,
    rst: Option<RST>,
    w: u16,
    h: u16,
    x_off: u16,
    y_off: u16,
}

type DriverResult<B, RST> =
    Result<(), Co5300Error<<B as QspiBus>::Error, <RST as embedded_hal::digital::ErrorType>::Error>>;

impl<B, RST> Co5300Display<B, RST>
where
    B: QspiBus,
    RST: OutputPin,
{
    /// Reset and initialise the panel, then switch the bus to quad mode for
    /// everything that follows.
    pub fn new(
        bus: B,
        rst: Option<RST>,
        delay: &mut impl DelayNs,
        width: u16,
        height: u16,
        x_off: u16,
    ) -> Result<Self, Co5300Error<B::Error, RST::Error>> {
        let mut this = Self {
            bus,
            rst,
            w: width,
            h: height,
            x_off,
            y_off: 0,
        };

        // Hard reset sequence
        if let Some(r) = this.rst.as_mut() {
            r.set_high().map_err(Co5300Error::Gpio)?;
            delay.delay_ms(2);
            r.set_low().map_err(Co5300Error::Gpio)?;
            delay.delay_ms(80);
            r.set_high().map_err(Co5300Error::Gpio)?;
            delay.delay_ms(200);
        }

        this.cmd(0x01, &[])?; // SWRESET
        delay.delay_ms(150);

        this.cmd(0x11, &[])?; // SLPOUT
        delay.delay_ms(180);

        this.cmd(0x3A, &[0x55])?; // RGB565
        delay.delay_ms(2);

        this.cmd(0xC4, &[0x80])?;
        this.cmd(0x13, &[])?; // NORON

        this.cmd(0x53, &[0x20])?; // BCTRL
        delay.delay_ms(1);
        this.cmd(0x63, &[0xFF])?;
        delay.delay_ms(1);
        this.cmd(0x51, &[0x00])?;
        delay.delay_ms(1);

        this.cmd(0x29, &[])?; // DISPON
        delay.delay_ms(200);
        this.cmd(0x51, &[0xFF])?;

        this.cmd(0x36, &[0x00])?; // MADCTL

        this.qspi_enter_quad()?;
        log::info!("CO5300 up: {}x{} panel, column gap {}", width, height, x_off);
        Ok(this)
    }

    #[inline]
    pub fn size(&self) -> (u16, u16) {
        (self.w, self.h)
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    // CASET/RASET in quad mode, inclusive bounds, panel offsets applied.
    fn set_window(&mut self, x0: u16, y0: u16, x1: u16, y1: u16) -> DriverResult<B, RST> {
        let x0p = x0 + self.x_off;
        let x1p = x1 + self.x_off;
        let y0p = y0 + self.y_off;
        let y1p = y1 + self.y_off;

        let ca = [(x0p >> 8) as u8, (x0p & 0xFF) as u8, (x1p >> 8) as u8, (x1p & 0xFF) as u8];
        let ra = [(y0p >> 8) as u8, (y0p & 0xFF) as u8, (y1p >> 8) as u8, (y1p & 0xFF) as u8];

        self.quad_write(WRITE_INSTR, 0x2A, &ca)?;
        self.quad_write(WRITE_INSTR, 0x2B, &ra)
    }

    // Stream pixel bytes: RAMWR for the first chunk, RAMWRC for the rest.
    fn write_pixels(&mut self, pixels: &[u16]) -> DriverResult<B, RST> {
        let bytes: &[u8] = cast_slice(pixels);
        let mut opcode = RAMWR_OPCODE;
        for chunk in bytes.chunks(DMA_CHUNK_SIZE) {
            self.quad_write(PIXEL_INSTR, opcode, chunk)?;
            opcode = RAMWRC_OPCODE;
        }
        Ok(())
    }

    // ---- Low-level helpers ----
    #[inline]
    fn quad_write(&mut self, instr: u8, cmd: u8, data: &[u8]) -> DriverResult<B, RST> {
        self.bus
            .write(Lanes::Quad, instr, Some(cmd), data)
            .map_err(Co5300Error::Spi)
    }

    #[inline(always)]
    fn cmd(&mut self, cmd: u8, data: &[u8]) -> DriverResult<B, RST> {
        self.bus
            .write(Lanes::Single, WRITE_INSTR, Some(cmd), data)
            .map_err(Co5300Error::Spi)
    }

    // Sent 1-wire; the panel expects 4-wire framing after it.
    fn qspi_enter_quad(&mut self) -> DriverResult<B, RST> {
        self.bus
            .write(Lanes::Single, QPI_ENTER, None, &[])
            .map_err(Co5300Error::Spi)
    }
}

impl<B, RST> PanelTransport for Co5300Display<B, RST>
where
    B: QspiBus,
    RST: OutputPin,
{
    type Error = Co5300Error<B::Error, RST::Error>;

    fn draw_bitmap(&mut self, x1: u16, y1: u16, x2: u16, y2: u16, pixels: &[u16]) -> Result<(), Self::Error> {
        if x1 >= x2 || y1 >= y2 || x2 > self.w || y2 > self.h {
            return Err(Co5300Error::OutOfBounds);
        }
        let expected = (x2 - x1) as usize * (y2 - y1) as usize;
        if pixels.len() != expected {
            return Err(Co5300Error::Length {
                expected,
                actual: pixels.len(),
            });
        }
        self.set_window(x1, y1, x2 - 1, y2 - 1)?;
        self.write_pixels(pixels)
    }
}
