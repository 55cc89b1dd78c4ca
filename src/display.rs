//! Display bring-up: QSPI bus on SPI2 with DMA, then the CO5300 init
//! sequence.

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use esp_hal::{
    dma::{DmaRxBuf, DmaTxBuf},
    dma_buffers,
    gpio::Output,
    spi::master::{Address, Command, Config, DataMode, Spi, SpiDmaBus},
    spi::Mode,
    time::Rate,
    Blocking,
};

use crate::co5300::{Co5300Display, Co5300Error, Lanes, QspiBus, CO5300_X_GAP};
use crate::config::DisplayConfig;
use crate::wiring::DisplayPins;

const SPI_HZ: u32 = 40_000_000;

// A tiny busy-wait delay that satisfies embedded-hal 1.0 DelayNs.
pub struct SpinDelay;

impl DelayNs for SpinDelay {
    #[inline]
    fn delay_ns(&mut self, ns: u32) {
        let mut n = ns / 50 + 1;
        while n != 0 {
            core::hint::spin_loop();
            n -= 1;
        }
    }
    #[inline]
    fn delay_us(&mut self, us: u32) {
        for _ in 0..us {
            self.delay_ns(1_000);
        }
    }
    #[inline]
    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            self.delay_us(1_000);
        }
    }
}

// DMA-backed SPI bus plus a manually driven CS.
pub struct RawSpiDev<'a> {
    pub bus: SpiDmaBus<'a, Blocking>,
    pub cs: Output<'a>,
}

impl QspiBus for RawSpiDev<'_> {
    type Error = esp_hal::spi::Error;

    fn write(&mut self, lanes: Lanes, instr: u8, cmd: Option<u8>, data: &[u8]) -> Result<(), Self::Error> {
        let mode = match lanes {
            Lanes::Single => DataMode::Single,
            Lanes::Quad => DataMode::Quad,
        };
        let address = match cmd {
            Some(c) => Address::_24Bit((c as u32) << 8, mode),
            None => Address::None,
        };
        self.cs.set_low();
        let res = self
            .bus
            .half_duplex_write(mode, Command::_8Bit(instr as u16, mode), address, 0, data);
        self.cs.set_high();
        res
    }
}

pub type DisplayType<'a> = Co5300Display<RawSpiDev<'a>, Output<'a>>;

#[derive(Debug)]
pub enum SetupError {
    Spi(esp_hal::spi::master::ConfigError),
    Dma(esp_hal::dma::DmaBufError),
    Panel(Co5300Error<esp_hal::spi::Error, Infallible>),
}

impl From<Co5300Error<esp_hal::spi::Error, Infallible>> for SetupError {
    fn from(e: Co5300Error<esp_hal::spi::Error, Infallible>) -> Self {
        Self::Panel(e)
    }
}

pub fn setup_display<'a>(
    display_pins: DisplayPins<'a>,
    cfg: &DisplayConfig,
) -> Result<DisplayType<'a>, SetupError> {
    let DisplayPins {
        spi2,
        cs,
        clk,
        sio0,
        sio1,
        sio2,
        sio3,
        rst,
        dma_ch0,
    } = display_pins;

    let spi = Spi::new(
        spi2,
        Config::default()
            .with_frequency(Rate::from_hz(SPI_HZ))
            .with_mode(Mode::_0),
    )
    .map_err(SetupError::Spi)?
    .with_sck(clk)
    .with_sio0(sio0)
    .with_sio1(sio1)
    .with_sio2(sio2)
    .with_sio3(sio3)
    .with_dma(dma_ch0);

    let (rx_buf, rx_desc, tx_buf, tx_desc) = dma_buffers!(4096, 32736);
    let rx = DmaRxBuf::new(rx_desc, rx_buf).map_err(SetupError::Dma)?;
    let tx = DmaTxBuf::new(tx_desc, tx_buf).map_err(SetupError::Dma)?;
    let bus: SpiDmaBus<'a, Blocking> = spi.with_buffers(rx, tx);

    log::info!("QSPI bus at {} MHz", SPI_HZ / 1_000_000);

    let mut delay = SpinDelay;
    let panel = Co5300Display::new(
        RawSpiDev { bus, cs },
        Some(rst),
        &mut delay,
        cfg.panel_width,
        cfg.panel_height,
        CO5300_X_GAP,
    )?;
    Ok(panel)
}
