//! Board pin mapping, Waveshare ESP32-S3 Touch AMOLED 1.64".
//!
//! - LCD CS   => GPIO9
//! - LCD SCK  => GPIO10
//! - LCD SIO0..SIO3 => GPIO11..GPIO14
//! - LCD RST  => GPIO21
//!
//! TIMG0 drives the UI tick.

use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::peripherals::{
    Peripherals, DMA_CH0, GPIO10, GPIO11, GPIO12, GPIO13, GPIO14, SPI2, TIMG0,
};

pub struct DisplayPins<'a> {
    pub spi2: SPI2<'a>,
    pub cs: Output<'a>,
    pub clk: GPIO10<'a>,
    pub sio0: GPIO11<'a>,
    pub sio1: GPIO12<'a>,
    pub sio2: GPIO13<'a>,
    pub sio3: GPIO14<'a>,
    pub rst: Output<'a>,
    pub dma_ch0: DMA_CH0<'a>,
}

pub struct BoardPins<'a> {
    pub display_pins: DisplayPins<'a>,
    pub timg0: TIMG0<'a>,
}

pub fn init_board_pins<'a>(p: Peripherals) -> BoardPins<'a> {
    // CS idles high, RST released; the driver runs the reset pulse itself
    let cs = Output::new(p.GPIO9, Level::High, OutputConfig::default());
    let rst = Output::new(p.GPIO21, Level::High, OutputConfig::default());

    BoardPins {
        display_pins: DisplayPins {
            spi2: p.SPI2,
            cs,
            clk: p.GPIO10,
            sio0: p.GPIO11,
            sio1: p.GPIO12,
            sio2: p.GPIO13,
            sio3: p.GPIO14,
            rst,
            dma_ch0: p.DMA_CH0,
        },
        timg0: p.TIMG0,
    }
}
