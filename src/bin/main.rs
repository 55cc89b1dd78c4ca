//! AMOLED overlay firmware
//! ========================================
//! source ~/export-esp.sh
//! cargo run --release --features esp32s3-disp164Oled
//! ========================================
//!
//! Landscape overlay on the 1.64" CO5300: beach background, one sliding
//! temperature label, partial redraws flushed through the rotated path.

//% CHIPS: esp32s3
//% FEATURES: esp-hal/unstable

#![no_std]
#![no_main]

// Application description placed in a special section of the binary, checked
// by the bootloader.
esp_bootloader_esp_idf::esp_app_desc!();

use core::cell::RefCell;

use critical_section::Mutex;
use esp_backtrace as _;
use esp_hal::{
    handler, main, ram,
    time::Duration,
    timer::{timg::TimerGroup, PeriodicTimer},
    Blocking, Config,
};

use amoled_overlay::{
    display::{setup_display, SpinDelay},
    wiring::{init_board_pins, BoardPins},
    DisplayConfig, FlushPipeline, FramePacer, FramePool, OverlayUi, TickCounter,
};

extern crate alloc;

const CFG: DisplayConfig = DisplayConfig::CO5300_LANDSCAPE;
const TICK_MS: u32 = CFG.tick_period_ms;
const LABEL: &str = "20.4 °C";

static TICKS: TickCounter = TickCounter::new();
static TICK_TIMER: Mutex<RefCell<Option<PeriodicTimer<'static, Blocking>>>> =
    Mutex::new(RefCell::new(None));

// Tick interrupt handler
#[handler]
#[ram]
fn tick_handler() {
    critical_section::with(|cs| {
        if let Some(timer) = TICK_TIMER.borrow_ref_mut(cs).as_mut() {
            timer.clear_interrupt();
        }
    });
    TICKS.inc(TICK_MS);
}

#[main]
fn main() -> ! {
    let peripherals = esp_hal::init(Config::default());

    // Internal DRAM only: every heap allocation is DMA-capable.
    esp_alloc::heap_allocator!(size: 200 * 1024);

    esp_println::logger::init_logger(log::LevelFilter::Info);

    let cfg = CFG;
    if let Err(e) = cfg.validate() {
        panic!("invalid display config: {e}");
    }

    let BoardPins { display_pins, timg0 } = init_board_pins(peripherals);

    // -------------------- Tick source --------------------
    let tg0 = TimerGroup::new(timg0);
    let mut timer = PeriodicTimer::new(tg0.timer0);
    timer.set_interrupt_handler(tick_handler);
    timer.listen();
    if let Err(e) = timer.start(Duration::from_millis(TICK_MS as u64)) {
        panic!("tick timer: {e:?}");
    }
    critical_section::with(|cs| TICK_TIMER.borrow_ref_mut(cs).replace(timer));

    // -------------------- Panel + buffers --------------------
    let panel = match setup_display(display_pins, &cfg) {
        Ok(p) => p,
        Err(e) => panic!("display setup failed: {e:?}"),
    };

    let mut pool = match FramePool::new(&cfg) {
        Ok(p) => p,
        Err(e) => {
            log::error!("draw buffers: {e:?}");
            panic!("out of DMA memory");
        }
    };

    let mut pipeline = match FlushPipeline::new(panel, cfg) {
        Ok(p) => p,
        Err(e) => panic!("flush pipeline: {e}"),
    };

    let mut ui = OverlayUi::new(&cfg, LABEL);
    let mut pacer = FramePacer::new(&TICKS, &cfg);
    let mut delay = SpinDelay;

    log::info!("overlay running, {} ms frames", cfg.frame_period_ms);

    // Runs until a fatal flush error
    let res = pacer.run(&mut ui, &mut pool, &mut pipeline, &mut delay, |_| true);
    match res {
        Ok(stats) => panic!("pacer stopped: {stats:?}"),
        Err(e) => {
            log::error!("flush failed: {e}");
            panic!("display pipeline halted");
        }
    }
}
