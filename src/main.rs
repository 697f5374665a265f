#![no_std]
#![no_main]

extern crate alloc;

// Required for ESP-IDF bootloader compatibility
// Use explicit parameters to ensure correct efuse block revision values
esp_bootloader_esp_idf::esp_app_desc!(
    env!("CARGO_PKG_VERSION"),  // version
    env!("CARGO_PKG_NAME"),     // project_name
    "00:00:00",                 // build_time
    "2025-01-01",               // build_date
    "0.0.0",                    // idf_ver (not using IDF)
    0x10000,                    // mmu_page_size (64KB)
    0,                          // min_efuse_blk_rev_full (accept all)
    u16::MAX                    // max_efuse_blk_rev_full (accept all)
);

use embassy_executor::Spawner;
use esp_backtrace as _;
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::uart::{Config as UartHalConfig, Uart, UartRx};
use esp_hal::Async;
use esp_storage::FlashStorage;
use log::{info, warn, LevelFilter};
use static_cell::StaticCell;

use beacon_at_firmware::beacon::controller::ChannelAdvertiser;
use beacon_at_firmware::beacon::{start_beacon, DeviceAddress};
use beacon_at_firmware::config::uart::BAUD_RATE;
use beacon_at_firmware::debug;
use beacon_at_firmware::dispatcher::CommandDispatcher;
use beacon_at_firmware::sensors::I2cChecks;
use beacon_at_firmware::session::AtHost;
use beacon_at_firmware::storage::{partition, NorFlashRegion, NvSettings};
use beacon_at_firmware::system::EspSystem;
use beacon_at_firmware::tasks::{self, DeviceHost};
use beacon_at_firmware::uart::esp::EspUart;

/// Static executor for embassy
static EXECUTOR: StaticCell<esp_rtos::embassy::Executor> = StaticCell::new();

/// Static cell for esp-radio controller (needed for 'static lifetime)
static RADIO_CONTROLLER: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();

/// The AT session, shared by the pump, worker and timer tasks
static HOST: StaticCell<DeviceHost> = StaticCell::new();

/// Type alias for the BLE controller
type BleController = trouble_host::prelude::ExternalController<
    esp_radio::ble::controller::BleConnector<'static>,
    10,
>;

type Settings = NvSettings<NorFlashRegion<FlashStorage<'static>>>;
type Checks = I2cChecks<I2c<'static, Async>>;
type Dispatcher = CommandDispatcher<Settings, ChannelAdvertiser, Checks, EspSystem>;

#[esp_hal::main]
fn main() -> ! {
    // Initialise heap allocator for BLE support (64KB - BLE requires significant heap)
    esp_alloc::heap_allocator!(size: 64 * 1024);

    debug::init(LevelFilter::Info);

    let peripherals = esp_hal::init(esp_hal::Config::default());

    // Initialise the RTOS scheduler with timer - MUST be done before any async operations
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // AT command UART on the module's UART0 pins
    let uart = Uart::new(peripherals.UART0, UartHalConfig::default().with_baudrate(BAUD_RATE))
        .expect("Failed to initialise UART")
        .with_rx(peripherals.GPIO44)
        .with_tx(peripherals.GPIO43)
        .into_async();
    let (uart_rx, uart_tx) = uart.split();
    let host: &'static DeviceHost = HOST.init(AtHost::new(EspUart::new(uart_tx)));

    // Sensor bus for the self test
    let i2c = I2c::new(peripherals.I2C0, I2cConfig::default().with_frequency(Rate::from_khz(100)))
        .expect("Failed to initialise I2C")
        .with_sda(peripherals.GPIO1)
        .with_scl(peripherals.GPIO2)
        .into_async();

    // Settings log at the start of the NVS partition
    let mut flash = FlashStorage::new(peripherals.FLASH);
    let (base, len) = partition::settings_window(&mut flash).expect("No settings partition");
    let region = NorFlashRegion::new(flash, base, len).expect("Settings partition misaligned");
    let settings = NvSettings::mount(region).expect("Failed to mount settings");

    let address = DeviceAddress::from_mac(esp_hal::efuse::Efuse::read_base_mac_address());

    // Initialise esp-radio for BLE support (must be after esp_rtos::start)
    let radio_controller = RADIO_CONTROLLER.init(
        esp_radio::init().expect("Failed to initialize esp-radio")
    );

    // Create BLE connector (ownership is passed to ExternalController)
    let ble_connector = esp_radio::ble::controller::BleConnector::new(
        radio_controller,
        peripherals.BT,
        esp_radio::ble::Config::default(),
    ).expect("Failed to initialize BLE connector");

    // Wrap in ExternalController for trouble-host compatibility
    let controller: BleController = trouble_host::prelude::ExternalController::new(ble_connector);

    // Create and run the embassy executor
    let executor = EXECUTOR.init(esp_rtos::embassy::Executor::new());
    executor.run(|spawner| {
        spawner.must_spawn(async_main(spawner, host, uart_rx, I2cChecks::new(i2c), settings, controller, address));
    })
}

#[embassy_executor::task]
async fn async_main(
    spawner: Spawner,
    host: &'static DeviceHost,
    uart_rx: UartRx<'static, Async>,
    checks: Checks,
    settings: Settings,
    ble_controller: BleController,
    address: DeviceAddress,
) {
    spawner.must_spawn(debug_writer_task());
    spawner.must_spawn(ble_host_task(ble_controller, address));

    // The advertiser talks to the BLE task, which is now running
    let mut advertiser = ChannelAdvertiser::new();
    let adv_interval = match start_beacon(&settings, &address, &mut advertiser).await {
        Ok(params) => params.interval_ms,
        Err(error) => {
            warn!("Beacon not started: {:?}", error);
            beacon_at_firmware::config::beacon::ADV_INTERVALS_MS[0]
        }
    };

    let dispatcher = CommandDispatcher::new(settings, advertiser, checks, EspSystem, address)
        .with_adv_interval(adv_interval);

    spawner.must_spawn(uart_pump_task(uart_rx, host));
    spawner.must_spawn(mode_timer_task(host));
    spawner.must_spawn(at_worker_task(host, dispatcher));
    info!("Tasks started");
}

/// Task that prints queued log output
#[embassy_executor::task]
async fn debug_writer_task() {
    debug::debug_writer_task().await;
}

/// Task that manages BLE advertising
#[embassy_executor::task]
async fn ble_host_task(controller: BleController, address: DeviceAddress) {
    tasks::ble_task(controller, address).await;
}

/// Task that feeds received UART bytes to the session
#[embassy_executor::task]
async fn uart_pump_task(uart_rx: UartRx<'static, Async>, host: &'static DeviceHost) {
    tasks::uart_pump_task(uart_rx, host).await;
}

/// Task that fires the AT mode timeout
#[embassy_executor::task]
async fn mode_timer_task(host: &'static DeviceHost) {
    tasks::mode_timer_task(host).await;
}

/// Task that executes AT commands
#[embassy_executor::task]
async fn at_worker_task(host: &'static DeviceHost, dispatcher: Dispatcher) {
    tasks::at_worker_task(host, dispatcher).await;
}
