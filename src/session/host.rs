//! AT command session over an asynchronous UART
//!
//! The session is split across two contexts:
//!
//! - **Callback context** ([`AtHost::on_uart_event`], [`AtHost::on_mode_timeout`]):
//!   assembles the line, echoes bytes, hands receive buffers to the driver and
//!   raises deferred work. Never blocks.
//! - **Worker context** ([`AtHost::run`]): executes the line, writes the
//!   response, re-arms reception and shuts the UART down when the mode guard
//!   fires.
//!
//! Receive-side state lives behind a blocking mutex that is only locked for
//! short sections and never across an `.await`.

use core::cell::RefCell;

use embassy_futures::select::{select3, Either3};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embedded_hal_async::delay::DelayNs;
use heapless::Vec;
use log::{debug, error, info, warn};

use super::error::{AtHostError, SessionState};
use super::mode_guard::{GuardState, ModeGuard};
use super::trigger::DispatchTrigger;
use crate::at::ResponseSink;
use crate::beacon::Advertiser;
use crate::config::at::MAX_CMD_LEN;
use crate::config::{timing, uart};
use crate::dispatcher::CommandDispatcher;
use crate::protocol::{BufferError, LineEvent, LineReceiver, RxBufferPair};
use crate::sensors::SelfTestChecks;
use crate::storage::SettingsStore;
use crate::system::SystemControl;
use crate::uart::{StopReason, UartConfig, UartError, UartEvent, UartTransport};

/// State touched from the callback context
struct RxState<U> {
    uart: U,
    line: LineReceiver,
    buffers: RxBufferPair,
    /// Reason of the last stop, cleared when the restart is raised
    stop_reason: Option<StopReason>,
    state: SessionState,
}

/// Why a re-arm attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RearmError {
    /// First buffer not released by the driver yet
    Buffer(BufferError),
    Uart(UartError),
}

/// The AT command session
pub struct AtHost<M: RawMutex, U: UartTransport> {
    rx: Mutex<M, RefCell<RxState<U>>>,
    dispatch: DispatchTrigger<M>,
    restart: DispatchTrigger<M>,
    guard: ModeGuard<M>,
}

impl<M: RawMutex, U: UartTransport> AtHost<M, U> {
    /// Create an idle session over `uart`
    pub const fn new(uart: U) -> Self {
        Self {
            rx: Mutex::new(RefCell::new(RxState {
                uart,
                line: LineReceiver::new(),
                buffers: RxBufferPair::new(),
                stop_reason: None,
                state: SessionState::Idle,
            })),
            dispatch: DispatchTrigger::new(),
            restart: DispatchTrigger::new(),
            guard: ModeGuard::new(),
        }
    }

    /// Bring the UART up and start accepting commands
    ///
    /// Waits for the line to become valid, enables event delivery, powers
    /// the UART, enables reception into the first buffer, configures the
    /// line and arms the mode guard.
    pub async fn start<D: DelayNs>(&self, delay: &mut D) -> Result<(), AtHostError> {
        let mut waited_ms = 0;
        while let Err(error) = self.with_transport(|uart| uart.err_check()) {
            if waited_ms >= timing::UART_READY_TIMEOUT_MS {
                error!("UART check failed: {:?}, initialisation timed out", error);
                return Err(AtHostError::DeviceNotReady);
            }
            delay.delay_ms(timing::UART_READY_POLL_MS).await;
            waited_ms += timing::UART_READY_POLL_MS;
        }

        self.lock(|rx| -> Result<(), AtHostError> {
            rx.uart.enable_events().map_err(|error| {
                error!("Cannot set UART callback: {:?}", error);
                AtHostError::CallbackFailed(error)
            })?;

            if let Err(error) = rx.uart.resume() {
                warn!("UART resume failed: {:?}", error);
            }

            let buffer = rx.buffers.take_for_enable().map_err(|error| {
                error!("No buffer for RX: {:?}", error);
                AtHostError::RxEnable(UartError::InvalidBuffer)
            })?;
            if let Err((error, buffer)) = rx.uart.rx_enable(buffer, uart::RX_TIMEOUT_US) {
                rx.buffers.give_back(buffer);
                error!("Cannot enable RX: {:?}", error);
                return Err(AtHostError::RxEnable(error));
            }

            rx.line.reset();

            rx.uart.configure(&UartConfig::default()).map_err(|error| {
                error!("UART configure failed: {:?}", error);
                AtHostError::Configure(error)
            })?;

            rx.state = SessionState::Armed;
            Ok(())
        })?;

        self.guard.arm();
        info!("AT command mode started");
        Ok(())
    }

    /// Handle a driver event, callback context
    pub fn on_uart_event(&self, event: UartEvent<'_>) {
        self.lock(|rx| match event {
            UartEvent::TxDone | UartEvent::TxAborted => {}
            UartEvent::RxReady(data) => self.receive(rx, data),
            UartEvent::RxBufRequest => match rx.buffers.take_next() {
                Ok(buffer) => {
                    if let Err((error, buffer)) = rx.uart.rx_buf_rsp(buffer) {
                        warn!("UART RX buf rsp failed: {:?}", error);
                        rx.buffers.give_back(buffer);
                    }
                }
                Err(error) => warn!("No RX buffer for driver: {:?}", error),
            },
            UartEvent::RxBufReleased(buffer) => rx.buffers.give_back(buffer),
            UartEvent::RxStopped(reason) => {
                warn!("UART RX stopped: {:?}", reason);
                rx.stop_reason = Some(reason);
            }
            UartEvent::RxDisabled => {
                if rx.stop_reason.take().is_some() {
                    rx.state = SessionState::ErrorRecovering;
                    self.restart.raise();
                }
            }
        })
    }

    /// Mode guard countdown elapsed, callback context
    ///
    /// Returns true if the guard fired.
    pub fn on_mode_timeout(&self) -> bool {
        self.guard.expire()
    }

    /// Worker loop, never returns
    pub async fn run<S, A, P, R, D>(&self, dispatcher: &mut CommandDispatcher<S, A, P, R>, delay: &mut D)
    where
        S: SettingsStore,
        A: Advertiser,
        P: SelfTestChecks,
        R: SystemControl,
        D: DelayNs,
    {
        loop {
            match select3(self.dispatch.wait(), self.restart.wait(), self.guard.wait_fired()).await {
                Either3::First(()) => self.process_command(dispatcher, delay).await,
                Either3::Second(()) => self.restart_rx(delay).await,
                Either3::Third(()) => self.disable_at_mode(delay).await,
            }
        }
    }

    /// Run whatever work is pending without waiting
    ///
    /// Returns the number of work items executed.
    pub async fn service_pending<S, A, P, R, D>(
        &self,
        dispatcher: &mut CommandDispatcher<S, A, P, R>,
        delay: &mut D,
    ) -> usize
    where
        S: SettingsStore,
        A: Advertiser,
        P: SelfTestChecks,
        R: SystemControl,
        D: DelayNs,
    {
        let mut done = 0;
        if self.dispatch.try_take() {
            self.process_command(dispatcher, delay).await;
            done += 1;
        }
        if self.restart.try_take() {
            self.restart_rx(delay).await;
            done += 1;
        }
        if self.guard.try_take_fired() {
            self.disable_at_mode(delay).await;
            done += 1;
        }
        done
    }

    /// Execute the completed line, then re-arm reception
    pub async fn process_command<S, A, P, R, D>(
        &self,
        dispatcher: &mut CommandDispatcher<S, A, P, R>,
        delay: &mut D,
    ) where
        S: SettingsStore,
        A: Advertiser,
        P: SelfTestChecks,
        R: SystemControl,
        D: DelayNs,
    {
        let line = self.lock(|rx| {
            if rx.state == SessionState::Disabled {
                return None;
            }
            rx.state = SessionState::Dispatching;
            Some(Vec::<u8, MAX_CMD_LEN>::from_slice(rx.line.line()).unwrap_or_default())
        });

        let Some(line) = line else {
            debug!("AT mode disabled, dropping line");
            return;
        };

        let mut sink = TxSink { host: self };
        if dispatcher.dispatch(&line, &mut sink, delay).await && self.guard.cancel() {
            info!("Command recognized, AT mode kept open");
        }

        self.restart_rx(delay).await;
    }

    /// Reset the line and re-enable reception, retrying until it succeeds
    pub async fn restart_rx<D: DelayNs>(&self, delay: &mut D) {
        loop {
            let result = self.lock(|rx| -> Result<bool, RearmError> {
                if rx.state == SessionState::Disabled {
                    return Ok(false);
                }
                rx.line.reset();

                let buffer = rx.buffers.take_for_enable().map_err(RearmError::Buffer)?;
                match rx.uart.rx_enable(buffer, uart::RX_TIMEOUT_US) {
                    Ok(()) => {
                        rx.state = SessionState::Armed;
                        Ok(true)
                    }
                    Err((error, buffer)) => {
                        rx.buffers.give_back(buffer);
                        Err(RearmError::Uart(error))
                    }
                }
            });

            match result {
                Ok(true) => return,
                Ok(false) => {
                    debug!("AT mode disabled, not re-arming RX");
                    return;
                }
                Err(error) => {
                    error!("UART RX failed: {:?}", error);
                    delay.delay_ms(timing::RX_RETRY_BACKOFF_MS).await;
                }
            }
        }
    }

    /// Leave command mode: stop reception and power the UART down
    pub async fn disable_at_mode<D: DelayNs>(&self, delay: &mut D) {
        info!("No command received, disabling AT mode");

        self.lock(|rx| {
            rx.state = SessionState::Disabled;
            if let Err(error) = rx.uart.rx_disable() {
                warn!("Failed to stop RX: {:?}, disabling anyway", error);
            }
        });

        delay.delay_ms(timing::UART_SETTLE_MS).await;

        self.lock(|rx| {
            if let Err(error) = rx.uart.suspend() {
                warn!("UART suspend failed: {:?}", error);
            }
        });
    }

    pub fn state(&self) -> SessionState {
        self.lock(|rx| rx.state)
    }

    pub fn guard_state(&self) -> GuardState {
        self.guard.state()
    }

    /// The mode guard, for the countdown timer
    pub fn guard(&self) -> &ModeGuard<M> {
        &self.guard
    }

    /// Returns true if a completed line waits for the worker
    pub fn is_dispatch_pending(&self) -> bool {
        self.dispatch.is_pending()
    }

    /// Returns true if a reception restart waits for the worker
    pub fn is_restart_pending(&self) -> bool {
        self.restart.is_pending()
    }

    /// Run `f` with exclusive access to the transport
    pub fn with_transport<T>(&self, f: impl FnOnce(&mut U) -> T) -> T {
        self.lock(|rx| f(&mut rx.uart))
    }

    fn lock<T>(&self, f: impl FnOnce(&mut RxState<U>) -> T) -> T {
        self.rx.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Feed received bytes into the line, callback context
    fn receive(&self, rx: &mut RxState<U>, data: &[u8]) {
        for &byte in data {
            let event = rx.line.push(byte);
            if let Some(echo) = event.echo() {
                rx.uart.poll_out(echo);
            }
            if event.completes_line() {
                self.complete_line(rx);
            }
            if event == LineEvent::Ignored {
                break;
            }
        }
    }

    fn complete_line(&self, rx: &mut RxState<U>) {
        if let Err(error) = rx.uart.rx_disable() {
            warn!("UART RX disable failed: {:?}", error);
        }
        rx.state = SessionState::LineReady;
        self.dispatch.raise();
    }
}

/// Writes response fragments to the UART byte by byte
struct TxSink<'a, M: RawMutex, U: UartTransport> {
    host: &'a AtHost<M, U>,
}

impl<M: RawMutex, U: UartTransport> ResponseSink for TxSink<'_, M, U> {
    fn send(&mut self, fragment: &str) {
        for byte in fragment.bytes() {
            self.host.with_transport(|uart| uart.poll_out(byte));
        }
    }
}
