//! Device advertiser forwarding requests to the BLE task
//!
//! The BLE host stack lives in its own task. [`ChannelAdvertiser`] sends
//! each operation over [`ADV_REQUESTS`] and waits for the task's answer on
//! [`ADV_RESPONSES`]. Only one request is in flight at a time.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use super::traits::{AdvError, AdvParams, Advertiser};

/// Operations handled by the BLE task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvRequest {
    Init(AdvParams),
    Start,
    Stop,
    UpdateInterval { min_ms: u16, max_ms: u16 },
}

/// Requests to the BLE task
pub static ADV_REQUESTS: Channel<CriticalSectionRawMutex, AdvRequest, 1> = Channel::new();

/// Result of the last request
pub static ADV_RESPONSES: Signal<CriticalSectionRawMutex, Result<(), AdvError>> = Signal::new();

/// Advertiser backed by the BLE task
pub struct ChannelAdvertiser {
    initialised: bool,
    running: bool,
}

impl ChannelAdvertiser {
    pub const fn new() -> Self {
        Self {
            initialised: false,
            running: false,
        }
    }

    async fn request(&mut self, request: AdvRequest) -> Result<(), AdvError> {
        ADV_RESPONSES.reset();
        ADV_REQUESTS.send(request).await;
        ADV_RESPONSES.wait().await
    }
}

impl Default for ChannelAdvertiser {
    fn default() -> Self {
        Self::new()
    }
}

impl Advertiser for ChannelAdvertiser {
    async fn init(&mut self, params: &AdvParams) -> Result<(), AdvError> {
        self.request(AdvRequest::Init(*params)).await?;
        // Rebuilding the set leaves it stopped
        self.initialised = true;
        self.running = false;
        Ok(())
    }

    async fn start(&mut self) -> Result<(), AdvError> {
        self.request(AdvRequest::Start).await?;
        self.running = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), AdvError> {
        self.request(AdvRequest::Stop).await?;
        self.running = false;
        Ok(())
    }

    async fn update_interval(&mut self, min_ms: u16, max_ms: u16) -> Result<(), AdvError> {
        self.request(AdvRequest::UpdateInterval { min_ms, max_ms }).await?;
        // The BLE task restarts an initialised set
        if self.initialised {
            self.running = true;
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }
}
