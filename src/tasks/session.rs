//! AT session tasks
//!
//! The worker task starts the session and then services deferred work. The
//! mode timer arms once the session is up and fires the mode guard.

use embassy_time::{Delay, Duration, Timer};
use log::{info, warn};

use super::DeviceHost;
use crate::beacon::Advertiser;
use crate::config::timing::MODE_TIMEOUT_MS;
use crate::dispatcher::CommandDispatcher;
use crate::sensors::SelfTestChecks;
use crate::storage::SettingsStore;
use crate::system::SystemControl;

/// Task that runs the AT session worker
pub async fn at_worker_task<S, A, P, R>(host: &'static DeviceHost, mut dispatcher: CommandDispatcher<S, A, P, R>)
where
    S: SettingsStore,
    A: Advertiser,
    P: SelfTestChecks,
    R: SystemControl,
{
    let mut delay = Delay;

    if let Err(error) = host.start(&mut delay).await {
        warn!("AT session failed to start: {:?}", error);
        return;
    }
    info!("AT session started");

    host.run(&mut dispatcher, &mut delay).await;
}

/// Task that fires the AT mode timeout
pub async fn mode_timer_task(host: &'static DeviceHost) {
    host.guard().wait_armed().await;
    Timer::after(Duration::from_millis(MODE_TIMEOUT_MS)).await;

    if host.on_mode_timeout() {
        info!("AT mode timeout");
    }
}
