//! Beacon bring-up at boot

use log::{info, warn};

use super::address::DeviceAddress;
use super::traits::{AdvError, AdvParams, Advertiser};
use crate::config::beacon::{ADV_INTERVALS_MS, DEFAULT_NAMESPACE};
use crate::storage::SettingsStore;

/// Advertising parameters from persisted settings
///
/// Unset values fall back to the default namespace and an instance id
/// derived from the device address.
pub fn boot_params<S: SettingsStore>(settings: &S, address: &DeviceAddress) -> AdvParams {
    AdvParams {
        interval_ms: ADV_INTERVALS_MS[0],
        namespace: settings.namespace().unwrap_or(DEFAULT_NAMESPACE),
        instance_id: settings.instance_id().unwrap_or_else(|| address.instance_id()),
        tx_power: settings.tx_power(),
    }
}

/// Configure the advertiser from persisted settings and start it
pub async fn start_beacon<S: SettingsStore, A: Advertiser>(
    settings: &S,
    address: &DeviceAddress,
    advertiser: &mut A,
) -> Result<AdvParams, AdvError> {
    let params = boot_params(settings, address);
    info!(
        "Beacon: {} dBm every {} ms, instance {:02X?}",
        params.tx_power, params.interval_ms, params.instance_id
    );

    advertiser.init(&params).await.inspect_err(|error| {
        warn!("Advertiser init failed: {:?}", error);
    })?;
    advertiser.start().await.inspect_err(|error| {
        warn!("Advertising start failed: {:?}", error);
    })?;

    Ok(params)
}
