//! BLE task for beacon advertising
//!
//! Owns the TrouBLE host stack and serves [`AdvRequest`]s from the
//! dispatcher. Advertising is non-connectable and carries a single
//! Eddystone-UID frame.

use embassy_futures::select::{select, Either};
use embassy_time::Duration;
use log::{info, warn};
use trouble_host::prelude::*;

use crate::beacon::controller::{AdvRequest, ADV_REQUESTS, ADV_RESPONSES};
use crate::beacon::{AddressKind, AdvError, AdvParams, DeviceAddress, UidFrame};

/// Number of maximum concurrent connections
const CONNECTIONS_MAX: usize = 1;
/// Number of L2CAP channels
const L2CAP_CHANNELS_MAX: usize = 1;

/// Nearest supported transmit power not above `dbm`
fn tx_power_level(dbm: i8) -> TxPower {
    match dbm {
        i8::MIN..=-21 => TxPower::Minus40dBm,
        -20 => TxPower::Minus20dBm,
        -19..=-16 => TxPower::Minus16dBm,
        -15..=-12 => TxPower::Minus12dBm,
        -11..=-8 => TxPower::Minus8dBm,
        -7..=-4 => TxPower::Minus4dBm,
        -3..=1 => TxPower::ZerodBm,
        2 => TxPower::Plus2dBm,
        3 => TxPower::Plus3dBm,
        4 => TxPower::Plus4dBm,
        5 => TxPower::Plus5dBm,
        6 => TxPower::Plus6dBm,
        7 => TxPower::Plus7dBm,
        _ => TxPower::Plus8dBm,
    }
}

/// Main BLE task that manages the Bluetooth stack and advertising
pub async fn ble_task<C: Controller>(controller: C, address: DeviceAddress) {
    info!("BLE: Starting with address {:02X?}", address.display_bytes());

    let mut resources: HostResources<DefaultPacketPool, CONNECTIONS_MAX, L2CAP_CHANNELS_MAX> =
        HostResources::new();

    // A public address is the controller's own, only random ones are set
    let stack = match address.kind() {
        AddressKind::Random => {
            trouble_host::new(controller, &mut resources).set_random_address(Address::random(address.bytes()))
        }
        AddressKind::Public => trouble_host::new(controller, &mut resources),
    };

    let Host {
        mut peripheral,
        mut runner,
        ..
    } = stack.build();

    let runner_task = runner.run();

    let advertising_task = async {
        let mut params: Option<AdvParams> = None;
        let mut interval = (0u16, 0u16);
        let mut active = None;

        loop {
            let request = ADV_REQUESTS.receive().await;

            let result = match request {
                AdvRequest::Init(new_params) => {
                    active = None;
                    interval = (new_params.interval_ms, new_params.interval_ms);
                    params = Some(new_params);
                    Ok(())
                }
                AdvRequest::Start => match params {
                    Some(ref current) => {
                        active = None;
                        advertise(&mut peripheral, current, interval).await.map(|adv| {
                            active = Some(adv);
                        })
                    }
                    None => Err(AdvError::NotInitialised),
                },
                AdvRequest::Stop => {
                    active = None;
                    Ok(())
                }
                AdvRequest::UpdateInterval { min_ms, max_ms } => {
                    interval = (min_ms, max_ms);
                    // Stop, reconfigure and start again, even if it was stopped
                    match params {
                        Some(ref current) => {
                            active = None;
                            advertise(&mut peripheral, current, interval).await.map(|adv| {
                                active = Some(adv);
                            })
                        }
                        None => Ok(()),
                    }
                }
            };

            if let Err(error) = result {
                warn!("BLE: {:?} failed: {:?}", request, error);
            }
            ADV_RESPONSES.signal(result);
        }
    };

    match select(runner_task, advertising_task).await {
        Either::First(_) => warn!("BLE: Runner stopped"),
        Either::Second(()) => {}
    }
}

/// Start non-connectable advertising of the UID frame
///
/// Advertising continues until the returned handle is dropped.
async fn advertise<'d, C: Controller>(
    peripheral: &mut Peripheral<'d, C, DefaultPacketPool>,
    params: &AdvParams,
    (min_ms, max_ms): (u16, u16),
) -> Result<Advertiser<'d, C, DefaultPacketPool>, AdvError> {
    let frame = UidFrame::new(params.tx_power, params.namespace, params.instance_id);
    let adv_data = frame.adv_data();

    let adv_params = AdvertisementParameters {
        interval_min: Duration::from_millis(min_ms.into()),
        interval_max: Duration::from_millis(max_ms.into()),
        tx_power: tx_power_level(params.tx_power),
        ..Default::default()
    };

    info!("BLE: Advertising every {}-{} ms", min_ms, max_ms);
    peripheral
        .advertise(
            &adv_params,
            Advertisement::NonconnectableNonscannableUndirected { adv_data: &adv_data },
        )
        .await
        .map_err(|_| AdvError::Controller)
}
