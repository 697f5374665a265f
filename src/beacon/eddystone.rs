//! Eddystone-UID advertising payload
//!
//! Advertising data layout:
//! ```text
//! [len][0x01 flags][0x04]                       BR/EDR not supported
//! [len][0x03 16-bit UUIDs][0xAA 0xFE]           Eddystone service
//! [len][0x16 service data][0xAA 0xFE][frame]    Eddystone-UID frame
//! ```
//!
//! UID frame: `[0x00 type][tx power][namespace 10][instance 6][0x00 0x00]`

use crate::at::{InstanceId, Namespace};
use crate::config::beacon::{INSTANCE_ID_LEN, NAMESPACE_LEN};

/// Eddystone 16-bit service UUID, little endian
pub const EDDYSTONE_UUID: [u8; 2] = [0xAA, 0xFE];

/// Eddystone-UID frame type
pub const FRAME_TYPE_UID: u8 = 0x00;

/// AD type: flags
const AD_FLAGS: u8 = 0x01;
/// AD type: complete list of 16-bit service UUIDs
const AD_UUID16_ALL: u8 = 0x03;
/// AD type: 16-bit UUID service data
const AD_SERVICE_DATA16: u8 = 0x16;
/// Flag: BR/EDR not supported
const FLAG_NO_BREDR: u8 = 0x04;

/// Length of the UID frame (type, tx power, namespace, instance, reserved)
pub const UID_FRAME_LEN: usize = 2 + NAMESPACE_LEN + INSTANCE_ID_LEN + 2;

/// Length of the service data (UUID followed by the UID frame)
pub const SERVICE_DATA_LEN: usize = EDDYSTONE_UUID.len() + UID_FRAME_LEN;

/// Length of the complete advertising data
pub const ADV_DATA_LEN: usize = 3 + 4 + 2 + SERVICE_DATA_LEN;

/// Contents of an Eddystone-UID frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UidFrame {
    /// Calibrated tx power in dBm
    pub tx_power: i8,
    pub namespace: Namespace,
    pub instance_id: InstanceId,
}

impl UidFrame {
    pub fn new(tx_power: i8, namespace: Namespace, instance_id: InstanceId) -> Self {
        Self {
            tx_power,
            namespace,
            instance_id,
        }
    }

    /// Service data: Eddystone UUID followed by the UID frame
    pub fn service_data(&self) -> [u8; SERVICE_DATA_LEN] {
        let mut data = [0u8; SERVICE_DATA_LEN];
        data[..2].copy_from_slice(&EDDYSTONE_UUID);
        data[2] = FRAME_TYPE_UID;
        data[3] = self.tx_power as u8;
        data[4..4 + NAMESPACE_LEN].copy_from_slice(&self.namespace);
        let instance_start = 4 + NAMESPACE_LEN;
        data[instance_start..instance_start + INSTANCE_ID_LEN].copy_from_slice(&self.instance_id);
        // Two trailing reserved bytes stay zero
        data
    }

    /// Complete advertising data as length-type-value structures
    pub fn adv_data(&self) -> [u8; ADV_DATA_LEN] {
        let mut data = [0u8; ADV_DATA_LEN];
        data[..3].copy_from_slice(&[2, AD_FLAGS, FLAG_NO_BREDR]);
        data[3..7].copy_from_slice(&[3, AD_UUID16_ALL, EDDYSTONE_UUID[0], EDDYSTONE_UUID[1]]);
        data[7] = (SERVICE_DATA_LEN + 1) as u8;
        data[8] = AD_SERVICE_DATA16;
        data[9..].copy_from_slice(&self.service_data());
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> UidFrame {
        UidFrame::new(-4, *b"NINA-B4TAG", [1, 2, 3, 4, 5, 6])
    }

    #[test]
    fn test_service_data_layout() {
        let data = frame().service_data();

        assert_eq!(data.len(), 22);
        assert_eq!(&data[..2], &[0xAA, 0xFE]);
        assert_eq!(data[2], FRAME_TYPE_UID);
        assert_eq!(data[3], 0xFC); // -4 dBm
        assert_eq!(&data[4..14], b"NINA-B4TAG");
        assert_eq!(&data[14..20], &[1, 2, 3, 4, 5, 6]);
        assert_eq!(&data[20..], &[0, 0]);
    }

    #[test]
    fn test_adv_data_structures() {
        let data = frame().adv_data();

        // Flags
        assert_eq!(&data[..3], &[0x02, 0x01, 0x04]);
        // Service UUID list
        assert_eq!(&data[3..7], &[0x03, 0x03, 0xAA, 0xFE]);
        // Service data, length covers the type byte
        assert_eq!(data[7] as usize, SERVICE_DATA_LEN + 1);
        assert_eq!(data[8], 0x16);
        assert_eq!(&data[9..], &frame().service_data());
        // Fits a legacy advertising PDU
        assert!(data.len() <= 31);
    }
}
