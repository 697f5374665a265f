//! Bluetooth device address
//!
//! A factory-programmed custom address is public. Without one the device
//! falls back to its factory random static address.

use crate::at::InstanceId;
use crate::config::beacon::ADDRESS_LEN;

/// Register value of an unprogrammed word
const EMPTY_REGISTER: u32 = 0xFFFF_FFFF;

/// Address type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    Public,
    Random,
}

/// Device address in controller byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceAddress {
    kind: AddressKind,
    bytes: [u8; ADDRESS_LEN],
}

impl DeviceAddress {
    pub const fn new(kind: AddressKind, bytes: [u8; ADDRESS_LEN]) -> Self {
        Self { kind, bytes }
    }

    /// Public address from a MAC written most significant byte first
    pub fn from_mac(mac: [u8; ADDRESS_LEN]) -> Self {
        let mut bytes = mac;
        bytes.reverse();
        Self::new(AddressKind::Public, bytes)
    }

    /// Decode the address from factory register words
    ///
    /// `custom` holds the two customer words, `device` the two device
    /// address words. Random addresses get the two top bits set as required
    /// for static addresses.
    pub fn from_factory_words(custom: [u32; 2], device: [u32; 2]) -> Self {
        let programmed = custom[0] != EMPTY_REGISTER || custom[1] != EMPTY_REGISTER;
        let (kind, words) = if programmed {
            (AddressKind::Public, custom)
        } else {
            (AddressKind::Random, device)
        };

        let mut bytes = [
            (words[1] >> 8) as u8,
            words[1] as u8,
            (words[0] >> 24) as u8,
            (words[0] >> 16) as u8,
            (words[0] >> 8) as u8,
            words[0] as u8,
        ];
        if kind == AddressKind::Random {
            bytes[0] |= 0xC0;
        }

        Self::new(kind, bytes)
    }

    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    /// Raw bytes in controller order
    pub fn bytes(&self) -> [u8; ADDRESS_LEN] {
        self.bytes
    }

    /// Bytes in the order they are reported to the host
    ///
    /// Public addresses are reversed, random addresses are reported as-is.
    pub fn display_bytes(&self) -> [u8; ADDRESS_LEN] {
        let mut bytes = self.bytes;
        if self.kind == AddressKind::Public {
            bytes.reverse();
        }
        bytes
    }

    /// Default Eddystone instance id derived from the address
    pub fn instance_id(&self) -> InstanceId {
        self.display_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_address_is_public() {
        let address = DeviceAddress::from_factory_words([0x3344_5566, 0x0000_1122], [0, 0]);

        assert_eq!(address.kind(), AddressKind::Public);
        assert_eq!(address.bytes(), [0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        assert_eq!(address.display_bytes(), [0x66, 0x55, 0x44, 0x33, 0x22, 0x11]);
    }

    #[test]
    fn test_unprogrammed_custom_falls_back_to_random() {
        let address =
            DeviceAddress::from_factory_words([EMPTY_REGISTER, EMPTY_REGISTER], [0xAABB_CCDD, 0x0000_0102]);

        assert_eq!(address.kind(), AddressKind::Random);
        // Static random address has the two top bits set
        assert_eq!(address.bytes(), [0xC1, 0x02, 0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(address.display_bytes(), address.bytes());
    }

    #[test]
    fn test_from_mac_displays_in_mac_order() {
        let mac = [0x24, 0x6F, 0x28, 0x01, 0x02, 0x03];
        let address = DeviceAddress::from_mac(mac);

        assert_eq!(address.kind(), AddressKind::Public);
        assert_eq!(address.display_bytes(), mac);
        assert_eq!(address.instance_id(), mac);
    }
}
