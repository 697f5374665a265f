//! Record log for persistent settings
//!
//! Settings are appended to a [`FlashRegion`] as records:
//!
//! ```text
//! [id: u8][len: u8][payload: len bytes][crc16: u16 LE]
//! ```
//!
//! The CRC (CRC-16-XMODEM) covers id, len and payload. The newest record for
//! an id holds its value; if that record fails its CRC the setting reads as
//! unset. An erased byte (`0xFF`) in the id position marks the end of the
//! log. When the log is full, the newest valid record of every id is
//! rewritten into the freshly erased region.

use crc::{Crc, CRC_16_XMODEM};
use heapless::Vec;
use log::{info, warn};

use super::traits::{SettingsStore, StorageError};
use crate::at::{InstanceId, Namespace};
use crate::config::beacon::{DEFAULT_TX_POWER, INSTANCE_ID_LEN, NAMESPACE_LEN};

const CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Value of an erased byte
pub const ERASED: u8 = 0xFF;

const HEADER_LEN: usize = 2;
const CRC_LEN: usize = 2;
const MAX_PAYLOAD: usize = NAMESPACE_LEN;
const MAX_RECORD: usize = HEADER_LEN + MAX_PAYLOAD + CRC_LEN;

/// Backing storage for the record log
pub trait FlashRegion {
    /// Size of the region in bytes
    fn capacity(&self) -> usize;

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError>;

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError>;

    /// Reset the whole region to [`ERASED`]
    fn erase(&mut self) -> Result<(), StorageError>;
}

/// Memory-backed region over a plain byte slice
pub struct SliceRegion<'a> {
    data: &'a mut [u8],
}

impl<'a> SliceRegion<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data }
    }
}

impl FlashRegion for SliceRegion<'_> {
    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        let src = self
            .data
            .get(offset..offset + buf.len())
            .ok_or(StorageError::OutOfBounds)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        let dst = self
            .data
            .get_mut(offset..offset + data.len())
            .ok_or(StorageError::OutOfBounds)?;
        dst.copy_from_slice(data);
        Ok(())
    }

    fn erase(&mut self) -> Result<(), StorageError> {
        self.data.fill(ERASED);
        Ok(())
    }
}

/// Identifiers of the persisted settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SettingId {
    TxPower = 1,
    Namespace = 2,
    InstanceId = 3,
}

impl SettingId {
    const ALL: [SettingId; 3] = [SettingId::TxPower, SettingId::Namespace, SettingId::InstanceId];

    fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|id| *id as u8 == value)
    }

    /// Payload length of a well-formed record
    fn payload_len(self) -> usize {
        match self {
            SettingId::TxPower => 1,
            SettingId::Namespace => NAMESPACE_LEN,
            SettingId::InstanceId => INSTANCE_ID_LEN,
        }
    }
}

/// Location of a record in the log
#[derive(Debug, Clone, Copy)]
struct RecordHeader {
    offset: usize,
    id: u8,
    len: usize,
}

impl RecordHeader {
    fn size(&self) -> usize {
        HEADER_LEN + self.len + CRC_LEN
    }
}

/// Settings store over a record log
pub struct NvSettings<F: FlashRegion> {
    region: F,
    /// Offset of the first free byte
    head: usize,
}

impl<F: FlashRegion> NvSettings<F> {
    /// Open the log, erasing the region if its structure is unreadable
    pub fn mount(region: F) -> Result<Self, StorageError> {
        let mut settings = Self { region, head: 0 };

        match settings.scan_end()? {
            Some(head) => {
                settings.head = head;
                info!("Settings mounted, {} bytes used", head);
            }
            None => {
                warn!("Settings region malformed, erasing");
                settings.region.erase()?;
            }
        }

        Ok(settings)
    }

    /// Bytes used by the log
    pub fn used(&self) -> usize {
        self.head
    }

    /// Give the backing region back
    pub fn into_region(self) -> F {
        self.region
    }

    /// Find the end of the log, `None` if a header is malformed
    fn scan_end(&self) -> Result<Option<usize>, StorageError> {
        let capacity = self.region.capacity();
        let mut offset = 0;

        while offset + HEADER_LEN <= capacity {
            let mut header = [0u8; HEADER_LEN];
            self.region.read(offset, &mut header)?;

            if header[0] == ERASED {
                return Ok(Some(offset));
            }

            let len = header[1] as usize;
            let known = SettingId::from_u8(header[0]).is_some();
            if !known || len > MAX_PAYLOAD || offset + HEADER_LEN + len + CRC_LEN > capacity {
                return Ok(None);
            }

            offset += HEADER_LEN + len + CRC_LEN;
        }

        Ok(Some(offset))
    }

    /// Newest record header for `id`
    fn latest(&self, id: SettingId) -> Option<RecordHeader> {
        let mut offset = 0;
        let mut found = None;

        while offset < self.head {
            let mut header = [0u8; HEADER_LEN];
            self.region.read(offset, &mut header).ok()?;

            let record = RecordHeader {
                offset,
                id: header[0],
                len: header[1] as usize,
            };
            if record.id == id as u8 {
                found = Some(record);
            }
            offset += record.size();
        }

        found
    }

    /// Read and verify the payload of a record
    fn read_payload(&self, record: &RecordHeader) -> Option<Vec<u8, MAX_PAYLOAD>> {
        let mut raw = [0u8; MAX_RECORD];
        let raw = &mut raw[..record.size()];
        self.region.read(record.offset, raw).ok()?;

        let (body, crc) = raw.split_at(HEADER_LEN + record.len);
        let stored = u16::from_le_bytes([crc[0], crc[1]]);
        if CRC.checksum(body) != stored {
            warn!("Settings record {} failed CRC", record.id);
            return None;
        }

        Vec::from_slice(&body[HEADER_LEN..]).ok()
    }

    /// Current value of a setting, `None` if unset or corrupt
    fn value(&self, id: SettingId) -> Option<Vec<u8, MAX_PAYLOAD>> {
        let record = self.latest(id)?;
        let payload = self.read_payload(&record)?;
        (payload.len() == id.payload_len()).then_some(payload)
    }

    /// Append a record, compacting the log when it is full
    fn store(&mut self, id: SettingId, payload: &[u8]) -> Result<(), StorageError> {
        let size = HEADER_LEN + payload.len() + CRC_LEN;
        if self.head + size > self.region.capacity() {
            self.compact()?;
            if self.head + size > self.region.capacity() {
                return Err(StorageError::NoSpace);
            }
        }
        self.append(id, payload)
    }

    fn append(&mut self, id: SettingId, payload: &[u8]) -> Result<(), StorageError> {
        let mut record: Vec<u8, MAX_RECORD> = Vec::new();
        record
            .extend_from_slice(&[id as u8, payload.len() as u8])
            .map_err(|_| StorageError::NoSpace)?;
        record
            .extend_from_slice(payload)
            .map_err(|_| StorageError::NoSpace)?;
        let crc = CRC.checksum(&record);
        record
            .extend_from_slice(&crc.to_le_bytes())
            .map_err(|_| StorageError::NoSpace)?;

        self.region.write(self.head, &record)?;
        self.head += record.len();
        Ok(())
    }

    /// Rewrite the newest valid value of every setting into an erased region
    fn compact(&mut self) -> Result<(), StorageError> {
        let mut live: Vec<(SettingId, Vec<u8, MAX_PAYLOAD>), 3> = Vec::new();
        for id in SettingId::ALL {
            if let Some(payload) = self.value(id) {
                let _ = live.push((id, payload));
            }
        }

        info!("Compacting settings, {} live records", live.len());
        self.region.erase()?;
        self.head = 0;

        for (id, payload) in live.iter() {
            self.append(*id, payload)?;
        }
        Ok(())
    }
}

impl<F: FlashRegion> SettingsStore for NvSettings<F> {
    fn tx_power(&self) -> i8 {
        self.value(SettingId::TxPower)
            .map(|payload| payload[0] as i8)
            .unwrap_or(DEFAULT_TX_POWER)
    }

    fn set_tx_power(&mut self, dbm: i8) -> Result<(), StorageError> {
        self.store(SettingId::TxPower, &[dbm as u8])
    }

    fn namespace(&self) -> Option<Namespace> {
        let payload = self.value(SettingId::Namespace)?;
        payload.as_slice().try_into().ok()
    }

    fn set_namespace(&mut self, namespace: &Namespace) -> Result<(), StorageError> {
        self.store(SettingId::Namespace, namespace)
    }

    fn instance_id(&self) -> Option<InstanceId> {
        let payload = self.value(SettingId::InstanceId)?;
        payload.as_slice().try_into().ok()
    }

    fn set_instance_id(&mut self, instance_id: &InstanceId) -> Result<(), StorageError> {
        self.store(SettingId::InstanceId, instance_id)
    }
}
