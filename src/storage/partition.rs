//! Location of the settings log in the flash partition table

use embedded_storage::Storage;
use esp_bootloader_esp_idf::partitions::{
    self, DataPartitionSubType, PartitionType, PARTITION_TABLE_MAX_LEN,
};
use log::{info, warn};

use super::traits::StorageError;
use crate::config::storage::SETTINGS_REGION_LEN;

/// Flash window for the settings log: the start of the NVS data partition
///
/// Returns the absolute address and length of the window.
pub fn settings_window<F: Storage>(flash: &mut F) -> Result<(u32, usize), StorageError> {
    let mut table = [0u8; PARTITION_TABLE_MAX_LEN];
    let partitions = partitions::read_partition_table(flash, &mut table)
        .inspect_err(|e| warn!("Partition table unreadable: {:?}", e))
        .map_err(|_| StorageError::Io)?;

    let nvs = partitions
        .find_partition(PartitionType::Data(DataPartitionSubType::Nvs))
        .map_err(|_| StorageError::Io)?
        .ok_or_else(|| {
            warn!("No NVS partition for settings");
            StorageError::Io
        })?;

    let len = (nvs.len() as usize).min(SETTINGS_REGION_LEN);
    info!("Settings window at {:#x}, {} bytes", nvs.offset(), len);
    Ok((nvs.offset(), len))
}
