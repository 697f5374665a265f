pub mod flash;
pub mod nv;
pub mod traits;

#[cfg(feature = "embedded")]
pub mod partition;

pub use flash::NorFlashRegion;
pub use nv::{FlashRegion, NvSettings, SliceRegion};
pub use traits::{SettingsStore, StorageError};
