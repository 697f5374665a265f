//! Persistent settings trait for abstraction and testability

use crate::at::{InstanceId, Namespace};

/// Errors that can occur while persisting settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// No room left, even after compaction
    NoSpace,
    /// Backing region rejected the access
    Io,
    /// Offset or length outside the backing region
    OutOfBounds,
    /// Region does not match the flash access granularity
    NotAligned,
}

/// Persistent key-value settings
///
/// Reads never fail: a missing or unreadable value reads as unset.
pub trait SettingsStore {
    /// Persisted tx power in dBm, the default when unset
    fn tx_power(&self) -> i8;

    fn set_tx_power(&mut self, dbm: i8) -> Result<(), StorageError>;

    fn namespace(&self) -> Option<Namespace>;

    fn set_namespace(&mut self, namespace: &Namespace) -> Result<(), StorageError>;

    fn instance_id(&self) -> Option<InstanceId>;

    fn set_instance_id(&mut self, instance_id: &InstanceId) -> Result<(), StorageError>;
}

#[cfg(test)]
pub mod mock {
    //! Mock settings store for testing

    use super::*;
    use crate::config::beacon::DEFAULT_TX_POWER;
    use core::cell::RefCell;

    /// In-memory settings store for unit testing
    pub struct MockSettingsStore {
        tx_power: RefCell<Option<i8>>,
        namespace: RefCell<Option<Namespace>>,
        instance_id: RefCell<Option<InstanceId>>,
        writes: RefCell<usize>,
        /// Error to return on the next write
        next_write_error: RefCell<Option<StorageError>>,
    }

    impl MockSettingsStore {
        /// Create an empty store
        pub fn new() -> Self {
            Self {
                tx_power: RefCell::new(None),
                namespace: RefCell::new(None),
                instance_id: RefCell::new(None),
                writes: RefCell::new(0),
                next_write_error: RefCell::new(None),
            }
        }

        /// Number of successful writes
        pub fn writes(&self) -> usize {
            *self.writes.borrow()
        }

        /// Set an error to be returned by the next write
        pub fn set_next_write_error(&self, error: StorageError) {
            *self.next_write_error.borrow_mut() = Some(error);
        }

        fn write<T>(&self, slot: &RefCell<Option<T>>, value: T) -> Result<(), StorageError> {
            if let Some(error) = self.next_write_error.borrow_mut().take() {
                return Err(error);
            }
            *slot.borrow_mut() = Some(value);
            *self.writes.borrow_mut() += 1;
            Ok(())
        }
    }

    impl Default for MockSettingsStore {
        fn default() -> Self {
            Self::new()
        }
    }

    impl SettingsStore for MockSettingsStore {
        fn tx_power(&self) -> i8 {
            self.tx_power.borrow().unwrap_or(DEFAULT_TX_POWER)
        }

        fn set_tx_power(&mut self, dbm: i8) -> Result<(), StorageError> {
            self.write(&self.tx_power, dbm)
        }

        fn namespace(&self) -> Option<Namespace> {
            *self.namespace.borrow()
        }

        fn set_namespace(&mut self, namespace: &Namespace) -> Result<(), StorageError> {
            self.write(&self.namespace, *namespace)
        }

        fn instance_id(&self) -> Option<InstanceId> {
            *self.instance_id.borrow()
        }

        fn set_instance_id(&mut self, instance_id: &InstanceId) -> Result<(), StorageError> {
            self.write(&self.instance_id, *instance_id)
        }
    }
}
