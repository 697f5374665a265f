//! Record log region over NOR flash
//!
//! [`NvSettings`](super::NvSettings) reads and appends at arbitrary byte
//! offsets. Flash only accepts accesses aligned to its read and write
//! sizes, so each access is split into aligned chunks through a small
//! scratch buffer. Partial words are padded with `0xFF`, which leaves bits
//! already programmed by a neighbouring record untouched.

use core::cell::RefCell;

use embedded_storage::nor_flash::{
    MultiwriteNorFlash, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};

use super::nv::{FlashRegion, ERASED};
use super::traits::StorageError;

/// Largest aligned access done at once
const CHUNK_LEN: usize = 32;

/// A fixed window of a NOR flash device
pub struct NorFlashRegion<F: MultiwriteNorFlash> {
    flash: RefCell<F>,
    /// Absolute flash address of the window
    base: u32,
    len: usize,
}

impl<F: MultiwriteNorFlash> NorFlashRegion<F> {
    /// Use `len` bytes of `flash` starting at `base`
    ///
    /// The window must start and end on erase-sector boundaries.
    pub fn new(flash: F, base: u32, len: usize) -> Result<Self, StorageError> {
        let sector = F::ERASE_SIZE;
        let aligned = len > 0
            && base as usize % sector == 0
            && len % sector == 0
            && CHUNK_LEN % F::READ_SIZE == 0
            && CHUNK_LEN % F::WRITE_SIZE == 0
            && sector % F::READ_SIZE == 0
            && sector % F::WRITE_SIZE == 0;
        if !aligned {
            return Err(StorageError::NotAligned);
        }
        if base as usize + len > flash.capacity() {
            return Err(StorageError::OutOfBounds);
        }

        Ok(Self {
            flash: RefCell::new(flash),
            base,
            len,
        })
    }

    /// Give the flash device back
    pub fn into_inner(self) -> F {
        self.flash.into_inner()
    }

    fn check_bounds(&self, offset: usize, len: usize) -> Result<(), StorageError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(StorageError::OutOfBounds),
        }
    }

    fn address(&self, offset: usize) -> u32 {
        self.base + offset as u32
    }
}

/// Round `value` up to a multiple of `align`
fn align_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

fn storage_error<E: NorFlashError>(error: E) -> StorageError {
    match error.kind() {
        NorFlashErrorKind::NotAligned => StorageError::NotAligned,
        NorFlashErrorKind::OutOfBounds => StorageError::OutOfBounds,
        _ => StorageError::Io,
    }
}

impl<F: MultiwriteNorFlash> FlashRegion for NorFlashRegion<F> {
    fn capacity(&self) -> usize {
        self.len
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        self.check_bounds(offset, buf.len())?;
        let mut flash = self.flash.borrow_mut();
        let mut scratch = [0u8; CHUNK_LEN];
        let mut done = 0;

        while done < buf.len() {
            let pos = offset + done;
            let start = pos - pos % F::READ_SIZE;
            let skip = pos - start;
            let take = (CHUNK_LEN - skip).min(buf.len() - done);
            let span = align_up(skip + take, F::READ_SIZE);

            flash
                .read(self.address(start), &mut scratch[..span])
                .map_err(storage_error)?;
            buf[done..done + take].copy_from_slice(&scratch[skip..skip + take]);
            done += take;
        }

        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        self.check_bounds(offset, data.len())?;
        let flash = self.flash.get_mut();
        let mut scratch = [ERASED; CHUNK_LEN];
        let mut done = 0;

        while done < data.len() {
            let pos = offset + done;
            let start = pos - pos % F::WRITE_SIZE;
            let skip = pos - start;
            let take = (CHUNK_LEN - skip).min(data.len() - done);
            let span = align_up(skip + take, F::WRITE_SIZE);

            scratch.fill(ERASED);
            scratch[skip..skip + take].copy_from_slice(&data[done..done + take]);
            flash
                .write(self.base + start as u32, &scratch[..span])
                .map_err(storage_error)?;
            done += take;
        }

        Ok(())
    }

    fn erase(&mut self) -> Result<(), StorageError> {
        let from = self.base;
        let to = self.address(self.len);
        self.flash.get_mut().erase(from, to).map_err(storage_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{NvSettings, SettingsStore};
    use embedded_storage::nor_flash::ErrorType;

    const FLASH_LEN: usize = 256;
    const BASE: u32 = 64;
    const REGION_LEN: usize = 128;

    /// NOR flash with word-sized access that only clears bits on write
    struct MockNorFlash {
        data: [u8; FLASH_LEN],
        writes: usize,
    }

    impl MockNorFlash {
        fn new() -> Self {
            Self {
                data: [ERASED; FLASH_LEN],
                writes: 0,
            }
        }

        fn check(offset: u32, len: usize, align: usize) -> Result<(), NorFlashErrorKind> {
            if offset as usize % align != 0 || len % align != 0 {
                return Err(NorFlashErrorKind::NotAligned);
            }
            if offset as usize + len > FLASH_LEN {
                return Err(NorFlashErrorKind::OutOfBounds);
            }
            Ok(())
        }
    }

    impl ErrorType for MockNorFlash {
        type Error = NorFlashErrorKind;
    }

    impl ReadNorFlash for MockNorFlash {
        const READ_SIZE: usize = 4;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            Self::check(offset, bytes.len(), Self::READ_SIZE)?;
            let start = offset as usize;
            bytes.copy_from_slice(&self.data[start..start + bytes.len()]);
            Ok(())
        }

        fn capacity(&self) -> usize {
            FLASH_LEN
        }
    }

    impl NorFlash for MockNorFlash {
        const WRITE_SIZE: usize = 4;
        const ERASE_SIZE: usize = 64;

        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            Self::check(from, (to - from) as usize, Self::ERASE_SIZE)?;
            self.data[from as usize..to as usize].fill(ERASED);
            Ok(())
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            Self::check(offset, bytes.len(), Self::WRITE_SIZE)?;
            let start = offset as usize;
            for (cell, byte) in self.data[start..start + bytes.len()].iter_mut().zip(bytes) {
                *cell &= *byte;
            }
            self.writes += 1;
            Ok(())
        }
    }

    impl MultiwriteNorFlash for MockNorFlash {}

    fn region() -> NorFlashRegion<MockNorFlash> {
        NorFlashRegion::new(MockNorFlash::new(), BASE, REGION_LEN).unwrap()
    }

    #[test]
    fn test_settings_survive_remount() {
        let mut settings = NvSettings::mount(region()).unwrap();
        settings.set_tx_power(-8).unwrap();
        settings.set_namespace(b"NAMESPACE1").unwrap();
        settings.set_tx_power(3).unwrap();

        let flash = settings.into_region().into_inner();
        assert!(flash.writes > 0);

        let region = NorFlashRegion::new(flash, BASE, REGION_LEN).unwrap();
        let settings = NvSettings::mount(region).unwrap();
        assert_eq!(settings.tx_power(), 3);
        assert_eq!(settings.namespace(), Some(*b"NAMESPACE1"));
        assert_eq!(settings.instance_id(), None);
    }

    #[test]
    fn test_unaligned_writes_keep_neighbours() {
        let mut region = region();
        region.write(1, b"abc").unwrap();
        region.write(4, b"de").unwrap();
        region.write(6, &[0x12; 40]).unwrap();

        let mut buf = [0u8; 8];
        region.read(0, &mut buf).unwrap();
        assert_eq!(&buf, b"\xFFabcde\x12\x12");

        let mut tail = [0u8; 3];
        region.read(45, &mut tail).unwrap();
        assert_eq!(tail, [0x12, ERASED, ERASED]);
    }

    #[test]
    fn test_accesses_stay_inside_window() {
        let mut region = region();
        region.write(0, &[0x00; REGION_LEN]).unwrap();

        let flash = region.into_inner();
        assert!(flash.data[..BASE as usize].iter().all(|b| *b == ERASED));
        assert!(flash.data[BASE as usize + REGION_LEN..].iter().all(|b| *b == ERASED));

        let mut region = NorFlashRegion::new(flash, BASE, REGION_LEN).unwrap();
        region.erase().unwrap();
        let mut buf = [0u8; REGION_LEN];
        region.read(0, &mut buf).unwrap();
        assert!(buf.iter().all(|b| *b == ERASED));
    }

    #[test]
    fn test_out_of_window_access_rejected() {
        let mut region = region();
        let mut buf = [0u8; 2];
        assert_eq!(region.read(REGION_LEN - 1, &mut buf), Err(StorageError::OutOfBounds));
        assert_eq!(region.write(REGION_LEN, b"x"), Err(StorageError::OutOfBounds));
        assert_eq!(region.write(usize::MAX, b"x"), Err(StorageError::OutOfBounds));
    }

    #[test]
    fn test_window_must_be_sector_aligned() {
        assert_eq!(
            NorFlashRegion::new(MockNorFlash::new(), 10, REGION_LEN).err(),
            Some(StorageError::NotAligned)
        );
        assert_eq!(
            NorFlashRegion::new(MockNorFlash::new(), BASE, 100).err(),
            Some(StorageError::NotAligned)
        );
        assert_eq!(
            NorFlashRegion::new(MockNorFlash::new(), 192, REGION_LEN).err(),
            Some(StorageError::OutOfBounds)
        );
    }
}
