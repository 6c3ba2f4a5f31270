use crate::error::{HeaderError, Result};
use crate::geometry::{NUM_INDIRECT, SECTOR_SIZE};
use crate::io::{BlockStorage, SectorNumber};

use static_assertions::const_assert;
use std::mem::size_of;
use zerocopy::byteorder::little_endian::I32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// On-disk pointer value for "no sector".
pub(crate) const SENTINEL: i32 = -1;

/// Encodes an optional sector as an on-disk pointer.
pub(crate) fn encode_pointer(sector: Option<SectorNumber>) -> I32 {
    I32::new(sector.map_or(SENTINEL, |s| s as i32))
}

/// Decodes an on-disk pointer. Negative values other than the sentinel are
/// treated as corruption.
pub(crate) fn decode_pointer(raw: I32) -> Result<Option<SectorNumber>> {
    match raw.get() {
        SENTINEL => Ok(None),
        n if n >= 0 => Ok(Some(n as SectorNumber)),
        n => Err(HeaderError::Corrupted(format!("invalid sector pointer {}", n))),
    }
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout)]
struct RawIndirectBlock {
    entry_count: I32,
    pointers: [I32; NUM_INDIRECT],
}

const_assert!(size_of::<RawIndirectBlock>() <= SECTOR_SIZE);

/// A sector-sized table of sector pointers.
///
/// Serves as the single indirect block, as the top level of the double
/// indirect block (whose entries are secondary indirect blocks) and as each of
/// those secondary blocks. Entries are always populated front to back, so the
/// valid pointers are exactly the first `len()` slots.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndirectBlock {
    entries: Vec<SectorNumber>,
}

impl IndirectBlock {
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(NUM_INDIRECT),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() == NUM_INDIRECT
    }

    pub fn get(&self, slot: usize) -> Option<SectorNumber> {
        self.entries.get(slot).copied()
    }

    pub fn entries(&self) -> &[SectorNumber] {
        &self.entries
    }

    /// Records `sector` in the next free slot.
    ///
    /// # Panics
    ///
    /// Panics if every slot is already in use.
    pub fn push(&mut self, sector: SectorNumber) {
        assert!(
            !self.is_full(),
            "indirect block already holds {} pointers",
            NUM_INDIRECT
        );
        self.entries.push(sector);
    }

    /// Reads the indirect block stored at `sector`.
    pub fn fetch<D: BlockStorage>(dev: &mut D, sector: SectorNumber) -> Result<Self> {
        let mut buf = [0; SECTOR_SIZE];
        dev.read_sector(sector, &mut buf)?;
        Self::parse(&buf)
    }

    /// Writes the block to `sector`.
    pub fn store<D: BlockStorage>(&self, dev: &mut D, sector: SectorNumber) -> Result<()> {
        dev.write_sector(sector, &self.serialize())?;
        Ok(())
    }

    fn parse(buf: &[u8]) -> Result<Self> {
        let (raw, _) = RawIndirectBlock::read_from_prefix(buf)
            .map_err(|_| HeaderError::Corrupted("short indirect block".to_string()))?;

        let count = raw.entry_count.get();
        if count < 0 || count as usize > NUM_INDIRECT {
            return Err(HeaderError::Corrupted(format!(
                "indirect block claims {} entries",
                count
            )));
        }
        let count = count as usize;

        let mut entries = Vec::with_capacity(NUM_INDIRECT);
        for (slot, &pointer) in raw.pointers.iter().enumerate() {
            match (decode_pointer(pointer)?, slot < count) {
                (Some(sector), true) => entries.push(sector),
                (None, false) => {}
                _ => {
                    return Err(HeaderError::Corrupted(format!(
                        "indirect slot {} disagrees with entry count {}",
                        slot, count
                    )))
                }
            }
        }
        Ok(Self { entries })
    }

    fn serialize(&self) -> [u8; SECTOR_SIZE] {
        let mut pointers = [I32::new(SENTINEL); NUM_INDIRECT];
        for (slot, &sector) in pointers.iter_mut().zip(self.entries.iter()) {
            *slot = encode_pointer(Some(sector));
        }
        let raw = RawIndirectBlock {
            entry_count: I32::new(self.entries.len() as i32),
            pointers,
        };

        let mut buf = [0; SECTOR_SIZE];
        buf[..size_of::<RawIndirectBlock>()].copy_from_slice(raw.as_bytes());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::SectorEmulatorBuilder;

    #[test]
    fn fresh_block_serializes_count_then_sentinels() {
        let buf = IndirectBlock::new().serialize();

        assert_eq!(&buf[0..4], &0_i32.to_le_bytes());
        for chunk in buf[4..4 + NUM_INDIRECT * 4].chunks(4) {
            assert_eq!(chunk, &(-1_i32).to_le_bytes());
        }
    }

    #[test]
    fn pointers_are_little_endian_in_slot_order() {
        let mut block = IndirectBlock::new();
        block.push(7);
        block.push(0x0102);

        let buf = block.serialize();
        assert_eq!(&buf[0..4], &2_i32.to_le_bytes());
        assert_eq!(&buf[4..8], &7_i32.to_le_bytes());
        assert_eq!(&buf[8..12], &0x0102_i32.to_le_bytes());
        assert_eq!(&buf[12..16], &(-1_i32).to_le_bytes());
    }

    #[test]
    fn full_block_survives_a_trip_through_disk() {
        let medium = tempfile::tempfile().unwrap();
        let mut dev = SectorEmulatorBuilder::from(medium)
            .with_sector_count(4)
            .build()
            .unwrap();

        let mut block = IndirectBlock::new();
        for sector in 100..100 + NUM_INDIRECT {
            block.push(sector);
        }
        assert!(block.is_full());

        block.store(&mut dev, 3).unwrap();
        assert_eq!(IndirectBlock::fetch(&mut dev, 3).unwrap(), block);
    }

    #[test]
    fn zeroed_sector_is_not_a_valid_block() {
        // A zeroed sector has count 0 but pointer 0 in slot 0, which is not a
        // sentinel.
        let err = IndirectBlock::parse(&[0; SECTOR_SIZE]).unwrap_err();
        assert!(matches!(err, HeaderError::Corrupted(_)));
    }

    #[test]
    fn rejects_out_of_range_entry_count() {
        let mut buf = IndirectBlock::new().serialize();
        buf[0..4].copy_from_slice(&((NUM_INDIRECT + 1) as i32).to_le_bytes());
        assert!(matches!(
            IndirectBlock::parse(&buf),
            Err(HeaderError::Corrupted(_))
        ));
    }

    #[test]
    #[should_panic(expected = "already holds")]
    fn pushing_past_capacity_panics() {
        let mut block = IndirectBlock::new();
        for sector in 0..=NUM_INDIRECT {
            block.push(sector);
        }
    }
}
