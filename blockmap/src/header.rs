use crate::error::{HeaderError, Result};
use crate::geometry::{sectors_for, MAX_FILE_BLOCKS, NUM_DIRECT, NUM_INDIRECT, SECTOR_SIZE};
use crate::indirect::{decode_pointer, encode_pointer, SENTINEL};
use crate::io::{BlockStorage, SectorNumber};

use static_assertions::const_assert;
use std::mem::size_of;
use zerocopy::byteorder::little_endian::I32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Exact on-disk image of a file header. Field order is part of the disk
/// format.
#[repr(C)]
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout)]
struct RawFileHeader {
    byte_length: I32,
    sector_count: I32,
    direct: [I32; NUM_DIRECT],
    single_indirect: I32,
    double_indirect: I32,
    self_sector: I32,
}

const_assert!(size_of::<RawFileHeader>() <= SECTOR_SIZE);

/// Per-file block map, persisted in exactly one sector.
///
/// The first `NUM_DIRECT` logical blocks live in direct slots. The next
/// `NUM_INDIRECT` are reached through the single indirect block and the rest
/// through the double indirect block and its secondaries.
///
/// A header starts out empty, is grown once by [`FileHeader::allocate`] and
/// returns to empty through [`FileHeader::deallocate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub(crate) byte_length: usize,
    pub(crate) sector_count: usize,
    pub(crate) direct: [Option<SectorNumber>; NUM_DIRECT],
    pub(crate) single_indirect: Option<SectorNumber>,
    pub(crate) double_indirect: Option<SectorNumber>,
    /// Reserved. Carried through persistence untouched.
    pub(crate) self_sector: Option<SectorNumber>,
}

impl Default for FileHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl FileHeader {
    /// An empty header: no bytes, no sectors, every pointer unset.
    pub fn new() -> Self {
        Self {
            byte_length: 0,
            sector_count: 0,
            direct: [None; NUM_DIRECT],
            single_indirect: None,
            double_indirect: None,
            self_sector: None,
        }
    }

    /// Length of the file in bytes.
    pub fn byte_length(&self) -> usize {
        self.byte_length
    }

    /// Data sectors owned by the file, not counting index blocks.
    pub fn sector_count(&self) -> usize {
        self.sector_count
    }

    pub fn direct(&self) -> &[Option<SectorNumber>; NUM_DIRECT] {
        &self.direct
    }

    pub fn single_indirect(&self) -> Option<SectorNumber> {
        self.single_indirect
    }

    pub fn double_indirect(&self) -> Option<SectorNumber> {
        self.double_indirect
    }

    pub fn self_sector(&self) -> Option<SectorNumber> {
        self.self_sector
    }

    /// Whether the header owns no sectors at all.
    pub fn is_empty(&self) -> bool {
        self.sector_count == 0
            && self.direct.iter().all(Option::is_none)
            && self.single_indirect.is_none()
            && self.double_indirect.is_none()
    }

    /// Reads the header stored at `sector`.
    pub fn fetch<D: BlockStorage>(dev: &mut D, sector: SectorNumber) -> Result<Self> {
        let mut buf = [0; SECTOR_SIZE];
        dev.read_sector(sector, &mut buf)?;
        Self::parse(&buf)
    }

    /// Writes the header to `sector`.
    pub fn store<D: BlockStorage>(&self, dev: &mut D, sector: SectorNumber) -> Result<()> {
        dev.write_sector(sector, &self.serialize())?;
        Ok(())
    }

    fn parse(buf: &[u8]) -> Result<Self> {
        let (raw, _) = RawFileHeader::read_from_prefix(buf)
            .map_err(|_| HeaderError::Corrupted("short file header".to_string()))?;

        let byte_length = raw.byte_length.get();
        let sector_count = raw.sector_count.get();
        if byte_length < 0 || sector_count < 0 {
            return Err(HeaderError::Corrupted(format!(
                "negative header length {} / sectors {}",
                byte_length, sector_count
            )));
        }
        let (byte_length, sector_count) = (byte_length as usize, sector_count as usize);
        if sector_count > MAX_FILE_BLOCKS || sectors_for(byte_length) > sector_count {
            return Err(HeaderError::Corrupted(format!(
                "{} bytes cannot live in {} sectors",
                byte_length, sector_count
            )));
        }

        let mut direct = [None; NUM_DIRECT];
        for (slot, (entry, &pointer)) in direct.iter_mut().zip(raw.direct.iter()).enumerate() {
            *entry = decode_pointer(pointer)?;
            if entry.is_some() != (slot < sector_count) {
                return Err(HeaderError::Corrupted(format!(
                    "direct slot {} disagrees with sector count {}",
                    slot, sector_count
                )));
            }
        }

        let header = Self {
            byte_length,
            sector_count,
            direct,
            single_indirect: decode_pointer(raw.single_indirect)?,
            double_indirect: decode_pointer(raw.double_indirect)?,
            self_sector: decode_pointer(raw.self_sector)?,
        };
        if header.single_indirect.is_some() != (sector_count > NUM_DIRECT) {
            return Err(HeaderError::Corrupted(format!(
                "single indirect pointer disagrees with sector count {}",
                sector_count
            )));
        }
        if header.double_indirect.is_some() != (sector_count > NUM_DIRECT + NUM_INDIRECT) {
            return Err(HeaderError::Corrupted(format!(
                "double indirect pointer disagrees with sector count {}",
                sector_count
            )));
        }
        Ok(header)
    }

    fn serialize(&self) -> [u8; SECTOR_SIZE] {
        let mut direct = [I32::new(SENTINEL); NUM_DIRECT];
        for (slot, &sector) in direct.iter_mut().zip(self.direct.iter()) {
            *slot = encode_pointer(sector);
        }
        let raw = RawFileHeader {
            byte_length: I32::new(self.byte_length as i32),
            sector_count: I32::new(self.sector_count as i32),
            direct,
            single_indirect: encode_pointer(self.single_indirect),
            double_indirect: encode_pointer(self.double_indirect),
            self_sector: encode_pointer(self.self_sector),
        };

        let mut buf = [0; SECTOR_SIZE];
        buf[..size_of::<RawFileHeader>()].copy_from_slice(raw.as_bytes());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{SectorEmulator, SectorEmulatorBuilder};

    fn create_test_device() -> SectorEmulator {
        let dev = tempfile::tempfile().unwrap();
        SectorEmulatorBuilder::from(dev)
            .with_sector_count(8)
            .build()
            .expect("Could not initialize disk emulator.")
    }

    #[test]
    fn new_header_is_empty() {
        let header = FileHeader::new();
        assert!(header.is_empty());
        assert_eq!(header.byte_length(), 0);
        assert_eq!(header.sector_count(), 0);
        assert_eq!(header.single_indirect(), None);
        assert_eq!(header.double_indirect(), None);
        assert_eq!(header.self_sector(), None);
    }

    #[test]
    fn empty_header_round_trips_with_sentinels() {
        let mut dev = create_test_device();
        let header = FileHeader::new();

        header.store(&mut dev, 5).unwrap();
        let mut buf = [0; SECTOR_SIZE];
        dev.read_sector(5, &mut buf).unwrap();
        // Every pointer field is the sentinel.
        for chunk in buf[8..size_of::<RawFileHeader>()].chunks(4) {
            assert_eq!(chunk, &(-1_i32).to_le_bytes());
        }

        assert_eq!(FileHeader::fetch(&mut dev, 5).unwrap(), header);
    }

    #[test]
    fn populated_header_round_trips() {
        let mut dev = create_test_device();
        let mut header = FileHeader::new();
        header.byte_length = (NUM_DIRECT + 2) * SECTOR_SIZE - 3;
        header.sector_count = NUM_DIRECT + 2;
        for (i, slot) in header.direct.iter_mut().enumerate() {
            *slot = Some(100 + i);
        }
        header.single_indirect = Some(42);
        header.self_sector = Some(3);

        header.store(&mut dev, 3).unwrap();
        let fetched = FileHeader::fetch(&mut dev, 3).unwrap();
        assert_eq!(fetched, header);
        assert_eq!(fetched.self_sector(), Some(3));
    }

    #[test]
    fn field_layout_is_fixed() {
        let mut header = FileHeader::new();
        header.byte_length = 500;
        header.sector_count = 4;
        header.direct[..4].copy_from_slice(&[Some(9), Some(10), Some(11), Some(12)]);

        let buf = header.serialize();
        assert_eq!(&buf[0..4], &500_i32.to_le_bytes());
        assert_eq!(&buf[4..8], &4_i32.to_le_bytes());
        assert_eq!(&buf[8..12], &9_i32.to_le_bytes());
        let tail = 8 + NUM_DIRECT * 4;
        assert_eq!(&buf[tail..tail + 4], &(-1_i32).to_le_bytes());
    }

    #[test]
    fn rejects_length_beyond_its_sectors() {
        let mut header = FileHeader::new();
        header.byte_length = SECTOR_SIZE + 1;
        header.sector_count = 1;
        header.direct[0] = Some(7);

        let err = FileHeader::parse(&header.serialize()).unwrap_err();
        assert!(matches!(err, HeaderError::Corrupted(_)));
    }

    #[test]
    fn rejects_direct_slots_that_disagree_with_count() {
        let mut header = FileHeader::new();
        header.sector_count = 1;
        header.byte_length = 1;

        let err = FileHeader::parse(&header.serialize()).unwrap_err();
        assert!(matches!(err, HeaderError::Corrupted(_)));
    }

    /// Every direct slot in use plus `extra` sectors past them.
    fn header_past_direct(extra: usize) -> FileHeader {
        let mut header = FileHeader::new();
        for (i, slot) in header.direct.iter_mut().enumerate() {
            *slot = Some(100 + i);
        }
        header.sector_count = NUM_DIRECT + extra;
        header.byte_length = header.sector_count * SECTOR_SIZE;
        header
    }

    #[test]
    fn rejects_missing_double_indirect_pointer() {
        let mut dev = create_test_device();
        let mut header = header_past_direct(NUM_INDIRECT + 1);
        header.single_indirect = Some(2);
        header.store(&mut dev, 1).unwrap();

        assert!(matches!(
            FileHeader::fetch(&mut dev, 1),
            Err(HeaderError::Corrupted(_))
        ));
    }

    #[test]
    fn rejects_missing_single_indirect_pointer() {
        let header = header_past_direct(1);
        assert!(matches!(
            FileHeader::parse(&header.serialize()),
            Err(HeaderError::Corrupted(_))
        ));
    }

    #[test]
    fn rejects_single_indirect_pointer_below_its_level() {
        let mut header = header_past_direct(0);
        header.single_indirect = Some(2);
        assert!(matches!(
            FileHeader::parse(&header.serialize()),
            Err(HeaderError::Corrupted(_))
        ));
    }

    #[test]
    fn rejects_double_indirect_pointer_below_its_level() {
        let mut header = header_past_direct(NUM_INDIRECT);
        header.single_indirect = Some(2);
        header.double_indirect = Some(3);
        assert!(matches!(
            FileHeader::parse(&header.serialize()),
            Err(HeaderError::Corrupted(_))
        ));
    }

    #[test]
    fn accepts_header_reaching_double_indirect() {
        let mut header = header_past_direct(NUM_INDIRECT + 1);
        header.single_indirect = Some(2);
        header.double_indirect = Some(3);
        assert_eq!(FileHeader::parse(&header.serialize()).unwrap(), header);
    }

    #[test]
    fn io_errors_propagate() {
        let mut dev = create_test_device();
        assert!(matches!(
            FileHeader::fetch(&mut dev, 100),
            Err(HeaderError::Io(_))
        ));
    }
}
