//! Logical block to physical sector translation.

use crate::error::Result;
use crate::geometry::SECTOR_SIZE;
use crate::header::FileHeader;
use crate::indirect::IndirectBlock;
use crate::io::{BlockStorage, SectorNumber};
use crate::layout::Level;

use std::fmt::Write;

/// Index blocks between the header and a data sector never nest deeper than
/// the double indirect level.
const MAX_DEPTH: usize = 2;

impl FileHeader {
    /// Physical sector holding logical block `logical` of the file.
    ///
    /// Direct slots resolve without I/O. Blocks past them cost one sector read
    /// per index level walked.
    ///
    /// # Panics
    ///
    /// Panics if `logical` is not below [`FileHeader::sector_count`], or if the
    /// index block the block lives under is missing. Either means the header
    /// does not describe its own block map.
    pub fn physical_sector<D: BlockStorage>(
        &self,
        dev: &mut D,
        logical: usize,
    ) -> Result<SectorNumber> {
        assert!(
            logical < self.sector_count,
            "logical block {} beyond the file's {} sectors",
            logical,
            self.sector_count
        );

        let (root, path, depth): (_, [usize; MAX_DEPTH], _) = match Level::of(logical) {
            Level::Direct(slot) => {
                return Ok(self.direct[slot]
                    .unwrap_or_else(|| panic!("direct slot {} is unset", slot)));
            }
            Level::Single(slot) => (self.single_indirect, [slot, 0], 1),
            Level::Double(secondary, slot) => (self.double_indirect, [secondary, slot], 2),
        };

        let mut sector = root.unwrap_or_else(|| {
            panic!(
                "logical block {} needs an indirect block the header does not have",
                logical
            )
        });
        for &index in &path[..depth] {
            let block = IndirectBlock::fetch(dev, sector)?;
            sector = block.get(index).unwrap_or_else(|| {
                panic!(
                    "indirect block at sector {} has no entry {} (holds {})",
                    sector,
                    index,
                    block.len()
                )
            });
        }
        Ok(sector)
    }

    /// Physical sector holding byte `offset` of the file.
    pub fn byte_to_sector<D: BlockStorage>(
        &self,
        dev: &mut D,
        offset: usize,
    ) -> Result<SectorNumber> {
        self.physical_sector(dev, offset / SECTOR_SIZE)
    }

    /// Physical sector of every logical block, in logical order.
    pub fn data_sectors<D: BlockStorage>(&self, dev: &mut D) -> Result<Vec<SectorNumber>> {
        (0..self.sector_count)
            .map(|logical| self.physical_sector(dev, logical))
            .collect()
    }

    /// Sectors holding index blocks: the single indirect block, the double
    /// indirect block, then each of its secondaries in order.
    pub fn index_sectors<D: BlockStorage>(&self, dev: &mut D) -> Result<Vec<SectorNumber>> {
        let mut sectors: Vec<SectorNumber> = self.single_indirect.into_iter().collect();
        if let Some(double) = self.double_indirect {
            sectors.push(double);
            sectors.extend_from_slice(IndirectBlock::fetch(dev, double)?.entries());
        }
        Ok(sectors)
    }

    /// One-line listing of the block map. Direct sectors print bare, sectors
    /// under the single indirect block as `*n*` and those under the double
    /// indirect block as `**n**`.
    pub fn block_listing<D: BlockStorage>(&self, dev: &mut D) -> Result<String> {
        let mut listing = format!(
            "FileHeader contents.  File size: {}.  File blocks:\n",
            self.byte_length
        );
        for (logical, sector) in self.data_sectors(dev)?.into_iter().enumerate() {
            // Writing to a String cannot fail.
            let _ = match Level::of(logical) {
                Level::Direct(_) => write!(listing, "{} ", sector),
                Level::Single(_) => write!(listing, "*{}* ", sector),
                Level::Double(..) => write!(listing, "**{}** ", sector),
            };
        }
        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{NUM_DIRECT, NUM_INDIRECT};
    use crate::io::{SectorEmulator, SectorEmulatorBuilder};

    fn create_test_device() -> SectorEmulator {
        let dev = tempfile::tempfile().unwrap();
        SectorEmulatorBuilder::from(dev)
            .with_sector_count(64)
            .build()
            .expect("Could not initialize disk emulator.")
    }

    /// Header with every direct slot, a full single indirect block and one
    /// double indirect entry, wired by hand.
    fn hand_built_header(dev: &mut SectorEmulator) -> FileHeader {
        let mut header = FileHeader::new();
        for (i, slot) in header.direct.iter_mut().enumerate() {
            *slot = Some(1000 + i);
        }

        let mut single = IndirectBlock::new();
        single.push(2000);
        for _ in 1..NUM_INDIRECT {
            single.push(2001);
        }
        single.store(dev, 10).unwrap();
        header.single_indirect = Some(10);

        let mut leaf = IndirectBlock::new();
        leaf.push(3000);
        leaf.store(dev, 12).unwrap();
        let mut top = IndirectBlock::new();
        top.push(12);
        top.store(dev, 11).unwrap();
        header.double_indirect = Some(11);

        header.sector_count = NUM_DIRECT + NUM_INDIRECT + 1;
        header.byte_length = header.sector_count * SECTOR_SIZE;
        header
    }

    #[test]
    fn resolves_each_level() {
        let mut dev = create_test_device();
        let header = hand_built_header(&mut dev);

        assert_eq!(header.physical_sector(&mut dev, 0).unwrap(), 1000);
        assert_eq!(
            header.physical_sector(&mut dev, NUM_DIRECT - 1).unwrap(),
            1000 + NUM_DIRECT - 1
        );
        assert_eq!(header.physical_sector(&mut dev, NUM_DIRECT).unwrap(), 2000);
        assert_eq!(
            header
                .physical_sector(&mut dev, NUM_DIRECT + NUM_INDIRECT)
                .unwrap(),
            3000
        );
    }

    #[test]
    fn byte_offsets_map_through_their_block() {
        let mut dev = create_test_device();
        let header = hand_built_header(&mut dev);

        assert_eq!(header.byte_to_sector(&mut dev, SECTOR_SIZE - 1).unwrap(), 1000);
        assert_eq!(header.byte_to_sector(&mut dev, SECTOR_SIZE).unwrap(), 1001);
        assert_eq!(
            header
                .byte_to_sector(&mut dev, NUM_DIRECT * SECTOR_SIZE)
                .unwrap(),
            2000
        );
    }

    #[test]
    fn translation_is_repeatable() {
        let mut dev = create_test_device();
        let header = hand_built_header(&mut dev);
        let last = header.sector_count() - 1;

        let first = header.physical_sector(&mut dev, last).unwrap();
        let second = header.physical_sector(&mut dev, last).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn index_sectors_lists_every_level() {
        let mut dev = create_test_device();
        let header = hand_built_header(&mut dev);
        assert_eq!(header.index_sectors(&mut dev).unwrap(), vec![10, 11, 12]);
    }

    #[test]
    fn listing_marks_indirect_levels() {
        let mut dev = create_test_device();
        let header = hand_built_header(&mut dev);
        let listing = header.block_listing(&mut dev).unwrap();

        assert!(listing.starts_with("FileHeader contents.  File size: "));
        assert!(listing.contains("1000 "));
        assert!(listing.contains("*2000* "));
        assert!(listing.ends_with("**3000** "));
    }

    #[test]
    #[should_panic(expected = "beyond the file's")]
    fn translating_past_the_end_panics() {
        let mut dev = create_test_device();
        FileHeader::new().physical_sector(&mut dev, 0).unwrap();
    }

    #[test]
    #[should_panic(expected = "does not have")]
    fn missing_indirect_block_panics() {
        let mut dev = create_test_device();
        let mut header = FileHeader::new();
        for (i, slot) in header.direct.iter_mut().enumerate() {
            *slot = Some(i);
        }
        header.sector_count = NUM_DIRECT + 1;
        header.physical_sector(&mut dev, NUM_DIRECT).unwrap();
    }
}
