use crate::alloc::FreeMap;
use crate::error::Result;
use crate::header::FileHeader;
use crate::io::{BlockStorage, SectorNumber};

/// Returns `sector` to the free-space map.
///
/// # Panics
///
/// Panics if the map does not have the sector marked allocated. The map and
/// the header disagree about who owns it, and neither can be trusted.
fn release<M: FreeMap>(free_map: &mut M, sector: SectorNumber) {
    assert!(
        free_map.test(sector),
        "sector {} released while not marked allocated",
        sector
    );
    free_map.clear(sector);
}

impl FileHeader {
    /// Releases every sector the header owns back to `free_map` and resets the
    /// header to empty.
    ///
    /// Data sectors go first, in logical order, followed by the secondary
    /// blocks under the double indirect block, the double indirect block
    /// itself and finally the single indirect block.
    ///
    /// All index blocks are read before anything is released, so a device
    /// error leaves both the header and the map unchanged.
    pub fn deallocate<D: BlockStorage, M: FreeMap>(
        &mut self,
        dev: &mut D,
        free_map: &mut M,
    ) -> Result<()> {
        let data = self.data_sectors(dev)?;
        let index = self.index_sectors(dev)?;

        for &sector in &data {
            release(free_map, sector);
        }
        // index_sectors lists single, double, then secondaries; release the
        // secondaries before the block that points at them.
        for &sector in index.iter().rev() {
            release(free_map, sector);
        }

        info!(
            "released {} data sectors and {} index sectors",
            data.len(),
            index.len()
        );
        *self = FileHeader {
            self_sector: self.self_sector,
            ..FileHeader::new()
        };
        Ok(())
    }
}
