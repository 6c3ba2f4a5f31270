use crate::alloc::FreeMap;
use crate::error::{HeaderError, Result};
use crate::header::FileHeader;
use crate::indirect::IndirectBlock;
use crate::io::{BlockStorage, SectorNumber};
use crate::layout::{secondary_start, Layout};

/// Sectors claimed during one allocation. Unless the allocation commits, every
/// claimed sector is handed back to the free-space map.
struct Claims<'a, M: FreeMap> {
    free_map: &'a mut M,
    claimed: Vec<SectorNumber>,
}

impl<'a, M: FreeMap> Claims<'a, M> {
    fn new(free_map: &'a mut M, expected: usize) -> Self {
        Self {
            free_map,
            claimed: Vec::with_capacity(expected),
        }
    }

    fn claim(&mut self) -> Result<SectorNumber> {
        let sector = self.free_map.find_and_mark().ok_or(HeaderError::OutOfSpace {
            needed: 1,
            free: 0,
        })?;
        self.claimed.push(sector);
        Ok(sector)
    }

    /// Claims a sector and writes an empty indirect block to it.
    fn claim_indirect<D: BlockStorage>(&mut self, dev: &mut D) -> Result<SectorNumber> {
        let sector = self.claim()?;
        IndirectBlock::new().store(dev, sector)?;
        Ok(sector)
    }

    /// Claims `count` data sectors into `block`, then persists it.
    fn fill<D: BlockStorage>(
        &mut self,
        dev: &mut D,
        block: &mut IndirectBlock,
        sector: SectorNumber,
        count: usize,
    ) -> Result<()> {
        for _ in 0..count {
            let data = self.claim()?;
            block.push(data);
        }
        block.store(dev, sector)
    }

    fn commit(mut self) {
        self.claimed.clear();
    }
}

impl<M: FreeMap> Drop for Claims<'_, M> {
    fn drop(&mut self) {
        if !self.claimed.is_empty() {
            warn!(
                "allocation abandoned, releasing {} claimed sectors",
                self.claimed.len()
            );
        }
        for &sector in self.claimed.iter().rev() {
            self.free_map.clear(sector);
        }
    }
}

impl FileHeader {
    /// Grows an empty header to cover `size` bytes, drawing every data and
    /// index sector from `free_map`.
    ///
    /// Sectors are claimed in ascending logical order: direct slots, then the
    /// single indirect block and its entries, then the double indirect block
    /// and each secondary block in turn. Each index block is written to `dev`
    /// as soon as it is created and again once filled.
    ///
    /// The total number of sectors needed is checked against the free count
    /// before anything is claimed. On any error no sector stays claimed and
    /// the header is left as it was.
    pub fn allocate<D: BlockStorage, M: FreeMap>(
        &mut self,
        dev: &mut D,
        free_map: &mut M,
        size: usize,
    ) -> Result<()> {
        if !self.is_empty() {
            return Err(HeaderError::AlreadyAllocated);
        }

        let layout = Layout::for_size(size)?;
        let needed = layout.sectors_needed();
        let free = free_map.free_count();
        if free < needed {
            warn!(
                "refusing {} byte file: needs {} sectors, {} free",
                size, needed, free
            );
            return Err(HeaderError::OutOfSpace { needed, free });
        }

        let mut claims = Claims::new(free_map, needed);
        let staged = self.build(dev, &mut claims, &layout)?;
        claims.commit();

        info!(
            "allocated {} bytes in {} data sectors and {} index sectors",
            size,
            layout.data_sectors(),
            layout.index_sectors()
        );
        *self = staged;
        Ok(())
    }

    /// Claims and writes the block map described by `layout`, returning the
    /// header that owns it.
    fn build<D: BlockStorage, M: FreeMap>(
        &self,
        dev: &mut D,
        claims: &mut Claims<'_, M>,
        layout: &Layout,
    ) -> Result<FileHeader> {
        let mut staged = FileHeader {
            byte_length: layout.size,
            sector_count: layout.data_sectors(),
            self_sector: self.self_sector,
            ..FileHeader::new()
        };

        for slot in staged.direct.iter_mut().take(layout.direct) {
            let sector = claims.claim()?;
            debug!("adding sector {} to the direct block", sector);
            *slot = Some(sector);
        }
        if !layout.needs_single_indirect() {
            return Ok(staged);
        }

        let single = claims.claim_indirect(dev)?;
        debug!("creating single indirect block at sector {}", single);
        let mut block = IndirectBlock::new();
        claims.fill(dev, &mut block, single, layout.single)?;
        staged.single_indirect = Some(single);
        if !layout.needs_double_indirect() {
            return Ok(staged);
        }

        let double = claims.claim_indirect(dev)?;
        debug!("creating double indirect block at sector {}", double);
        let mut top = IndirectBlock::new();
        for (k, &count) in layout.secondaries.iter().enumerate() {
            let secondary = claims.claim_indirect(dev)?;
            top.push(secondary);
            top.store(dev, double)?;
            debug!(
                "creating secondary indirect block {} at sector {} covering bytes from {}",
                k,
                secondary,
                secondary_start(k)
            );

            let mut block = IndirectBlock::new();
            claims.fill(dev, &mut block, secondary, count)?;
        }
        staged.double_indirect = Some(double);
        Ok(staged)
    }
}
