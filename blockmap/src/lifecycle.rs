//! The create, open and remove paths a file system drives this crate through.
//!
//! A file is identified by the sector holding its header. Directories and
//! open-file bookkeeping live above this layer.

use crate::alloc::FreeMap;
use crate::error::{HeaderError, Result};
use crate::header::FileHeader;
use crate::io::{BlockStorage, SectorNumber};
use crate::layout::sectors_needed;

/// Creates a file of `size` bytes: claims a sector for its header, allocates
/// its block map and writes the header out.
///
/// Admission covers the header sector too. On failure nothing stays claimed.
pub fn create<D: BlockStorage, M: FreeMap>(
    dev: &mut D,
    free_map: &mut M,
    size: usize,
) -> Result<(SectorNumber, FileHeader)> {
    let needed = sectors_needed(size)? + 1;
    let free = free_map.free_count();
    if free < needed {
        return Err(HeaderError::OutOfSpace { needed, free });
    }

    let sector = free_map
        .find_and_mark()
        .ok_or(HeaderError::OutOfSpace { needed, free: 0 })?;

    let mut header = FileHeader::new();
    let stored = header
        .allocate(dev, free_map, size)
        .and_then(|()| header.store(dev, sector));
    if let Err(e) = stored {
        if !header.is_empty() {
            if let Err(cleanup) = header.deallocate(dev, free_map) {
                warn!(
                    "could not release blocks of unwritten header at sector {}: {}",
                    sector, cleanup
                );
            }
        }
        free_map.clear(sector);
        return Err(e);
    }

    info!("created {} byte file with header at sector {}", size, sector);
    Ok((sector, header))
}

/// Loads the header of the file whose header lives at `sector`.
pub fn open<D: BlockStorage>(dev: &mut D, sector: SectorNumber) -> Result<FileHeader> {
    FileHeader::fetch(dev, sector)
}

/// Removes the file whose header lives at `sector`, releasing its data and
/// index sectors and then the header sector itself.
pub fn remove<D: BlockStorage, M: FreeMap>(
    dev: &mut D,
    free_map: &mut M,
    sector: SectorNumber,
) -> Result<()> {
    let mut header = FileHeader::fetch(dev, sector)?;
    header.deallocate(dev, free_map)?;

    assert!(
        free_map.test(sector),
        "header sector {} released while not marked allocated",
        sector
    );
    free_map.clear(sector);
    info!("removed file with header at sector {}", sector);
    Ok(())
}
