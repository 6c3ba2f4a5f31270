//! Disk geometry and the capacities derived from it.
//!
//! Every on-disk record in this crate occupies exactly one sector. The number
//! of pointers each record carries is derived from the sector size and the
//! width of a pointer rather than tuned by hand.

use static_assertions::const_assert;
use std::mem::size_of;

/// Bytes per sector. The unit of every device read and write.
pub const SECTOR_SIZE: usize = 128;
pub const SECTORS_PER_TRACK: usize = 32;
pub const NUM_TRACKS: usize = 32;
/// Sectors on a default-sized disk.
pub const NUM_SECTORS: usize = SECTORS_PER_TRACK * NUM_TRACKS;

/// Width of a sector pointer as stored on disk (`i32`, little endian).
pub const POINTER_SIZE: usize = size_of::<i32>();

/// Scalar fields in a file header: byte length, sector count, single
/// indirect, double indirect and the reserved self sector.
const HEADER_SCALARS: usize = 5;
/// Scalar fields in an indirect block: its entry count.
const INDIRECT_SCALARS: usize = 1;

/// Direct pointers that fit in a file header alongside its scalar fields.
pub const NUM_DIRECT: usize = (SECTOR_SIZE - HEADER_SCALARS * POINTER_SIZE) / POINTER_SIZE;
/// Pointers held by one indirect block.
pub const NUM_INDIRECT: usize = (SECTOR_SIZE - INDIRECT_SCALARS * POINTER_SIZE) / POINTER_SIZE;

/// Logical blocks addressable through the single indirect block.
pub const SINGLE_INDIRECT_BLOCKS: usize = NUM_INDIRECT;
/// Logical blocks addressable through the double indirect block.
pub const DOUBLE_INDIRECT_BLOCKS: usize = NUM_INDIRECT * NUM_INDIRECT;

/// Largest number of data blocks a single file can own.
pub const MAX_FILE_BLOCKS: usize = NUM_DIRECT + SINGLE_INDIRECT_BLOCKS + DOUBLE_INDIRECT_BLOCKS;
/// Largest file, in bytes.
pub const MAX_FILE_SIZE: usize = MAX_FILE_BLOCKS * SECTOR_SIZE;

const_assert!(NUM_DIRECT > 0);
const_assert!(NUM_INDIRECT > 0);
const_assert!((HEADER_SCALARS + NUM_DIRECT) * POINTER_SIZE <= SECTOR_SIZE);
const_assert!((INDIRECT_SCALARS + NUM_INDIRECT) * POINTER_SIZE <= SECTOR_SIZE);
// On-disk pointers are i32, so every sector number must be representable.
const_assert!(NUM_SECTORS <= i32::MAX as usize);

/// Number of sectors needed to hold `bytes` bytes.
pub const fn sectors_for(bytes: usize) -> usize {
    bytes.div_ceil(SECTOR_SIZE)
}
