//! The shape of a file's block map, computed from its size alone.
//!
//! Allocation first builds a [`Layout`] and only then touches the free-space
//! map, so admission control and the commit pass agree on every sector.

use crate::error::{HeaderError, Result};
use crate::geometry::{sectors_for, MAX_FILE_SIZE, NUM_DIRECT, NUM_INDIRECT, SECTOR_SIZE};

/// Where a logical block lives in the three-level block map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Slot in the header's direct array.
    Direct(usize),
    /// Slot in the single indirect block.
    Single(usize),
    /// Secondary block index within the double indirect block, then slot
    /// within that secondary block.
    Double(usize, usize),
}

impl Level {
    pub fn of(logical: usize) -> Self {
        if logical < NUM_DIRECT {
            return Level::Direct(logical);
        }
        let logical = logical - NUM_DIRECT;
        if logical < NUM_INDIRECT {
            return Level::Single(logical);
        }
        let logical = logical - NUM_INDIRECT;
        Level::Double(logical / NUM_INDIRECT, logical % NUM_INDIRECT)
    }
}

/// Byte offset of the first logical block covered by secondary block `k` of
/// the double indirect block.
pub const fn secondary_start(k: usize) -> usize {
    SECTOR_SIZE * (NUM_DIRECT + NUM_INDIRECT * (1 + k))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Requested file size in bytes.
    pub size: usize,
    /// Data sectors held in direct slots.
    pub direct: usize,
    /// Data sectors reachable through the single indirect block.
    pub single: usize,
    /// Data sectors in each secondary block of the double indirect block, in
    /// secondary index order. Empty when no double indirect block is needed.
    pub secondaries: Vec<usize>,
}

impl Layout {
    /// Plans the block map for a file of `size` bytes.
    pub fn for_size(size: usize) -> Result<Self> {
        if size > MAX_FILE_SIZE {
            return Err(HeaderError::TooLarge {
                requested: size,
                max: MAX_FILE_SIZE,
            });
        }

        let mut remaining = sectors_for(size);
        let direct = remaining.min(NUM_DIRECT);
        remaining -= direct;
        let single = remaining.min(NUM_INDIRECT);
        remaining -= single;

        let mut secondaries = Vec::with_capacity(remaining.div_ceil(NUM_INDIRECT));
        while remaining > 0 {
            let take = remaining.min(NUM_INDIRECT);
            secondaries.push(take);
            remaining -= take;
        }

        Ok(Self {
            size,
            direct,
            single,
            secondaries,
        })
    }

    pub fn data_sectors(&self) -> usize {
        self.direct + self.single + self.secondaries.iter().sum::<usize>()
    }

    pub fn needs_single_indirect(&self) -> bool {
        self.single > 0
    }

    pub fn needs_double_indirect(&self) -> bool {
        !self.secondaries.is_empty()
    }

    /// Sectors spent on index blocks rather than data: the single indirect
    /// block, the double indirect block and each of its secondaries.
    pub fn index_sectors(&self) -> usize {
        let single = usize::from(self.needs_single_indirect());
        let double = if self.needs_double_indirect() {
            1 + self.secondaries.len()
        } else {
            0
        };
        single + double
    }

    /// Every sector the file claims from the free-space map.
    pub fn sectors_needed(&self) -> usize {
        self.data_sectors() + self.index_sectors()
    }
}

/// Total sectors, data and index, a file of `size` bytes needs.
pub fn sectors_needed(size: usize) -> Result<usize> {
    Ok(Layout::for_size(size)?.sectors_needed())
}
