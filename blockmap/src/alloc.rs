use crate::geometry::SECTOR_SIZE;
use crate::io::{BlockStorage, SectorNumber};
use std::convert::TryInto;

/// The system-wide record of which sectors are in use.
///
/// `find_and_mark` takes `&mut self`, so a claim is atomic with respect to any
/// other allocator holding the same map: two callers can never be handed the
/// same sector. A map shared between threads lives behind a `Mutex` whose
/// guard is held for the duration of each call.
pub trait FreeMap {
    /// Claims the lowest free sector, or `None` when every sector is in use.
    fn find_and_mark(&mut self) -> Option<SectorNumber>;
    /// Whether `sector` is currently marked allocated.
    fn test(&self, sector: SectorNumber) -> bool;
    /// Marks `sector` free again.
    fn clear(&mut self, sector: SectorNumber);
    /// Sectors not currently allocated.
    fn free_count(&self) -> usize;
    /// Sectors tracked by the map.
    fn capacity(&self) -> usize;
}

#[derive(Debug, PartialEq)]
pub enum State {
    Free,
    Used,
}

const BITS_PER_WORD: usize = 64;

/// Bit-per-sector free-space map. A set bit marks the sector as used.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    words: Vec<u64>,
    nbits: usize,
    free: usize,
}

impl Bitmap {
    /// A map of `nbits` sectors, all of them free.
    pub fn new(nbits: usize) -> Self {
        Self {
            words: vec![0; nbits.div_ceil(BITS_PER_WORD)],
            nbits,
            free: nbits,
        }
    }

    pub fn get(&self, sector: SectorNumber) -> State {
        assert!(sector < self.nbits, "sector {} outside of bitmap", sector);
        let word = self.words[sector / BITS_PER_WORD];
        match (word >> (sector % BITS_PER_WORD)) & 0b1 {
            0 => State::Free,
            _ => State::Used,
        }
    }

    pub fn set_reserved(&mut self, sector: SectorNumber) {
        if self.get(sector) == State::Free {
            self.words[sector / BITS_PER_WORD] |= 0b1 << (sector % BITS_PER_WORD);
            self.free -= 1;
        }
    }

    pub fn set_free(&mut self, sector: SectorNumber) {
        if self.get(sector) == State::Used {
            self.words[sector / BITS_PER_WORD] &= !(0b1 << (sector % BITS_PER_WORD));
            self.free += 1;
        }
    }

    /// Marks `count` sectors starting at `first` as used. Used for sectors the
    /// file system claims for itself at format time (boot sector, the map
    /// itself, the root directory).
    pub fn mark_reserved_range(&mut self, first: SectorNumber, count: usize) {
        for sector in first..first + count {
            self.set_reserved(sector);
        }
    }

    /// Sectors the persisted map spans on disk.
    pub fn sectors_on_disk(nbits: usize) -> usize {
        nbits.div_ceil(8).div_ceil(SECTOR_SIZE)
    }

    /// Reads a map of `nbits` sectors stored from `first_sector` onwards.
    pub fn fetch_from<D: BlockStorage>(
        dev: &mut D,
        first_sector: SectorNumber,
        nbits: usize,
    ) -> std::io::Result<Self> {
        let nsectors = Self::sectors_on_disk(nbits);
        let mut bytes = vec![0; nsectors * SECTOR_SIZE];
        for (i, chunk) in bytes.chunks_mut(SECTOR_SIZE).enumerate() {
            dev.read_sector(first_sector + i, chunk)?;
        }
        // Pad so every word can be decoded whole.
        bytes.resize(nbits.div_ceil(BITS_PER_WORD) * 8, 0);

        let mut words: Vec<u64> = bytes
            .chunks(8)
            .map(|chunk| u64::from_le_bytes(chunk.try_into().unwrap()))
            .collect();
        // Bits past the end of the map carry no meaning.
        if nbits % BITS_PER_WORD != 0 {
            if let Some(last) = words.last_mut() {
                *last &= (0b1 << (nbits % BITS_PER_WORD)) - 1;
            }
        }
        let used: usize = words.iter().map(|w| w.count_ones() as usize).sum();

        Ok(Self {
            words,
            nbits,
            free: nbits - used,
        })
    }

    /// Writes the map to disk starting at `first_sector`.
    pub fn write_back<D: BlockStorage>(
        &self,
        dev: &mut D,
        first_sector: SectorNumber,
    ) -> std::io::Result<()> {
        let nsectors = Self::sectors_on_disk(self.nbits);
        let mut bytes: Vec<u8> = self.words.iter().flat_map(|w| w.to_le_bytes()).collect();
        bytes.resize(nsectors * SECTOR_SIZE, 0);
        for (i, chunk) in bytes.chunks(SECTOR_SIZE).enumerate() {
            dev.write_sector(first_sector + i, chunk)?;
        }
        Ok(())
    }
}

impl FreeMap for Bitmap {
    fn find_and_mark(&mut self) -> Option<SectorNumber> {
        let (index, word) = self
            .words
            .iter()
            .enumerate()
            .find(|(_, w)| **w != u64::MAX)?;
        let sector = index * BITS_PER_WORD + word.trailing_ones() as usize;
        if sector >= self.nbits {
            return None;
        }
        self.set_reserved(sector);
        Some(sector)
    }

    fn test(&self, sector: SectorNumber) -> bool {
        self.get(sector) == State::Used
    }

    fn clear(&mut self, sector: SectorNumber) {
        self.set_free(sector);
    }

    fn free_count(&self) -> usize {
        self.free
    }

    fn capacity(&self) -> usize {
        self.nbits
    }
}
