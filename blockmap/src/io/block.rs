use std::path::Path;

/// The sector number to access ranging from 0 (the first sector) to n - 1 (the
/// last sector) where n is the number of sectors on the device.
pub type SectorNumber = usize;

/// Whole-sector access to the physical device.
///
/// Every transfer moves exactly one sector of `SECTOR_SIZE` bytes. The device
/// is responsible for serializing its own operations; callers only ever see a
/// completed transfer or an error.
pub trait BlockStorage {
    /// Opens a disk at the specified path. This method does not validate the
    /// sectors, it is up for clients to ensure disks are appropriately initialized.
    fn open_disk<P: AsRef<Path>>(path: P, nsectors: usize) -> std::io::Result<Self>
    where
        Self: std::marker::Sized;
    /// Reads a sector into the provided buffer.
    ///
    /// # Errors
    ///
    /// Attempting to read a sector out of range, or into a buffer smaller than
    /// a sector, will return an error.
    fn read_sector(&mut self, sector: SectorNumber, buf: &mut [u8]) -> std::io::Result<()>;
    /// Writes the provided buffer into the specified sector. Bytes past the
    /// sector boundary are ignored.
    ///
    /// # Errors
    ///
    /// Attempting to write a sector out of range will return an error.
    fn write_sector(&mut self, sector: SectorNumber, buf: &[u8]) -> std::io::Result<()>;
    /// Flush any buffered disk IO from memory. This is useful if it must guaranteed
    /// the disk writes actually occurred, for instance, if being re-read from
    /// disk.
    fn sync_disk(&mut self) -> std::io::Result<()>;
    /// Total sectors on the device.
    fn sector_count(&self) -> usize;
}
