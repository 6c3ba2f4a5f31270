use crate::geometry::SECTOR_SIZE;
use crate::io::{BlockStorage, SectorNumber};
use std::fs::{File, OpenOptions};
use std::io::prelude::*;
use std::io::{BufWriter, ErrorKind, SeekFrom};
use std::path::Path;

/// Emulates a sector-addressed disk in userspace using a regular file as the
/// medium. This is only meant to be used for file system development and testing.
pub struct SectorEmulator {
    /// The file must be a fixed-size file some exact multiple of the sector size.
    fd: File,
    /// The total number of sectors available in the file store.
    sector_count: usize,
}

impl SectorEmulator {
    /// Returns ownership of the underlying file descriptor to the caller.
    pub fn into_file(self) -> File {
        self.fd
    }

    fn check_range(&self, sector: SectorNumber) -> std::io::Result<()> {
        if sector >= self.sector_count {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("sector {} out of range (disk has {})", sector, self.sector_count),
            ));
        }
        Ok(())
    }
}

impl BlockStorage for SectorEmulator {
    fn open_disk<P: AsRef<Path>>(dest: P, nsectors: usize) -> std::io::Result<Self>
    where
        Self: std::marker::Sized,
    {
        // Return error if the file does not exist rather than create one.
        let file = OpenOptions::new().read(true).write(true).open(dest)?;
        Ok(SectorEmulator {
            fd: file,
            sector_count: nsectors,
        })
    }

    fn read_sector(&mut self, sector: SectorNumber, buf: &mut [u8]) -> std::io::Result<()> {
        self.check_range(sector)?;
        if buf.len() < SECTOR_SIZE {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "buffer does not contain enough space to read sector",
            ));
        }
        self.fd
            .seek(SeekFrom::Start((sector * SECTOR_SIZE) as u64))?;
        self.fd.read_exact(&mut buf[..SECTOR_SIZE])
    }

    /// This method truncates writes that exceed the sector size.
    fn write_sector(&mut self, sector: SectorNumber, buf: &[u8]) -> std::io::Result<()> {
        self.check_range(sector)?;
        self.fd
            .seek(SeekFrom::Start((sector * SECTOR_SIZE) as u64))?;

        let max = SECTOR_SIZE.min(buf.len());
        self.fd.write_all(&buf[..max])
    }

    fn sync_disk(&mut self) -> std::io::Result<()> {
        self.fd.sync_all()
    }

    fn sector_count(&self) -> usize {
        self.sector_count
    }
}

pub struct SectorEmulatorBuilder {
    fd: File,
    sector_count: usize,
    clear_medium: bool,
}

impl From<File> for SectorEmulatorBuilder {
    fn from(fd: File) -> Self {
        SectorEmulatorBuilder {
            fd,
            sector_count: crate::geometry::NUM_SECTORS,
            clear_medium: true,
        }
    }
}

impl SectorEmulatorBuilder {
    /// Sets the number of sectors on the emulated device.
    pub fn with_sector_count(mut self, sectors: usize) -> Self {
        self.sector_count = sectors;
        self
    }

    /// Whether `build` zeroes the medium. Disable it to reopen a disk that
    /// already holds data.
    pub fn clear_medium(mut self, clear: bool) -> Self {
        self.clear_medium = clear;
        self
    }

    /// This builder assumes ownership of the file descriptor used and, unless
    /// told otherwise, zeroes it to prepare the file for use.
    pub fn build(mut self) -> std::io::Result<SectorEmulator> {
        if self.sector_count == 0 {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "emulated disk needs at least one sector",
            ));
        }
        if self.clear_medium {
            self.zero_medium()?;
        }
        Ok(SectorEmulator {
            fd: self.fd,
            sector_count: self.sector_count,
        })
    }

    fn zero_medium(&mut self) -> std::io::Result<()> {
        self.fd.seek(SeekFrom::Start(0))?;
        let mut bfd = BufWriter::new(&self.fd);
        // Buffer each sector write to prevent excessive syscalls.
        let zeroes = [0x00; SECTOR_SIZE];
        for _ in 0..self.sector_count {
            bfd.write_all(&zeroes)?;
        }
        bfd.flush()
    }
}
