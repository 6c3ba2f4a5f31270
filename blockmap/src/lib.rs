//! Per-file block maps for a sector-addressed file system.
//!
//! A [`FileHeader`] occupies one sector and maps a file's logical blocks onto
//! physical sectors through direct slots, a single indirect block and a double
//! indirect block. Sectors are drawn from and returned to a [`FreeMap`]; all
//! device access goes through [`BlockStorage`].
//!
//! # Layout of a header sector
//! ===========================================================================================
//! | byte length | sector count | direct[NUM_DIRECT] | single indirect | double indirect | self |
//! ===========================================================================================

#[macro_use]
extern crate log;

pub mod alloc;
mod allocate;
mod deallocate;
mod error;
pub mod geometry;
mod header;
mod indirect;
pub mod io;
pub mod layout;
pub mod lifecycle;
mod translate;

pub use crate::alloc::{Bitmap, FreeMap, State};
pub use crate::error::{HeaderError, Result};
pub use crate::header::FileHeader;
pub use crate::indirect::IndirectBlock;
pub use crate::io::{BlockStorage, SectorNumber};
pub use crate::layout::Layout;
