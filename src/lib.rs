//! Read-only FAT12/FAT16/FAT32 volume browser.
//!
//! Mounts a volume image presented as any `Read + Seek` source, exposes the
//! directory hierarchy and file contents, and never writes. The variant is
//! decided by cluster count alone, per the on-disk format's rules.
//!
//! ```no_run
//! use std::fs::File;
//! use fatwalk::Volume;
//!
//! # fn main() -> Result<(), fatwalk::FatError> {
//! let image = File::open("floppy.img")?;
//! let mut volume = Volume::mount(image)?;
//! let root = volume.root();
//! for entry in volume.entries(&root)? {
//!     println!("{} ({} bytes)", entry.display_name(), entry.size());
//! }
//! # Ok(())
//! # }
//! ```

mod bpb;
mod dir;
mod error;
mod layout;
mod record;
mod table;
mod volume;

pub use bpb::{BiosParameterBlock, ExtendedBpb, Fat32Ext, LegacyExt};
pub use error::FatError;
pub use layout::{classify, FatVariant, Layout, FAT12_CLUSTER_LIMIT, FAT16_CLUSTER_LIMIT};
pub use record::Attributes;
pub use table::{classify_entry, ClusterStatus};
pub use volume::{Directory, FatFile, Volume};
