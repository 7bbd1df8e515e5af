use std::io::{Read, Seek, SeekFrom};

use log::debug;

use crate::bpb::BiosParameterBlock;
use crate::dir;
use crate::error::FatError;
use crate::layout::{classify, FatVariant, Layout};
use crate::record::{pretty_short_name, render_short_name, Attributes, ShortEntry};
use crate::table::{self, ClusterStatus};

/// A mounted read-only FAT volume over a seekable byte source.
///
/// The source's cursor is owned by the volume: every traversal seeks and
/// reads it, so operations cannot be interleaved mid-flight. Each call
/// performs a fresh walk of the on-disk structures; nothing is cached.
pub struct Volume<R> {
    reader: R,
    /// Byte offset of the volume within the reader (0 for a bare image).
    base_offset: u64,
    bpb: BiosParameterBlock,
    layout: Layout,
    variant: FatVariant,
}

/// Handle to a directory: either the fixed FAT12/16 root region or a
/// cluster chain.
#[derive(Debug, Clone, Copy)]
pub struct Directory {
    location: DirLocation,
}

#[derive(Debug, Clone, Copy)]
enum DirLocation {
    /// FAT12/16 root: a fixed run of sectors after the FATs, no chain.
    FixedRoot,
    Chain(u32),
}

/// A directory entry: regular file, subdirectory, or volume label.
#[derive(Debug, Clone)]
pub struct FatFile {
    short_name: [u8; 11],
    long_name: Option<String>,
    attributes: Attributes,
    first_cluster: u32,
    size: u32,
}

impl FatFile {
    pub(crate) fn from_entry(
        entry: &ShortEntry,
        long_name: Option<String>,
        variant: FatVariant,
    ) -> Self {
        FatFile {
            short_name: entry.name,
            long_name,
            attributes: entry.attributes,
            first_cluster: entry.first_cluster(variant),
            size: entry.size,
        }
    }

    /// The 8.3 name, verbatim: space padding kept, no dot inserted, a
    /// leading 0x05 rendered as 0xE5.
    pub fn name_short(&self) -> String {
        render_short_name(&self.short_name)
    }

    /// The reassembled long name, when the entry carries one.
    pub fn name_long(&self) -> Option<&str> {
        self.long_name.as_deref()
    }

    /// Presentation name: the long name when present, otherwise the 8.3
    /// name trimmed and dot-joined ("README.TXT").
    pub fn display_name(&self) -> String {
        match &self.long_name {
            Some(name) => name.clone(),
            None => pretty_short_name(&self.short_name),
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn attributes(&self) -> Attributes {
        self.attributes
    }

    pub fn is_directory(&self) -> bool {
        self.attributes.directory()
    }

    pub fn first_cluster(&self) -> u32 {
        self.first_cluster
    }
}

impl<R: Read + Seek> Volume<R> {
    /// Mount a FAT volume starting at byte 0 of the reader.
    pub fn mount(reader: R) -> Result<Self, FatError> {
        Self::mount_at(reader, 0)
    }

    /// Mount a FAT volume embedded at `base_offset` within the reader
    /// (e.g. a partition inside a whole-disk image).
    pub fn mount_at(mut reader: R, base_offset: u64) -> Result<Self, FatError> {
        let bpb = BiosParameterBlock::decode(&mut reader, base_offset)?;
        let layout = Layout::from_bpb(&bpb);
        let variant = classify(layout.cluster_count());

        debug!(
            "mounted {} volume: {} clusters of {} bytes, {} reserved + {}x{} FAT sectors",
            variant,
            layout.cluster_count(),
            layout.cluster_bytes(),
            layout.reserved_sectors,
            layout.num_fats,
            layout.fat_size,
        );

        Ok(Volume {
            reader,
            base_offset,
            bpb,
            layout,
            variant,
        })
    }

    pub fn variant(&self) -> FatVariant {
        self.variant
    }

    pub fn bpb(&self) -> &BiosParameterBlock {
        &self.bpb
    }

    /// Volume label from the extended BPB block. Empty and "NO NAME"
    /// labels map to `None`.
    pub fn volume_label(&self) -> Option<String> {
        let raw = self.bpb.volume_label_raw();
        let label = String::from_utf8_lossy(raw).trim_end().to_string();
        if label.is_empty() || label == "NO NAME" {
            None
        } else {
            Some(label)
        }
    }

    /// Total volume size in bytes.
    pub fn total_size(&self) -> u64 {
        u64::from(self.layout.total_sectors) * u64::from(self.layout.bytes_per_sector)
    }

    /// Number of data clusters.
    pub fn cluster_count(&self) -> u32 {
        self.layout.cluster_count()
    }

    /// Handle to the root directory.
    pub fn root(&self) -> Directory {
        match self.bpb.root_cluster() {
            Some(cluster) => Directory {
                location: DirLocation::Chain(cluster),
            },
            None => Directory {
                location: DirLocation::FixedRoot,
            },
        }
    }

    /// List a directory, in on-disk order.
    pub fn entries(&mut self, dir: &Directory) -> Result<Vec<FatFile>, FatError> {
        let data = self.read_directory_data(dir.location)?;
        Ok(dir::parse_stream(&data, self.variant))
    }

    /// List the entries of a directory entry.
    pub fn children(&mut self, file: &FatFile) -> Result<Vec<FatFile>, FatError> {
        if !file.is_directory() {
            return Err(FatError::NotADirectory(file.display_name()));
        }
        // A ".." entry pointing at the root stores cluster 0.
        let dir = if file.first_cluster < 2 {
            self.root()
        } else {
            Directory {
                location: DirLocation::Chain(file.first_cluster),
            }
        };
        self.entries(&dir)
    }

    /// Read a regular file's contents, exactly `size()` bytes.
    pub fn read(&mut self, file: &FatFile) -> Result<Vec<u8>, FatError> {
        if file.is_directory() {
            return Err(FatError::IsADirectory(file.display_name()));
        }

        let size = u64::from(file.size);
        if size == 0 {
            // A zero-length file has no chain; its first-cluster field is
            // typically 0 and must not be dereferenced.
            return Ok(Vec::new());
        }

        let mut cluster = file.first_cluster;
        if cluster < 2 {
            return Err(FatError::BrokenChain {
                cluster,
                status: table::classify_entry(cluster, self.variant),
            });
        }

        let cluster_bytes = u64::from(self.layout.cluster_bytes());
        let mut data = Vec::with_capacity(file.size as usize);

        loop {
            let remaining = size - data.len() as u64;
            let take = remaining.min(cluster_bytes) as usize;
            let offset = self.base_offset + self.layout.byte_offset_of_cluster(cluster);
            self.read_exact_at(offset, take, &mut data)?;

            if data.len() as u64 == size {
                // Declared size satisfied; any trailing chain links are
                // slack and are not followed.
                return Ok(data);
            }

            cluster = match self.next_cluster(cluster)? {
                (_, ClusterStatus::Next(next)) => next,
                (_, ClusterStatus::EndOfChain) => {
                    return Err(FatError::ShortFile {
                        expected: size,
                        actual: data.len() as u64,
                    })
                }
                (_, status) => return Err(FatError::BrokenChain { cluster, status }),
            };
        }
    }

    /// FAT entry for `cluster`, with range checking on forward links.
    fn next_cluster(&mut self, cluster: u32) -> Result<(u32, ClusterStatus), FatError> {
        let (raw, status) = table::read_entry(
            &mut self.reader,
            self.base_offset,
            &self.layout,
            self.variant,
            cluster,
        )?;
        if let ClusterStatus::Next(next) = status {
            if next > self.layout.max_cluster() {
                return Err(FatError::BrokenChain { cluster, status });
            }
        }
        Ok((raw, status))
    }

    /// Raw bytes of a directory: the fixed root region, or the whole
    /// cluster chain.
    fn read_directory_data(&mut self, location: DirLocation) -> Result<Vec<u8>, FatError> {
        match location {
            DirLocation::FixedRoot => {
                let offset = self.base_offset + self.layout.root_region_byte();
                let len = self.layout.root_region_len() as usize;
                let mut data = Vec::with_capacity(len);
                self.read_exact_at(offset, len, &mut data)?;
                Ok(data)
            }
            DirLocation::Chain(first) => self.read_cluster_chain(first),
        }
    }

    /// Follow a cluster chain to its end and collect the data bytes.
    ///
    /// A chain cannot be longer than the volume has clusters; walking past
    /// that is a cycle and fails like any other broken link.
    fn read_cluster_chain(&mut self, first: u32) -> Result<Vec<u8>, FatError> {
        let mut cluster = first;
        if cluster < 2 {
            return Err(FatError::BrokenChain {
                cluster,
                status: table::classify_entry(cluster, self.variant),
            });
        }

        let cluster_bytes = self.layout.cluster_bytes() as usize;
        let mut data = Vec::new();
        let mut walked = 0u32;

        loop {
            let offset = self.base_offset + self.layout.byte_offset_of_cluster(cluster);
            self.read_exact_at(offset, cluster_bytes, &mut data)?;

            walked += 1;
            if walked > self.layout.cluster_count() {
                return Err(FatError::BrokenChain {
                    cluster,
                    status: ClusterStatus::Next(cluster),
                });
            }

            cluster = match self.next_cluster(cluster)? {
                (_, ClusterStatus::Next(next)) => next,
                (_, ClusterStatus::EndOfChain) => return Ok(data),
                (_, status) => return Err(FatError::BrokenChain { cluster, status }),
            };
        }
    }

    /// Seek to `offset` and append exactly `len` bytes to `data`.
    fn read_exact_at(
        &mut self,
        offset: u64,
        len: usize,
        data: &mut Vec<u8>,
    ) -> Result<(), FatError> {
        self.reader.seek(SeekFrom::Start(offset))?;
        let start = data.len();
        data.resize(start + len, 0);
        self.reader.read_exact(&mut data[start..])?;
        Ok(())
    }
}
