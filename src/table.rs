use std::fmt;
use std::io::{Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::FatError;
use crate::layout::{FatVariant, Layout};

/// Classification of a raw FAT entry value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterStatus {
    Free,
    Reserved,
    Bad,
    EndOfChain,
    Next(u32),
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterStatus::Free => f.write_str("free"),
            ClusterStatus::Reserved => f.write_str("reserved"),
            ClusterStatus::Bad => f.write_str("marked bad"),
            ClusterStatus::EndOfChain => f.write_str("end-of-chain"),
            ClusterStatus::Next(c) => write!(f, "a link to cluster {c}"),
        }
    }
}

/// Classify a raw FAT entry value for the given variant.
pub fn classify_entry(raw: u32, variant: FatVariant) -> ClusterStatus {
    match raw {
        0 => return ClusterStatus::Free,
        1 => return ClusterStatus::Reserved,
        _ => {}
    }
    match variant {
        FatVariant::Fat12 => match raw {
            0xFF6 => ClusterStatus::Reserved,
            0xFF7 => ClusterStatus::Bad,
            v if v >= 0xFF8 => ClusterStatus::EndOfChain,
            v => ClusterStatus::Next(v),
        },
        FatVariant::Fat16 => match raw {
            0xFFF6 => ClusterStatus::Reserved,
            0xFFF7 => ClusterStatus::Bad,
            v if v >= 0xFFF8 => ClusterStatus::EndOfChain,
            v => ClusterStatus::Next(v),
        },
        FatVariant::Fat32 => match raw {
            0x0FFF_FFF6 => ClusterStatus::Reserved,
            0x0FFF_FFF7 => ClusterStatus::Bad,
            v if v >= 0x0FFF_FFF8 => ClusterStatus::EndOfChain,
            v => ClusterStatus::Next(v),
        },
    }
}

/// Byte offset of `cluster`'s FAT entry, relative to the volume start.
///
/// FAT12 entries are 12 bits packed in pairs across 3 bytes; the entry for
/// cluster `c` starts in the byte at `c + c/2`, and the two-byte read may
/// straddle a sector boundary.
pub(crate) fn entry_byte_offset(layout: &Layout, variant: FatVariant, cluster: u32) -> u64 {
    let fat_offset = match variant {
        FatVariant::Fat12 => u64::from(cluster) + u64::from(cluster / 2),
        FatVariant::Fat16 => u64::from(cluster) * 2,
        FatVariant::Fat32 => u64::from(cluster) * 4,
    };
    layout.fat_region_byte() + fat_offset
}

/// Read the FAT entry for `cluster`: the raw value and its classification.
pub(crate) fn read_entry<R: Read + Seek>(
    reader: &mut R,
    base_offset: u64,
    layout: &Layout,
    variant: FatVariant,
    cluster: u32,
) -> Result<(u32, ClusterStatus), FatError> {
    reader.seek(SeekFrom::Start(
        base_offset + entry_byte_offset(layout, variant, cluster),
    ))?;

    let raw = match variant {
        FatVariant::Fat12 => {
            let packed = reader.read_u16::<LittleEndian>()?;
            if cluster & 1 == 1 {
                u32::from(packed >> 4)
            } else {
                u32::from(packed & 0x0FFF)
            }
        }
        FatVariant::Fat16 => u32::from(reader.read_u16::<LittleEndian>()?),
        FatVariant::Fat32 => reader.read_u32::<LittleEndian>()? & 0x0FFF_FFFF,
    };

    Ok((raw, classify_entry(raw, variant)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn small_layout() -> Layout {
        Layout {
            bytes_per_sector: 512,
            sectors_per_cluster: 1,
            reserved_sectors: 1,
            num_fats: 2,
            root_entry_count: 224,
            total_sectors: 2880,
            fat_size: 9,
        }
    }

    /// Image with a FAT region whose raw bytes we control directly.
    fn image_with_fat(fat: &[u8]) -> Cursor<Vec<u8>> {
        let mut img = vec![0u8; 512 + fat.len()];
        img[512..].copy_from_slice(fat);
        Cursor::new(img)
    }

    #[test]
    fn test_fat12_even_and_odd_entries() {
        // Clusters 2 and 3 share bytes 3..6 of the FAT: entry 2 is the low
        // 12 bits of bytes 3-4, entry 3 the high 12 bits of bytes 4-5.
        let mut fat = vec![0u8; 16];
        fat[3] = 0x34;
        fat[4] = 0x52; // entry 2 = 0x234, entry 3 starts with nibble 5
        fat[5] = 0x67; // entry 3 = 0x675
        let l = small_layout();
        let mut img = image_with_fat(&fat);

        let (raw, status) = read_entry(&mut img, 0, &l, FatVariant::Fat12, 2).unwrap();
        assert_eq!(raw, 0x234);
        assert_eq!(status, ClusterStatus::Next(0x234));

        let (raw, status) = read_entry(&mut img, 0, &l, FatVariant::Fat12, 3).unwrap();
        assert_eq!(raw, 0x675);
        assert_eq!(status, ClusterStatus::Next(0x675));
    }

    #[test]
    fn test_fat12_entry_straddles_sector_boundary() {
        // Cluster 341 (odd): fat_offset = 341 + 170 = 511, so the two-byte
        // read spans the last byte of FAT sector 0 and the first byte of
        // FAT sector 1.
        let mut fat = vec![0u8; 1024];
        fat[511] = 0xA0; // low nibble of byte 511 belongs to entry 340
        fat[512] = 0xBC; // entry 341 = 0xBCA
        let l = small_layout();
        let mut img = image_with_fat(&fat);

        let (raw, _) = read_entry(&mut img, 0, &l, FatVariant::Fat12, 341).unwrap();
        assert_eq!(raw, 0xBCA);
    }

    #[test]
    fn test_fat16_entry() {
        let mut fat = vec![0u8; 16];
        fat[4..6].copy_from_slice(&0x1234u16.to_le_bytes());
        let l = small_layout();
        let mut img = image_with_fat(&fat);

        let (raw, status) = read_entry(&mut img, 0, &l, FatVariant::Fat16, 2).unwrap();
        assert_eq!(raw, 0x1234);
        assert_eq!(status, ClusterStatus::Next(0x1234));
    }

    #[test]
    fn test_fat32_entry_masks_reserved_bits() {
        let mut fat = vec![0u8; 16];
        fat[8..12].copy_from_slice(&0xF000_0007u32.to_le_bytes());
        let l = small_layout();
        let mut img = image_with_fat(&fat);

        let (raw, status) = read_entry(&mut img, 0, &l, FatVariant::Fat32, 2).unwrap();
        assert_eq!(raw, 7);
        assert_eq!(status, ClusterStatus::Next(7));
    }

    #[test]
    fn test_classify_fat12_sentinels() {
        assert_eq!(classify_entry(0, FatVariant::Fat12), ClusterStatus::Free);
        assert_eq!(classify_entry(1, FatVariant::Fat12), ClusterStatus::Reserved);
        assert_eq!(classify_entry(0xFF6, FatVariant::Fat12), ClusterStatus::Reserved);
        assert_eq!(classify_entry(0xFF7, FatVariant::Fat12), ClusterStatus::Bad);
        assert_eq!(classify_entry(0xFF8, FatVariant::Fat12), ClusterStatus::EndOfChain);
        assert_eq!(classify_entry(0xFFF, FatVariant::Fat12), ClusterStatus::EndOfChain);
        assert_eq!(classify_entry(0x123, FatVariant::Fat12), ClusterStatus::Next(0x123));
    }

    #[test]
    fn test_classify_fat16_sentinels() {
        assert_eq!(classify_entry(0xFFF6, FatVariant::Fat16), ClusterStatus::Reserved);
        assert_eq!(classify_entry(0xFFF7, FatVariant::Fat16), ClusterStatus::Bad);
        assert_eq!(classify_entry(0xFFF8, FatVariant::Fat16), ClusterStatus::EndOfChain);
        assert_eq!(
            classify_entry(0x1234, FatVariant::Fat16),
            ClusterStatus::Next(0x1234)
        );
    }

    #[test]
    fn test_classify_fat32_sentinels() {
        assert_eq!(
            classify_entry(0x0FFF_FFF6, FatVariant::Fat32),
            ClusterStatus::Reserved
        );
        assert_eq!(
            classify_entry(0x0FFF_FFF7, FatVariant::Fat32),
            ClusterStatus::Bad
        );
        assert_eq!(
            classify_entry(0x0FFF_FFF8, FatVariant::Fat32),
            ClusterStatus::EndOfChain
        );
        assert_eq!(
            classify_entry(0x0FFF_FFFF, FatVariant::Fat32),
            ClusterStatus::EndOfChain
        );
        assert_eq!(
            classify_entry(0x0012_3456, FatVariant::Fat32),
            ClusterStatus::Next(0x0012_3456)
        );
    }
}
