use std::io::{Read, Seek, SeekFrom};

use crate::error::FatError;
use crate::layout::{classify, FatVariant, Layout};

/// Normalized BIOS Parameter Block from sector 0.
///
/// The first 36 bytes are common to all FAT variants. The bytes after that
/// are either the FAT12/16 extended block or the FAT32 extended block, and
/// which one cannot be told from the header itself: the variant is decided
/// by cluster count, which needs the FAT32 `fat_size_32` field as a
/// candidate. Decoding therefore runs in two passes: parse the buffer as
/// FAT32 first, classify, and reinterpret the tail if the volume turns out
/// to be FAT12/16.
#[derive(Debug, Clone)]
pub struct BiosParameterBlock {
    pub oem_name: [u8; 8],
    /// One of 512, 1024, 2048, 4096.
    pub bytes_per_sector: u16,
    /// Power of two, >= 1.
    pub sectors_per_cluster: u8,
    /// Sectors before the first FAT, >= 1.
    pub reserved_sectors: u16,
    /// Number of FAT copies (typically 2).
    pub num_fats: u8,
    /// Fixed root directory slots (FAT12/16); 0 on FAT32.
    pub root_entry_count: u16,
    pub media: u8,
    pub total_sectors_16: u16,
    pub total_sectors_32: u32,
    pub fat_size_16: u16,
    /// Variant-specific trailing block.
    pub ext: ExtendedBpb,
}

/// The part of the BPB whose layout depends on the FAT variant.
#[derive(Debug, Clone)]
pub enum ExtendedBpb {
    Fat12_16(LegacyExt),
    Fat32(Fat32Ext),
}

/// FAT12/16 extended block (bytes 36..62).
#[derive(Debug, Clone)]
pub struct LegacyExt {
    pub drive_number: u8,
    pub boot_signature: u8,
    pub volume_serial: u32,
    pub volume_label: [u8; 11],
    pub fs_type_label: [u8; 8],
}

/// FAT32 extended block (bytes 36..90).
#[derive(Debug, Clone)]
pub struct Fat32Ext {
    pub fat_size_32: u32,
    pub ext_flags: u16,
    pub fs_version: u16,
    /// First cluster of the root directory.
    pub root_cluster: u32,
    pub fs_info_sector: u16,
    pub backup_boot_sector: u16,
    pub drive_number: u8,
    pub boot_signature: u8,
    pub volume_serial: u32,
    pub volume_label: [u8; 11],
    pub fs_type_label: [u8; 8],
}

impl BiosParameterBlock {
    /// Decode and validate the BPB at `base_offset` within the reader.
    pub fn decode<R: Read + Seek>(
        reader: &mut R,
        base_offset: u64,
    ) -> Result<Self, FatError> {
        reader.seek(SeekFrom::Start(base_offset))?;
        let mut sector = [0u8; 512];
        reader.read_exact(&mut sector)?;

        let mut oem_name = [0u8; 8];
        oem_name.copy_from_slice(&sector[3..11]);

        let bytes_per_sector = u16::from_le_bytes([sector[11], sector[12]]);
        if !matches!(bytes_per_sector, 512 | 1024 | 2048 | 4096) {
            return Err(FatError::MalformedBpb(format!(
                "invalid bytes per sector: {bytes_per_sector}"
            )));
        }

        let sectors_per_cluster = sector[13];
        if !sectors_per_cluster.is_power_of_two() {
            return Err(FatError::MalformedBpb(format!(
                "invalid sectors per cluster: {sectors_per_cluster}"
            )));
        }

        let reserved_sectors = u16::from_le_bytes([sector[14], sector[15]]);
        if reserved_sectors == 0 {
            return Err(FatError::MalformedBpb(
                "reserved sector count is zero".into(),
            ));
        }

        let num_fats = sector[16];
        let root_entry_count = u16::from_le_bytes([sector[17], sector[18]]);
        let total_sectors_16 = u16::from_le_bytes([sector[19], sector[20]]);
        let media = sector[21];
        let fat_size_16 = u16::from_le_bytes([sector[22], sector[23]]);
        let total_sectors_32 =
            u32::from_le_bytes([sector[32], sector[33], sector[34], sector[35]]);

        if total_sectors_16 == 0 && total_sectors_32 == 0 {
            return Err(FatError::MalformedBpb("total sector count is zero".into()));
        }

        // First pass: assume FAT32 so fat_size_32 is available for
        // classification. fat_size_16 takes precedence when nonzero, so a
        // FAT12/16 volume never actually consumes these bytes.
        let fat_size_32 = u32::from_le_bytes([sector[36], sector[37], sector[38], sector[39]]);
        if fat_size_16 == 0 && fat_size_32 == 0 {
            return Err(FatError::MalformedBpb("FAT size is zero".into()));
        }

        let mut bpb = BiosParameterBlock {
            oem_name,
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors,
            num_fats,
            root_entry_count,
            media,
            total_sectors_16,
            total_sectors_32,
            fat_size_16,
            ext: ExtendedBpb::Fat32(parse_fat32_ext(&sector)),
        };

        // Second pass: classify, and reinterpret the tail for FAT12/16.
        let layout = Layout::from_bpb(&bpb);
        match classify(layout.cluster_count()) {
            FatVariant::Fat32 => {}
            FatVariant::Fat12 | FatVariant::Fat16 => {
                bpb.ext = ExtendedBpb::Fat12_16(parse_legacy_ext(&sector));
            }
        }

        Ok(bpb)
    }

    /// Sectors per FAT, unified from the 16-bit and 32-bit fields.
    pub fn fat_size_sectors(&self) -> u32 {
        if self.fat_size_16 != 0 {
            return u32::from(self.fat_size_16);
        }
        match &self.ext {
            ExtendedBpb::Fat32(ext) => ext.fat_size_32,
            ExtendedBpb::Fat12_16(_) => 0,
        }
    }

    /// Total sectors on the volume, unified from the 16-bit and 32-bit fields.
    pub fn total_sector_count(&self) -> u32 {
        if self.total_sectors_16 != 0 {
            u32::from(self.total_sectors_16)
        } else {
            self.total_sectors_32
        }
    }

    /// Root directory cluster (FAT32 only).
    pub fn root_cluster(&self) -> Option<u32> {
        match &self.ext {
            ExtendedBpb::Fat32(ext) => Some(ext.root_cluster),
            ExtendedBpb::Fat12_16(_) => None,
        }
    }

    pub fn volume_label_raw(&self) -> &[u8; 11] {
        match &self.ext {
            ExtendedBpb::Fat32(ext) => &ext.volume_label,
            ExtendedBpb::Fat12_16(ext) => &ext.volume_label,
        }
    }

    pub fn volume_serial(&self) -> u32 {
        match &self.ext {
            ExtendedBpb::Fat32(ext) => ext.volume_serial,
            ExtendedBpb::Fat12_16(ext) => ext.volume_serial,
        }
    }
}

fn parse_fat32_ext(sector: &[u8; 512]) -> Fat32Ext {
    let mut volume_label = [0u8; 11];
    volume_label.copy_from_slice(&sector[71..82]);
    let mut fs_type_label = [0u8; 8];
    fs_type_label.copy_from_slice(&sector[82..90]);

    Fat32Ext {
        fat_size_32: u32::from_le_bytes([sector[36], sector[37], sector[38], sector[39]]),
        ext_flags: u16::from_le_bytes([sector[40], sector[41]]),
        fs_version: u16::from_le_bytes([sector[42], sector[43]]),
        root_cluster: u32::from_le_bytes([sector[44], sector[45], sector[46], sector[47]]),
        fs_info_sector: u16::from_le_bytes([sector[48], sector[49]]),
        backup_boot_sector: u16::from_le_bytes([sector[50], sector[51]]),
        drive_number: sector[64],
        boot_signature: sector[66],
        volume_serial: u32::from_le_bytes([sector[67], sector[68], sector[69], sector[70]]),
        volume_label,
        fs_type_label,
    }
}

fn parse_legacy_ext(sector: &[u8; 512]) -> LegacyExt {
    let mut volume_label = [0u8; 11];
    volume_label.copy_from_slice(&sector[43..54]);
    let mut fs_type_label = [0u8; 8];
    fs_type_label.copy_from_slice(&sector[54..62]);

    LegacyExt {
        drive_number: sector[36],
        boot_signature: sector[38],
        volume_serial: u32::from_le_bytes([sector[39], sector[40], sector[41], sector[42]]),
        volume_label,
        fs_type_label,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Minimal FAT12 floppy-style boot sector: 512 B/sector, 1 sector/cluster,
    /// 1 reserved, 2 FATs x 9 sectors, 224 root entries, 2880 total sectors.
    fn floppy_boot_sector() -> Vec<u8> {
        let mut s = vec![0u8; 512];
        s[11..13].copy_from_slice(&512u16.to_le_bytes());
        s[13] = 1;
        s[14..16].copy_from_slice(&1u16.to_le_bytes());
        s[16] = 2;
        s[17..19].copy_from_slice(&224u16.to_le_bytes());
        s[19..21].copy_from_slice(&2880u16.to_le_bytes());
        s[21] = 0xF0;
        s[22..24].copy_from_slice(&9u16.to_le_bytes());
        s[43..54].copy_from_slice(b"FLOPPYDISK ");
        s
    }

    #[test]
    fn test_decode_fat12_floppy() {
        let mut cur = Cursor::new(floppy_boot_sector());
        let bpb = BiosParameterBlock::decode(&mut cur, 0).unwrap();
        assert_eq!(bpb.bytes_per_sector, 512);
        assert_eq!(bpb.sectors_per_cluster, 1);
        assert_eq!(bpb.fat_size_sectors(), 9);
        assert_eq!(bpb.total_sector_count(), 2880);
        assert_eq!(bpb.root_cluster(), None);
        assert!(matches!(bpb.ext, ExtendedBpb::Fat12_16(_)));
        assert_eq!(bpb.volume_label_raw(), b"FLOPPYDISK ");
    }

    #[test]
    fn test_decode_rejects_bad_sector_size() {
        let mut s = floppy_boot_sector();
        s[11..13].copy_from_slice(&700u16.to_le_bytes());
        let err = BiosParameterBlock::decode(&mut Cursor::new(s), 0).unwrap_err();
        assert!(matches!(err, FatError::MalformedBpb(_)), "{err}");
    }

    #[test]
    fn test_decode_rejects_non_power_of_two_cluster() {
        let mut s = floppy_boot_sector();
        s[13] = 3;
        let err = BiosParameterBlock::decode(&mut Cursor::new(s), 0).unwrap_err();
        assert!(matches!(err, FatError::MalformedBpb(_)), "{err}");

        let mut s = floppy_boot_sector();
        s[13] = 0;
        let err = BiosParameterBlock::decode(&mut Cursor::new(s), 0).unwrap_err();
        assert!(matches!(err, FatError::MalformedBpb(_)), "{err}");
    }

    #[test]
    fn test_decode_rejects_zero_reserved_sectors() {
        let mut s = floppy_boot_sector();
        s[14..16].copy_from_slice(&0u16.to_le_bytes());
        let err = BiosParameterBlock::decode(&mut Cursor::new(s), 0).unwrap_err();
        assert!(matches!(err, FatError::MalformedBpb(_)), "{err}");
    }

    #[test]
    fn test_decode_rejects_zero_totals_and_zero_fat_size() {
        let mut s = floppy_boot_sector();
        s[19..21].copy_from_slice(&0u16.to_le_bytes());
        let err = BiosParameterBlock::decode(&mut Cursor::new(s), 0).unwrap_err();
        assert!(matches!(err, FatError::MalformedBpb(_)), "{err}");

        let mut s = floppy_boot_sector();
        s[22..24].copy_from_slice(&0u16.to_le_bytes());
        let err = BiosParameterBlock::decode(&mut Cursor::new(s), 0).unwrap_err();
        assert!(matches!(err, FatError::MalformedBpb(_)), "{err}");
    }

    #[test]
    fn test_decode_fat32_keeps_extended_block() {
        // FAT32-shaped: 16-bit FAT size and root entry count both zero,
        // geometry large enough to classify as FAT32.
        let mut s = vec![0u8; 512];
        s[11..13].copy_from_slice(&512u16.to_le_bytes());
        s[13] = 1;
        s[14..16].copy_from_slice(&32u16.to_le_bytes());
        s[16] = 2;
        s[32..36].copy_from_slice(&70000u32.to_le_bytes());
        s[36..40].copy_from_slice(&550u32.to_le_bytes());
        s[44..48].copy_from_slice(&2u32.to_le_bytes());
        s[71..82].copy_from_slice(b"BIGVOLUME  ");
        let bpb = BiosParameterBlock::decode(&mut Cursor::new(s), 0).unwrap();
        assert_eq!(bpb.fat_size_sectors(), 550);
        assert_eq!(bpb.root_cluster(), Some(2));
        assert_eq!(bpb.volume_label_raw(), b"BIGVOLUME  ");
    }

    #[test]
    fn test_decode_honours_base_offset() {
        let mut img = vec![0u8; 2048];
        img[1024..1536].copy_from_slice(&floppy_boot_sector());
        let bpb = BiosParameterBlock::decode(&mut Cursor::new(img), 1024).unwrap();
        assert_eq!(bpb.total_sector_count(), 2880);
    }
}
