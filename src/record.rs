use std::fmt;

use crate::layout::FatVariant;

/// Size of one on-disk directory record.
pub(crate) const DIR_ENTRY_SIZE: usize = 32;

/// Name byte 0 sentinels.
pub(crate) const NAME0_END_OF_DIR: u8 = 0x00;
pub(crate) const NAME0_UNUSED: u8 = 0xE5;
pub(crate) const NAME0_KANJI_ESCAPE: u8 = 0x05;

/// Directory-entry attribute flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attributes(u8);

impl Attributes {
    pub const READ_ONLY: u8 = 0x01;
    pub const HIDDEN: u8 = 0x02;
    pub const SYSTEM: u8 = 0x04;
    pub const VOLUME_ID: u8 = 0x08;
    pub const DIRECTORY: u8 = 0x10;
    pub const ARCHIVE: u8 = 0x20;

    /// The long-name marker occupies the low nibble.
    const LONG_NAME: u8 = Self::READ_ONLY | Self::HIDDEN | Self::SYSTEM | Self::VOLUME_ID;

    pub fn from_bits(bits: u8) -> Self {
        Attributes(bits)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn contains(&self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    pub fn read_only(&self) -> bool {
        self.contains(Self::READ_ONLY)
    }

    pub fn hidden(&self) -> bool {
        self.contains(Self::HIDDEN)
    }

    pub fn system(&self) -> bool {
        self.contains(Self::SYSTEM)
    }

    pub fn volume_id(&self) -> bool {
        self.contains(Self::VOLUME_ID)
    }

    pub fn directory(&self) -> bool {
        self.contains(Self::DIRECTORY)
    }

    pub fn archive(&self) -> bool {
        self.contains(Self::ARCHIVE)
    }

    /// An entry is a long-name fragment iff the low nibble is exactly 0x0F.
    pub(crate) fn is_long_name(&self) -> bool {
        self.0 & 0x0F == Self::LONG_NAME
    }
}

impl fmt::Display for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (Self::READ_ONLY, 'r'),
            (Self::HIDDEN, 'h'),
            (Self::SYSTEM, 's'),
            (Self::VOLUME_ID, 'v'),
            (Self::DIRECTORY, 'd'),
            (Self::ARCHIVE, 'a'),
        ];
        for (flag, c) in flags {
            write!(f, "{}", if self.contains(flag) { c } else { '-' })?;
        }
        Ok(())
    }
}

/// One 32-byte directory record, decoded.
///
/// The same slot holds either a short (8.3) entry or a long-name fragment;
/// the low nibble of the attribute byte at offset 11 disambiguates. Modeled
/// as a sum type so neither layout is ever read through the other.
pub(crate) enum DirRecord {
    /// Name byte 0 is 0x00: nothing past this point in the directory.
    EndOfDirectory,
    /// Name byte 0 is 0xE5: deleted, skip.
    Unused,
    Long(LongEntry),
    Short(ShortEntry),
}

impl DirRecord {
    pub(crate) fn parse(raw: &[u8]) -> DirRecord {
        match raw[0] {
            NAME0_END_OF_DIR => DirRecord::EndOfDirectory,
            NAME0_UNUSED => DirRecord::Unused,
            _ => {
                if Attributes::from_bits(raw[11]).is_long_name() {
                    DirRecord::Long(LongEntry::parse(raw))
                } else {
                    DirRecord::Short(ShortEntry::parse(raw))
                }
            }
        }
    }
}

/// Short (8.3) directory entry.
pub(crate) struct ShortEntry {
    /// 8+3 name, space padded, OEM codepage.
    pub name: [u8; 11],
    pub attributes: Attributes,
    pub first_cluster_high: u16,
    /// Raw write time/date fields, carried but not interpreted.
    #[allow(dead_code)]
    pub write_time: u16,
    #[allow(dead_code)]
    pub write_date: u16,
    pub first_cluster_low: u16,
    pub size: u32,
}

impl ShortEntry {
    pub(crate) fn parse(raw: &[u8]) -> ShortEntry {
        let mut name = [0u8; 11];
        name.copy_from_slice(&raw[0..11]);
        ShortEntry {
            name,
            attributes: Attributes::from_bits(raw[11]),
            first_cluster_high: u16::from_le_bytes([raw[20], raw[21]]),
            write_time: u16::from_le_bytes([raw[22], raw[23]]),
            write_date: u16::from_le_bytes([raw[24], raw[25]]),
            first_cluster_low: u16::from_le_bytes([raw[26], raw[27]]),
            size: u32::from_le_bytes([raw[28], raw[29], raw[30], raw[31]]),
        }
    }

    /// First cluster of the entry's data.
    ///
    /// The high half is only meaningful on FAT32, where the combined value
    /// lives in the 28-bit cluster space; FAT12/16 writers leave it zero
    /// (or use it for other purposes), so it is ignored there.
    pub(crate) fn first_cluster(&self, variant: FatVariant) -> u32 {
        match variant {
            FatVariant::Fat32 => {
                (u32::from(self.first_cluster_high) << 16 | u32::from(self.first_cluster_low))
                    & 0x0FFF_FFFF
            }
            FatVariant::Fat12 | FatVariant::Fat16 => u32::from(self.first_cluster_low),
        }
    }

    pub(crate) fn checksum(&self) -> u8 {
        short_name_checksum(&self.name)
    }
}

/// Long-name fragment: 13 UCS-2 code units plus sequencing metadata.
pub(crate) struct LongEntry {
    /// Raw sequence byte; bit 0x40 marks the first fragment on disk.
    pub sequence: u8,
    /// Checksum of the owning short entry's 8.3 name.
    pub checksum: u8,
    pub units: [u16; 13],
}

impl LongEntry {
    pub(crate) fn parse(raw: &[u8]) -> LongEntry {
        // Code units at 1..11 (5), 14..26 (6) and 28..32 (2). Bytes 26..28
        // are the must-be-zero FstClusLO slot, not name data.
        let mut units = [0u16; 13];
        for (i, unit) in units[0..5].iter_mut().enumerate() {
            *unit = u16::from_le_bytes([raw[1 + 2 * i], raw[2 + 2 * i]]);
        }
        for (i, unit) in units[5..11].iter_mut().enumerate() {
            *unit = u16::from_le_bytes([raw[14 + 2 * i], raw[15 + 2 * i]]);
        }
        for (i, unit) in units[11..13].iter_mut().enumerate() {
            *unit = u16::from_le_bytes([raw[28 + 2 * i], raw[29 + 2 * i]]);
        }
        LongEntry {
            sequence: raw[0],
            checksum: raw[13],
            units,
        }
    }

    /// Whether this fragment opens a run (highest sequence, stored first).
    pub(crate) fn is_first(&self) -> bool {
        self.sequence & 0x40 != 0
    }

    /// Position of the fragment within the name, counted from 1.
    pub(crate) fn index(&self) -> u8 {
        self.sequence & 0x1F
    }
}

/// Checksum over the 11-byte short name carried by every long-name fragment:
/// rotate right one bit, then add the next name byte, in u8 arithmetic.
pub(crate) fn short_name_checksum(name: &[u8; 11]) -> u8 {
    name.iter().fold(0u8, |sum, &b| {
        ((sum & 1) << 7).wrapping_add(sum >> 1).wrapping_add(b)
    })
}

/// Render the 11-byte short name verbatim: no trimming, no dot between base
/// and extension. A leading 0x05 stands for a literal 0xE5 first byte.
pub(crate) fn render_short_name(name: &[u8; 11]) -> String {
    let mut bytes = *name;
    if bytes[0] == NAME0_KANJI_ESCAPE {
        bytes[0] = NAME0_UNUSED;
    }
    decode_oem_string(&bytes)
}

/// Presentation form of an 8.3 name: base and extension trimmed of padding
/// and joined with a dot ("README.TXT", "BOOTMGR").
pub(crate) fn pretty_short_name(name: &[u8; 11]) -> String {
    let mut bytes = *name;
    if bytes[0] == NAME0_KANJI_ESCAPE {
        bytes[0] = NAME0_UNUSED;
    }
    let base = decode_oem_string(&bytes[0..8]);
    let base = base.trim_end();
    let ext = decode_oem_string(&bytes[8..11]);
    let ext = ext.trim_end();

    if ext.is_empty() {
        base.to_string()
    } else {
        format!("{base}.{ext}")
    }
}

/// Decode a byte slice from OEM codepage (CP437) to a UTF-8 String.
///
/// Bytes 0x00-0x7F are ASCII. Bytes 0x80-0xFF are mapped using the standard
/// CP437 table used by DOS and FAT short filenames.
fn decode_oem_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| cp437_to_char(b)).collect()
}

/// Map a single CP437 byte to a Unicode character.
fn cp437_to_char(b: u8) -> char {
    if b < 0x80 {
        b as char
    } else {
        CP437_HIGH[b as usize - 0x80]
    }
}

/// CP437 to Unicode mapping for bytes 0x80-0xFF.
#[rustfmt::skip]
const CP437_HIGH: [char; 128] = [
    // 0x80-0x8F
    'Ç','ü','é','â','ä','à','å','ç', 'ê','ë','è','ï','î','ì','Ä','Å',
    // 0x90-0x9F
    'É','æ','Æ','ô','ö','ò','û','ù', 'ÿ','Ö','Ü','¢','£','¥','₧','ƒ',
    // 0xA0-0xAF
    'á','í','ó','ú','ñ','Ñ','ª','º', '¿','⌐','¬','½','¼','¡','«','»',
    // 0xB0-0xBF
    '░','▒','▓','│','┤','╡','╢','╖', '╕','╣','║','╗','╝','╜','╛','┐',
    // 0xC0-0xCF
    '└','┴','┬','├','─','┼','╞','╟', '╚','╔','╩','╦','╠','═','╬','╧',
    // 0xD0-0xDF
    '╨','╤','╥','╙','╘','╒','╓','╫', '╪','┘','┌','█','▄','▌','▐','▀',
    // 0xE0-0xEF
    'α','ß','Γ','π','Σ','σ','µ','τ', 'Φ','Θ','Ω','δ','∞','φ','ε','∩',
    // 0xF0-0xFF
    '≡','±','≥','≤','⌠','⌡','÷','≈', '°','∙','·','√','ⁿ','²','■','\u{00A0}',
];
