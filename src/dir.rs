use std::mem;

use log::warn;

use crate::layout::FatVariant;
use crate::record::{DirRecord, LongEntry, ShortEntry, DIR_ENTRY_SIZE};
use crate::volume::FatFile;

/// Reassembles long names from fragment runs.
///
/// Fragments appear on disk in decreasing sequence order: the one carrying
/// the 0x40 terminator bit (highest index) comes first, the run counts down
/// to index 1, and the owning short entry follows. Anything that breaks the
/// protocol (a fragment with no run start, an index gap, a checksum that
/// differs between fragments or from the short entry's 8.3 name) discards
/// the pending run, and the entry falls back to its short name.
pub(crate) struct LongNameAssembler {
    state: State,
}

enum State {
    Idle,
    Collecting {
        /// Index the next fragment must carry.
        next_index: u8,
        checksum: u8,
        /// Fragments in disk order (highest index first).
        parts: Vec<[u16; 13]>,
    },
    Ready {
        checksum: u8,
        name: String,
    },
}

impl LongNameAssembler {
    pub(crate) fn new() -> Self {
        LongNameAssembler { state: State::Idle }
    }

    pub(crate) fn fragment(&mut self, frag: &LongEntry) {
        if frag.is_first() {
            if !matches!(self.state, State::Idle) {
                warn!("discarding pending long name: new run started before a short entry");
            }
            let index = frag.index();
            self.state = if index == 0 {
                State::Idle
            } else if index == 1 {
                // Single-fragment name.
                State::Ready {
                    checksum: frag.checksum,
                    name: assemble(&[frag.units]),
                }
            } else {
                State::Collecting {
                    next_index: index - 1,
                    checksum: frag.checksum,
                    parts: vec![frag.units],
                }
            };
            return;
        }

        self.state = match mem::replace(&mut self.state, State::Idle) {
            State::Collecting {
                next_index,
                checksum,
                mut parts,
            } if frag.index() == next_index && frag.checksum == checksum => {
                parts.push(frag.units);
                if next_index == 1 {
                    State::Ready {
                        checksum,
                        name: assemble(&parts),
                    }
                } else {
                    State::Collecting {
                        next_index: next_index - 1,
                        checksum,
                        parts,
                    }
                }
            }
            State::Idle => State::Idle,
            _ => {
                warn!(
                    "discarding pending long name: fragment {:#04x} out of sequence",
                    frag.sequence
                );
                State::Idle
            }
        };
    }

    /// Hand the assembled name to the short entry that owns it.
    pub(crate) fn claim(&mut self, owner: &ShortEntry) -> Option<String> {
        match mem::replace(&mut self.state, State::Idle) {
            State::Ready { checksum, name } => {
                if checksum == owner.checksum() {
                    Some(name)
                } else {
                    warn!("discarding long name {name:?}: checksum mismatch against 8.3 name");
                    None
                }
            }
            State::Collecting { .. } => {
                warn!("discarding incomplete long-name run");
                None
            }
            State::Idle => None,
        }
    }

    /// Drop any pending run (a deleted entry interrupted it).
    pub(crate) fn reset(&mut self) {
        self.state = State::Idle;
    }
}

/// Concatenate fragments in ascending sequence order and decode.
///
/// Code units past the first U+0000 terminator are padding (conventionally
/// U+FFFF) and are ignored; the terminator itself is not required.
fn assemble(parts: &[[u16; 13]]) -> String {
    let units: Vec<u16> = parts.iter().rev().flatten().copied().collect();
    let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    char::decode_utf16(units[..end].iter().copied())
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Parse a directory's raw bytes into files, in on-disk order.
///
/// Scanning stops at the first end-of-directory record; deleted slots are
/// skipped and clear any pending long-name run.
pub(crate) fn parse_stream(data: &[u8], variant: FatVariant) -> Vec<FatFile> {
    let mut files = Vec::new();
    let mut assembler = LongNameAssembler::new();

    for raw in data.chunks_exact(DIR_ENTRY_SIZE) {
        match DirRecord::parse(raw) {
            DirRecord::EndOfDirectory => break,
            DirRecord::Unused => assembler.reset(),
            DirRecord::Long(frag) => assembler.fragment(&frag),
            DirRecord::Short(entry) => {
                let long_name = assembler.claim(&entry);
                files.push(FatFile::from_entry(&entry, long_name, variant));
            }
        }
    }

    files
}
