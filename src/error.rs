use thiserror::Error;

use crate::table::ClusterStatus;

/// Errors from mounting or traversing a FAT volume.
#[derive(Error, Debug)]
pub enum FatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed BPB: {0}")]
    MalformedBpb(String),

    #[error("cannot determine FAT variant")]
    UnknownVariant,

    #[error("broken cluster chain: entry for cluster {cluster} is {status}")]
    BrokenChain { cluster: u32, status: ClusterStatus },

    #[error("cluster chain ended after {actual} of {expected} bytes")]
    ShortFile { expected: u64, actual: u64 },

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),
}
