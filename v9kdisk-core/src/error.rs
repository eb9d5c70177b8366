//! Error types for disk image operations.

use thiserror::Error;

/// Errors that can occur while working with a disk image.
#[derive(Error, Debug)]
pub enum DiskError {
    #[error("Unrecognized image format")]
    UnknownFormat,

    #[error("Corrupt disk label: {0}")]
    CorruptLabel(String),

    #[error("Corrupt boot sector: {0}")]
    CorruptBootSector(String),

    #[error("Corrupt cluster chain at cluster {0}")]
    CorruptChain(u16),

    #[error("Cluster {0} is linked from more than one chain")]
    CrossLink(u16),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("Path is ambiguous (duplicate entries): {0}")]
    Ambiguous(String),

    #[error("Invalid 8.3 name: {0}")]
    InvalidName(String),

    #[error("File exists: {0}")]
    ExistsAndNoOverwrite(String),

    #[error("Not enough free space: need {needed} cluster(s), {free} free")]
    OutOfSpace { needed: usize, free: usize },

    #[error("Directory is full")]
    DirectoryFull,

    #[error("Directory is not empty: {0}")]
    DirectoryNotEmpty(String),

    #[error("Hard disk images require a partition selector (image.img:N:\\PATH)")]
    PartitionRequired,

    #[error("Partition index {index} out of range (image has {count})")]
    PartitionOutOfRange { index: usize, count: usize },

    #[error("Attribute protected: {0}")]
    AttributeProtected(String),

    #[error("Volume is read-only")]
    ReadOnlyVolume,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for disk image operations.
pub type DiskResult<T> = Result<T, DiskError>;
