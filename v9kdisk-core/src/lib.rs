//! Victor 9000 / IBM PC FAT12 disk image engine.
//!
//! This crate reads and writes the on-disk formats used by early-1980s
//! personal computers:
//! - Victor 9000 FAT12 floppies (single- and double-sided)
//! - IBM PC FAT12 floppies (360K, 720K, 1.2M, 1.44M)
//! - Victor 9000 hard disks (a physical label over independent FAT12
//!   virtual volumes)
//! - Victor 9000 CP/M-86 floppies (read-only)
//!
//! # Architecture
//!
//! The engine is layered, leaves first:
//! - `BlockDevice`: sector I/O against the backing image
//! - `geometry`: format detection and layout resolution
//! - `Fat`: 12-bit entry codec, chain traversal, allocation
//! - `DirEntry` + path resolution: the 8.3 directory layer
//! - `Volume`: list/copy/delete/attr/mkdir operations on one filesystem
//! - `HardDisk`: Victor label parsing and partition dispatch
//!
//! Everything is synchronous and byte-exact: a file copied in and back out
//! is bit-identical, and freshly formatted images are readable by the
//! original operating systems.

pub mod block;
pub mod cpm;
pub mod create;
pub mod dir;
pub mod error;
pub mod fat;
pub mod geometry;
pub mod harddisk;
pub mod image;
pub mod info;
pub mod name;
pub mod path;
pub mod verify;
pub mod volume;

pub use block::{BlockDevice, FileDevice, MemoryDevice, SECTOR_SIZE};
pub use cpm::{CpmFile, CpmImage};
pub use create::{create_image, create_image_file, image_size};
pub use dir::{DirEntry, EntryKind};
pub use error::{DiskError, DiskResult};
pub use fat::Fat;
pub use geometry::{detect, Detected, FormatVariant, Geometry};
pub use harddisk::{HardDisk, PartitionInfo, PhysicalDiskLabel, VirtualVolumeLabel};
pub use image::{DiskImage, FloppyImage};
pub use info::{volume_stats, VolumeStats};
pub use path::{parse_path_spec, split_components, PathSpec};
pub use verify::{verify_volume, CrossLink, VerifyReport};
pub use volume::{DirHandle, ListedEntry, Volume};
