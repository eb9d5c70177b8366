//! Top-level image handle: detection plus operation dispatch.
//!
//! A `DiskImage` is a tagged variant over the supported media, with a
//! common path to a mounted `Volume`. Hard disks require a partition
//! selector; CP/M images expose their own read-only interface.

use std::path::Path;

use log::debug;

use crate::block::{BlockDevice, FileDevice};
use crate::cpm::{self, CpmImage};
use crate::error::{DiskError, DiskResult};
use crate::geometry::{detect, Detected, Geometry};
use crate::harddisk::HardDisk;
use crate::volume::Volume;

/// A single-volume floppy image.
pub struct FloppyImage {
    dev: Box<dyn BlockDevice>,
    geometry: Geometry,
    writable: bool,
}

impl FloppyImage {
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Mount the volume (loads the FAT cache).
    pub fn volume(&mut self) -> DiskResult<Volume<'_>> {
        Volume::open(self.dev.as_mut(), 0, self.geometry, self.writable)
    }
}

/// An opened disk image of any supported kind.
pub enum DiskImage {
    VictorFloppy(FloppyImage),
    IbmFloppy(FloppyImage),
    HardDisk(HardDisk),
    Cpm(CpmImage),
}

impl std::fmt::Debug for DiskImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let variant = match self {
            DiskImage::VictorFloppy(_) => "VictorFloppy",
            DiskImage::IbmFloppy(_) => "IbmFloppy",
            DiskImage::HardDisk(_) => "HardDisk",
            DiskImage::Cpm(_) => "Cpm",
        };
        f.debug_tuple(variant).finish()
    }
}

impl DiskImage {
    /// Open an image file, auto-detecting its format.
    pub fn open(path: &Path, writable: bool) -> DiskResult<Self> {
        let dev = FileDevice::open(path, writable)?;
        debug!("opening {} ({} bytes)", path.display(), dev.len());
        Self::from_device(Box::new(dev), writable)
    }

    /// Detect and wrap an already-opened device.
    pub fn from_device(mut dev: Box<dyn BlockDevice>, writable: bool) -> DiskResult<Self> {
        let mut header = vec![0u8; 2048];
        dev.read_at(0, &mut header)?;
        let total_len = dev.len();

        match detect(&header, total_len)? {
            Detected::HardDisk => Ok(DiskImage::HardDisk(HardDisk::open(dev, writable)?)),
            Detected::Floppy(geometry) => {
                if geometry.victor_boot_sector && cpm_candidate(&header) {
                    // CP/M-86 pressings carry no FAT header; the directory
                    // probe is the only way to tell them apart.
                    if cpm::sniff(dev.as_mut())?.is_some() {
                        return Ok(DiskImage::Cpm(CpmImage::open(dev)?));
                    }
                }
                let floppy = FloppyImage {
                    dev,
                    geometry,
                    writable,
                };
                if geometry.victor_boot_sector {
                    Ok(DiskImage::VictorFloppy(floppy))
                } else {
                    Ok(DiskImage::IbmFloppy(floppy))
                }
            }
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            DiskImage::VictorFloppy(f) | DiskImage::IbmFloppy(f) => f.geometry().variant.describe(),
            DiskImage::HardDisk(_) => "Victor 9000 hard disk",
            DiskImage::Cpm(_) => "Victor 9000 CP/M-86 floppy",
        }
    }

    pub fn is_hard_disk(&self) -> bool {
        matches!(self, DiskImage::HardDisk(_))
    }

    /// Mount a volume. Floppies take no partition selector; hard disks
    /// require one.
    pub fn volume(&mut self, partition: Option<usize>) -> DiskResult<Volume<'_>> {
        match self {
            DiskImage::VictorFloppy(f) | DiskImage::IbmFloppy(f) => match partition {
                None => f.volume(),
                Some(index) => Err(DiskError::PartitionOutOfRange { index, count: 0 }),
            },
            DiskImage::HardDisk(hd) => match partition {
                Some(index) => hd.partition(index),
                None => Err(DiskError::PartitionRequired),
            },
            DiskImage::Cpm(_) => Err(DiskError::ReadOnlyVolume),
        }
    }
}

/// The original CP/M probe only fires on boot sectors that do not look like
/// FAT boot code: first byte 0x00, 0xE5, or 0xFF.
fn cpm_candidate(header: &[u8]) -> bool {
    matches!(header[0], 0x00 | 0xE5 | 0xFF)
}
