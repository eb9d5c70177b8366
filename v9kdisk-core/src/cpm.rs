//! Victor 9000 CP/M-86 floppy support, read-only.
//!
//! CP/M has no FAT and no subdirectories: the directory is a run of 32-byte
//! extents, each naming up to eight 2048-byte allocation blocks. Victor
//! CP/M-86 disks interleave the directory over every second sector starting
//! at sector 76 (94 on some pressings). Listing and extraction are
//! supported; every mutating operation reports `ReadOnlyVolume`.

use log::debug;
use serde::Serialize;

use crate::block::{BlockDevice, SECTOR_SIZE};
use crate::error::{DiskError, DiskResult};
use crate::name::{has_wildcards, matches_pattern};

const CPM_DIR_ENTRY_SIZE: usize = 32;
const CPM_DELETED: u8 = 0xE5;
const CPM_RECORD_SIZE: usize = 128;
const CPM_RECORDS_PER_EXTENT: usize = 128;
const CPM_BLOCKS_PER_EXTENT: usize = 8;
const CPM_SECTORS_PER_BLOCK: u64 = 4;
const CPM_DIR_SECTORS: u64 = 18;
const CPM_DIR_INTERLEAVE: u64 = 2;
const CPM_DATA_START_SECTOR: u64 = 112;

/// Candidate directory start sectors, most common first.
const DIR_SECTOR_CANDIDATES: [u64; 3] = [76, 94, 1];

/// One directory extent.
#[derive(Debug, Clone)]
pub struct CpmExtent {
    pub user: u8,
    pub name: String,
    pub ext: String,
    pub extent: u16,
    pub record_count: u8,
    pub blocks: Vec<u16>,
    pub read_only: bool,
    pub system: bool,
}

impl CpmExtent {
    fn parse(raw: &[u8]) -> Option<Self> {
        let user = raw[0];
        if user == CPM_DELETED || user > 15 {
            return None;
        }
        let name: String = raw[1..9].iter().map(|&b| (b & 0x7F) as char).collect();
        let ext: String = raw[9..12].iter().map(|&b| (b & 0x7F) as char).collect();
        let name = name.trim_end().to_string();
        let ext = ext.trim_end().to_string();
        if name.is_empty() || !name.chars().chain(ext.chars()).all(|c| (' '..='~').contains(&c)) {
            return None;
        }

        let extent = raw[14] as u16 * 32 + raw[12] as u16;
        let blocks = (0..CPM_BLOCKS_PER_EXTENT)
            .map(|i| u16::from_le_bytes([raw[16 + i * 2], raw[17 + i * 2]]))
            .filter(|&b| b != 0)
            .collect();

        Some(Self {
            user,
            name,
            ext,
            extent,
            record_count: raw[15],
            blocks,
            read_only: raw[9] & 0x80 != 0,
            system: raw[10] & 0x80 != 0,
        })
    }
}

/// A CP/M file, extents aggregated.
#[derive(Debug, Clone, Serialize)]
pub struct CpmFile {
    pub user: u8,
    pub name: String,
    pub file_size: u64,
    pub read_only: bool,
    pub system: bool,
    #[serde(skip)]
    pub extents: Vec<CpmExtent>,
}

/// A read-only CP/M-86 floppy image.
pub struct CpmImage {
    dev: Box<dyn BlockDevice>,
    dir_start_sector: u64,
}

impl CpmImage {
    /// Open an image already identified as CP/M.
    pub fn open(mut dev: Box<dyn BlockDevice>) -> DiskResult<Self> {
        let dir_start_sector =
            sniff(dev.as_mut())?.ok_or_else(|| DiskError::CorruptLabel("no CP/M directory".into()))?;
        debug!("CP/M directory starts at sector {}", dir_start_sector);
        Ok(Self {
            dev,
            dir_start_sector,
        })
    }

    pub fn dir_start_sector(&self) -> u64 {
        self.dir_start_sector
    }

    fn read_extents(&mut self) -> DiskResult<Vec<CpmExtent>> {
        let mut extents = Vec::new();
        for i in 0..CPM_DIR_SECTORS {
            let sector = self.dir_start_sector + i * CPM_DIR_INTERLEAVE;
            let data = self.dev.read_sector(sector)?;
            for slot in 0..SECTOR_SIZE / CPM_DIR_ENTRY_SIZE {
                let raw = &data[slot * CPM_DIR_ENTRY_SIZE..(slot + 1) * CPM_DIR_ENTRY_SIZE];
                if let Some(extent) = CpmExtent::parse(raw) {
                    extents.push(extent);
                }
            }
        }
        Ok(extents)
    }

    /// List files, extents aggregated, sorted by user then name.
    pub fn list_files(&mut self) -> DiskResult<Vec<CpmFile>> {
        let mut groups: Vec<CpmFile> = Vec::new();
        for extent in self.read_extents()? {
            let full = full_name(&extent.name, &extent.ext);
            match groups
                .iter_mut()
                .find(|f| f.user == extent.user && f.name == full)
            {
                Some(file) => file.extents.push(extent),
                None => groups.push(CpmFile {
                    user: extent.user,
                    name: full,
                    file_size: 0,
                    read_only: extent.read_only,
                    system: extent.system,
                    extents: vec![extent],
                }),
            }
        }

        for file in &mut groups {
            file.extents.sort_by_key(|e| e.extent);
            // Every extent but the last is full; the last contributes its
            // record count.
            let mut size = 0usize;
            for (i, extent) in file.extents.iter().enumerate() {
                if i + 1 < file.extents.len() {
                    size += CPM_RECORDS_PER_EXTENT * CPM_RECORD_SIZE;
                } else {
                    size += extent.record_count as usize * CPM_RECORD_SIZE;
                }
            }
            file.file_size = size as u64;
        }

        groups.sort_by(|a, b| (a.user, &a.name).cmp(&(b.user, &b.name)));
        Ok(groups)
    }

    /// Files matching a name or wildcard pattern.
    pub fn find_matching(&mut self, pattern: &str) -> DiskResult<Vec<CpmFile>> {
        let files = self.list_files()?;
        Ok(files
            .into_iter()
            .filter(|f| {
                if has_wildcards(pattern) {
                    matches_pattern(pattern, &f.name)
                } else {
                    f.name.eq_ignore_ascii_case(pattern)
                }
            })
            .collect())
    }

    /// Extract a file's contents.
    pub fn read_file(&mut self, name: &str) -> DiskResult<Vec<u8>> {
        let files = self.list_files()?;
        let file = files
            .into_iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| DiskError::NotFound(name.to_string()))?;

        let mut data = Vec::with_capacity(file.file_size as usize);
        for extent in &file.extents {
            for &block in &extent.blocks {
                let first = CPM_DATA_START_SECTOR + block as u64 * CPM_SECTORS_PER_BLOCK;
                for s in 0..CPM_SECTORS_PER_BLOCK {
                    data.extend_from_slice(&self.dev.read_sector(first + s)?);
                }
            }
        }
        data.truncate(file.file_size as usize);
        Ok(data)
    }

    /// CP/M images are read-only; any mutation reports as much.
    pub fn write_file(&mut self, _name: &str, _data: &[u8]) -> DiskResult<()> {
        Err(DiskError::ReadOnlyVolume)
    }

    pub fn delete_file(&mut self, _name: &str) -> DiskResult<()> {
        Err(DiskError::ReadOnlyVolume)
    }
}

fn full_name(name: &str, ext: &str) -> String {
    if ext.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", name, ext)
    }
}

/// Probe for a CP/M directory: a candidate sector qualifies when at least
/// two of its first four slots decode as plausible extents.
pub(crate) fn sniff(dev: &mut dyn BlockDevice) -> DiskResult<Option<u64>> {
    for &sector in &DIR_SECTOR_CANDIDATES {
        if (sector + 1) * SECTOR_SIZE as u64 > dev.len() {
            continue;
        }
        let data = dev.read_sector(sector)?;
        let valid = (0..4)
            .filter(|&i| {
                CpmExtent::parse(&data[i * CPM_DIR_ENTRY_SIZE..(i + 1) * CPM_DIR_ENTRY_SIZE])
                    .is_some()
            })
            .count();
        if valid >= 2 {
            return Ok(Some(sector));
        }
    }
    Ok(None)
}
