//! Victor 9000 hard disk label codec and partition dispatch.
//!
//! Sector 0 of a hard disk image carries the physical disk label:
//! - Bytes 0-1: label type (bit 0 set on a live label)
//! - Bytes 2-3: device id
//! - Bytes 4-19: serial number (16 bytes)
//! - Bytes 20-21: sector size (always 512)
//! - Bytes 22-33: IPL vector (disk address, load address, length, entry)
//! - Bytes 34-35: primary boot volume
//! - Bytes 36-51: controller parameters (16 bytes)
//! - Then three counted lists: available media regions, working media
//!   regions (8 bytes each), and the virtual volume list of 4-byte sector
//!   addresses, one per volume.
//!
//! Each listed sector holds a virtual volume label:
//! - Bytes 0-1: label type
//! - Bytes 2-17: volume name (16 bytes)
//! - Bytes 18-29: IPL vector
//! - Bytes 30-33: volume capacity in sectors
//! - Bytes 34-37: data area start, volume-local
//! - Bytes 38-39: host block size (512)
//! - Bytes 40-41: allocation unit (sectors per cluster)
//! - Bytes 42-43: root directory entry count
//!
//! Every volume is an independent FAT12 filesystem whose sector addresses
//! are local to the slice `[start, start + capacity)`.

use log::{debug, warn};
use serde::Serialize;

use crate::block::{BlockDevice, SECTOR_SIZE};
use crate::error::{DiskError, DiskResult};
use crate::geometry::{FormatVariant, Geometry};
use crate::volume::Volume;

/// Fallbacks for volume labels with zeroed geometry fields.
const HD_DEFAULT_SECTORS_PER_CLUSTER: u16 = 16;
const HD_DEFAULT_DIR_ENTRIES: u16 = 312;

fn le16(data: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([data[off], data[off + 1]])
}

fn le32(data: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]])
}

/// Physical disk label from sector 0.
#[derive(Debug, Clone)]
pub struct PhysicalDiskLabel {
    pub label_type: u16,
    pub device_id: u16,
    pub serial: String,
    pub sector_size: u16,
    pub ipl_disk_address: u32,
    pub ipl_load_address: u16,
    pub ipl_load_length: u16,
    pub ipl_code_entry: u32,
    pub primary_boot_volume: u16,
    pub controller_params: [u8; 16],
    /// Absolute sector addresses of the virtual volume labels.
    pub volume_addresses: Vec<u32>,
}

impl PhysicalDiskLabel {
    /// Parse the label from the first sectors of the image.
    pub fn parse(data: &[u8]) -> DiskResult<Self> {
        if data.len() < SECTOR_SIZE {
            return Err(DiskError::CorruptLabel("label data too short".into()));
        }

        let mut controller_params = [0u8; 16];
        controller_params.copy_from_slice(&data[36..52]);

        // Three counted lists follow the controller parameters.
        let mut offset = 52usize;
        let available = data[offset] as usize;
        offset += 1 + available * 8;
        if offset >= data.len() {
            return Err(DiskError::CorruptLabel("available media list truncated".into()));
        }
        let working = data[offset] as usize;
        offset += 1 + working * 8;
        if offset >= data.len() {
            return Err(DiskError::CorruptLabel("working media list truncated".into()));
        }
        let volume_count = data[offset] as usize;
        offset += 1;
        if offset + volume_count * 4 > data.len() {
            return Err(DiskError::CorruptLabel("virtual volume list truncated".into()));
        }
        let volume_addresses = (0..volume_count)
            .map(|i| le32(data, offset + i * 4))
            .collect();

        Ok(Self {
            label_type: le16(data, 0),
            device_id: le16(data, 2),
            serial: text16(&data[4..20]),
            sector_size: le16(data, 20),
            ipl_disk_address: le32(data, 22),
            ipl_load_address: le16(data, 26),
            ipl_load_length: le16(data, 28),
            ipl_code_entry: le32(data, 30),
            primary_boot_volume: le16(data, 34),
            controller_params,
            volume_addresses,
        })
    }
}

/// Quick structural check used by the format detector: live label type,
/// 512-byte sectors, and a volume count between 1 and 16.
pub(crate) fn label_sniff(sector0: &[u8]) -> bool {
    if sector0.len() < SECTOR_SIZE {
        return false;
    }
    if le16(sector0, 0) & 0x0001 == 0 || le16(sector0, 20) != 512 {
        return false;
    }
    match PhysicalDiskLabel::parse(sector0) {
        Ok(label) => (1..=16).contains(&label.volume_addresses.len()),
        Err(_) => false,
    }
}

/// Virtual volume label for one partition.
#[derive(Debug, Clone)]
pub struct VirtualVolumeLabel {
    pub label_type: u16,
    pub name: String,
    pub ipl_disk_address: u32,
    pub capacity_sectors: u32,
    pub data_start: u32,
    pub host_block_size: u16,
    pub allocation_unit: u16,
    pub root_dir_entries: u16,
    /// Absolute sector where this volume's slice begins.
    pub start_sector: u32,
}

impl VirtualVolumeLabel {
    pub fn parse(data: &[u8], start_sector: u32) -> DiskResult<Self> {
        if data.len() < 44 {
            return Err(DiskError::CorruptLabel("volume label too short".into()));
        }
        Ok(Self {
            label_type: le16(data, 0),
            name: text16(&data[2..18]),
            ipl_disk_address: le32(data, 18),
            capacity_sectors: le32(data, 30),
            data_start: le32(data, 34),
            host_block_size: le16(data, 38),
            allocation_unit: le16(data, 40),
            root_dir_entries: le16(data, 42),
            start_sector,
        })
    }

    /// Resolve this label to a FAT12 geometry, volume-local. The FAT span
    /// is whatever lies between the label sector and the root directory,
    /// split over the two copies.
    pub fn geometry(&self) -> DiskResult<Geometry> {
        if self.host_block_size != 0 && self.host_block_size != 512 {
            return Err(DiskError::CorruptLabel(format!(
                "volume '{}': host block size {}",
                self.name, self.host_block_size
            )));
        }
        let spc = if self.allocation_unit == 0 {
            HD_DEFAULT_SECTORS_PER_CLUSTER
        } else {
            self.allocation_unit
        } as u32;
        let root_entries = if self.root_dir_entries == 0 {
            HD_DEFAULT_DIR_ENTRIES
        } else {
            self.root_dir_entries
        } as u32;
        let root_sectors = (root_entries * 32 + SECTOR_SIZE as u32 - 1) / SECTOR_SIZE as u32;

        // Label sector, two FAT copies, root directory, then data.
        if self.data_start <= 1 + root_sectors || self.capacity_sectors <= self.data_start {
            return Err(DiskError::CorruptLabel(format!(
                "volume '{}': data start {} outside capacity {}",
                self.name, self.data_start, self.capacity_sectors
            )));
        }
        let fat_span = self.data_start - 1 - root_sectors;
        if fat_span % 2 != 0 {
            return Err(DiskError::CorruptLabel(format!(
                "volume '{}': odd FAT span {}",
                self.name, fat_span
            )));
        }
        let fat_sectors = fat_span / 2;

        Ok(Geometry {
            total_sectors: self.capacity_sectors,
            reserved_sectors: 1,
            fat_count: 2,
            fat_sectors,
            root_dir_sectors: root_sectors,
            root_dir_entries: root_entries,
            data_start_sector: self.data_start,
            sectors_per_cluster: spc,
            total_clusters: crate::geometry::clamp_clusters(
                (self.capacity_sectors - self.data_start) / spc,
                fat_sectors,
            ),
            media_descriptor: 0xF8,
            variant: FormatVariant::VictorHdVolume,
            victor_boot_sector: false,
        })
    }
}

/// One row of the partition table listing.
#[derive(Debug, Clone, Serialize)]
pub struct PartitionInfo {
    pub index: usize,
    pub name: String,
    pub capacity_sectors: u32,
    pub capacity_bytes: u64,
}

/// A Victor 9000 hard disk image: a physical label plus one or more
/// virtual volumes, each an independent FAT12 filesystem.
pub struct HardDisk {
    dev: Box<dyn BlockDevice>,
    writable: bool,
    label: PhysicalDiskLabel,
    volumes: Vec<VirtualVolumeLabel>,
}

impl HardDisk {
    /// Read the physical label and every listed volume label. Volume
    /// labels that parse as garbage are skipped, matching what the Victor
    /// partitioner leaves behind on never-initialised slots.
    pub fn open(mut dev: Box<dyn BlockDevice>, writable: bool) -> DiskResult<Self> {
        let sector0 = dev.read_sector(0)?;
        let label = PhysicalDiskLabel::parse(&sector0)?;
        if label.label_type & 0x0001 == 0 {
            return Err(DiskError::CorruptLabel("label type bit clear".into()));
        }
        if label.sector_size != 512 {
            return Err(DiskError::CorruptLabel(format!(
                "sector size {}",
                label.sector_size
            )));
        }

        let mut volumes = Vec::new();
        for &addr in &label.volume_addresses {
            let data = dev.read_sector(addr as u64)?;
            let vl = VirtualVolumeLabel::parse(&data, addr)?;
            if !matches!(vl.label_type, 0x0000 | 0x0001 | 0x0002 | 0xFFFF) {
                warn!("skipping volume label at sector {} (type {:#06x})", addr, vl.label_type);
                continue;
            }
            volumes.push(vl);
        }
        debug!("hard disk opened with {} volume(s)", volumes.len());

        Ok(Self {
            dev,
            writable,
            label,
            volumes,
        })
    }

    pub fn label(&self) -> &PhysicalDiskLabel {
        &self.label
    }

    pub fn partition_count(&self) -> usize {
        self.volumes.len()
    }

    pub fn volume_label(&self, index: usize) -> Option<&VirtualVolumeLabel> {
        self.volumes.get(index)
    }

    /// Partition table rows, one per virtual volume.
    pub fn partitions(&self) -> Vec<PartitionInfo> {
        self.volumes
            .iter()
            .enumerate()
            .map(|(index, v)| PartitionInfo {
                index,
                name: v.name.clone(),
                capacity_sectors: v.capacity_sectors,
                capacity_bytes: v.capacity_sectors as u64 * SECTOR_SIZE as u64,
            })
            .collect()
    }

    /// Mount the `index`-th virtual volume. All sector addressing inside
    /// the returned volume is local to its slice.
    pub fn partition(&mut self, index: usize) -> DiskResult<Volume<'_>> {
        let count = self.volumes.len();
        let vl = self
            .volumes
            .get(index)
            .ok_or(DiskError::PartitionOutOfRange { index, count })?;
        let geometry = vl.geometry()?;
        Volume::open(
            self.dev.as_mut(),
            vl.start_sector as u64,
            geometry,
            self.writable,
        )
    }
}

fn text16(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect::<String>()
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal physical label: no media regions, two volumes.
    fn physical_label(volumes: &[u32]) -> Vec<u8> {
        let mut sector = vec![0u8; SECTOR_SIZE];
        sector[0..2].copy_from_slice(&0x0001u16.to_le_bytes());
        sector[2..4].copy_from_slice(&0x0001u16.to_le_bytes());
        sector[4..14].copy_from_slice(b"V9K-TEST  ");
        sector[20..22].copy_from_slice(&512u16.to_le_bytes());
        // available media list (empty), working media list (empty)
        sector[52] = 0;
        sector[53] = 0;
        sector[54] = volumes.len() as u8;
        for (i, addr) in volumes.iter().enumerate() {
            sector[55 + i * 4..55 + i * 4 + 4].copy_from_slice(&addr.to_le_bytes());
        }
        sector
    }

    fn volume_label(name: &str, capacity: u32, data_start: u32, unit: u16, entries: u16) -> Vec<u8> {
        let mut sector = vec![0u8; SECTOR_SIZE];
        sector[0..2].copy_from_slice(&0x0001u16.to_le_bytes());
        sector[2..2 + name.len()].copy_from_slice(name.as_bytes());
        sector[30..34].copy_from_slice(&capacity.to_le_bytes());
        sector[34..38].copy_from_slice(&data_start.to_le_bytes());
        sector[38..40].copy_from_slice(&512u16.to_le_bytes());
        sector[40..42].copy_from_slice(&unit.to_le_bytes());
        sector[42..44].copy_from_slice(&entries.to_le_bytes());
        sector
    }

    #[test]
    fn test_parse_physical_label() {
        let data = physical_label(&[0x40, 0x2000]);
        let label = PhysicalDiskLabel::parse(&data).unwrap();
        assert_eq!(label.label_type, 1);
        assert_eq!(label.serial, "V9K-TEST");
        assert_eq!(label.volume_addresses, vec![0x40, 0x2000]);
        assert!(label_sniff(&data));
    }

    #[test]
    fn test_sniff_rejects_plain_boot_sector() {
        let mut data = vec![0u8; SECTOR_SIZE];
        data[0x1FE] = 0x55;
        data[0x1FF] = 0xAA;
        assert!(!label_sniff(&data));
    }

    #[test]
    fn test_volume_label_geometry() {
        // 4 root sectors (64 entries), data at 13: label + 2x4 FAT + root.
        let data = volume_label("SYS", 4096, 13, 4, 64);
        let vl = VirtualVolumeLabel::parse(&data, 0x40).unwrap();
        assert_eq!(vl.name, "SYS");
        let geom = vl.geometry().unwrap();
        assert_eq!(geom.fat_sectors, 4);
        assert_eq!(geom.root_dir_start_sector(), 9);
        assert_eq!(geom.root_dir_sectors, 4);
        assert_eq!(geom.data_start_sector, 13);
        assert_eq!(geom.sectors_per_cluster, 4);
        assert_eq!(geom.total_clusters, (4096 - 13) / 4);
    }

    #[test]
    fn test_volume_label_bad_data_start() {
        let data = volume_label("BAD", 4096, 2, 4, 64);
        let vl = VirtualVolumeLabel::parse(&data, 0x40).unwrap();
        assert!(matches!(vl.geometry(), Err(DiskError::CorruptLabel(_))));
    }
}
