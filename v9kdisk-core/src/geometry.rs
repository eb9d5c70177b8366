//! Format detection and geometry resolution.
//!
//! The detector looks at the first 2 KB of an image plus its total length
//! and classifies it as a Victor 9000 hard disk, an IBM PC FAT12 floppy, or
//! a Victor 9000 floppy, in that order. Real-world dumps often carry zeroed
//! or garbage header fields, so the Victor path falls back to canonical
//! layouts when the boot sector is silent.

use log::debug;
use serde::Serialize;

use crate::block::SECTOR_SIZE;
use crate::error::{DiskError, DiskResult};
use crate::harddisk;

/// Identified image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormatVariant {
    VictorSs,
    VictorDs,
    IbmPc360,
    IbmPc720,
    IbmPc12M,
    IbmPc144M,
    VictorHdVolume,
}

impl FormatVariant {
    pub fn describe(&self) -> &'static str {
        match self {
            FormatVariant::VictorSs => "Victor 9000 single-sided floppy",
            FormatVariant::VictorDs => "Victor 9000 double-sided floppy",
            FormatVariant::IbmPc360 => "IBM PC 360K floppy",
            FormatVariant::IbmPc720 => "IBM PC 720K floppy",
            FormatVariant::IbmPc12M => "IBM PC 1.2M floppy",
            FormatVariant::IbmPc144M => "IBM PC 1.44M floppy",
            FormatVariant::VictorHdVolume => "Victor 9000 hard disk volume",
        }
    }
}

/// Resolved layout of one FAT12 volume. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub total_sectors: u32,
    pub reserved_sectors: u32,
    pub fat_count: u8,
    pub fat_sectors: u32,
    pub root_dir_sectors: u32,
    pub root_dir_entries: u32,
    pub data_start_sector: u32,
    pub sectors_per_cluster: u32,
    pub total_clusters: u32,
    pub media_descriptor: u8,
    pub variant: FormatVariant,
    pub victor_boot_sector: bool,
}

impl Geometry {
    pub fn fat_start_sector(&self) -> u32 {
        self.reserved_sectors
    }

    pub fn root_dir_start_sector(&self) -> u32 {
        self.reserved_sectors + self.fat_count as u32 * self.fat_sectors
    }

    pub fn cluster_bytes(&self) -> usize {
        self.sectors_per_cluster as usize * SECTOR_SIZE
    }

    /// First sector of cluster `c`. Clusters start at 2.
    pub fn cluster_to_sector(&self, cluster: u16) -> u32 {
        self.data_start_sector + (cluster as u32 - 2) * self.sectors_per_cluster
    }

    /// Highest valid cluster number (`total_clusters + 1`).
    pub fn max_cluster(&self) -> u16 {
        (self.total_clusters + 1) as u16
    }

    pub fn fat_bytes(&self) -> usize {
        self.fat_sectors as usize * SECTOR_SIZE
    }
}

/// Outcome of sniffing an image header.
#[derive(Debug)]
pub enum Detected {
    /// A Victor hard disk: geometry comes from the selected virtual volume.
    HardDisk,
    /// A single-volume floppy with fully resolved geometry.
    Floppy(Geometry),
}

/// Fixed parameters for the four IBM PC floppy formats.
#[derive(Debug, Clone, Copy)]
pub struct IbmParams {
    pub variant: FormatVariant,
    pub total_sectors: u32,
    pub sectors_per_cluster: u32,
    pub fat_sectors: u32,
    pub root_dir_entries: u32,
    pub media_descriptor: u8,
    pub sectors_per_track: u16,
    pub heads: u16,
}

pub const IBM_FORMATS: [IbmParams; 4] = [
    IbmParams {
        variant: FormatVariant::IbmPc360,
        total_sectors: 720,
        sectors_per_cluster: 2,
        fat_sectors: 2,
        root_dir_entries: 112,
        media_descriptor: 0xF9,
        sectors_per_track: 9,
        heads: 2,
    },
    IbmParams {
        variant: FormatVariant::IbmPc720,
        total_sectors: 1440,
        sectors_per_cluster: 2,
        fat_sectors: 3,
        root_dir_entries: 112,
        media_descriptor: 0xF9,
        sectors_per_track: 9,
        heads: 2,
    },
    IbmParams {
        variant: FormatVariant::IbmPc12M,
        total_sectors: 2400,
        sectors_per_cluster: 1,
        fat_sectors: 7,
        root_dir_entries: 224,
        media_descriptor: 0xF9,
        sectors_per_track: 15,
        heads: 2,
    },
    IbmParams {
        variant: FormatVariant::IbmPc144M,
        total_sectors: 2880,
        sectors_per_cluster: 1,
        fat_sectors: 9,
        root_dir_entries: 224,
        media_descriptor: 0xF0,
        sectors_per_track: 18,
        heads: 2,
    },
];

/// Fixed parameters for the two Victor 9000 floppy layouts.
#[derive(Debug, Clone, Copy)]
pub struct VictorParams {
    pub variant: FormatVariant,
    pub total_sectors: u32,
    pub fat_sectors: u32,
    pub data_start_sector: u32,
    pub flags: u16,
}

pub const VICTOR_SS: VictorParams = VictorParams {
    variant: FormatVariant::VictorSs,
    total_sectors: 1224,
    fat_sectors: 1,
    data_start_sector: 11,
    flags: 0x0000,
};

pub const VICTOR_DS: VictorParams = VictorParams {
    variant: FormatVariant::VictorDs,
    total_sectors: 2448,
    fat_sectors: 2,
    data_start_sector: 13,
    flags: 0x0001,
};

pub const VICTOR_SECTORS_PER_CLUSTER: u32 = 4;
pub const VICTOR_ROOT_DIR_SECTORS: u32 = 8;
pub const VICTOR_ROOT_DIR_ENTRIES: u32 = 128;
pub const VICTOR_MEDIA_DESCRIPTOR: u8 = 0x01;

fn le16(data: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([data[off], data[off + 1]])
}

/// Cap the cluster count at what the FAT can actually address. Real dumps
/// sometimes carry a data area larger than the FAT covers; the trailing
/// sectors are unreachable, not an error.
pub(crate) fn clamp_clusters(clusters: u32, fat_sectors: u32) -> u32 {
    let entries = (fat_sectors as usize * SECTOR_SIZE * 2 / 3).saturating_sub(2);
    clusters.min(entries as u32)
}

impl IbmParams {
    pub fn for_variant(variant: FormatVariant) -> Option<&'static IbmParams> {
        IBM_FORMATS.iter().find(|p| p.variant == variant)
    }

    pub fn for_total_sectors(total: u32) -> Option<&'static IbmParams> {
        IBM_FORMATS.iter().find(|p| p.total_sectors == total)
    }

    pub fn image_bytes(&self) -> u64 {
        self.total_sectors as u64 * SECTOR_SIZE as u64
    }
}

impl VictorParams {
    pub fn for_variant(variant: FormatVariant) -> Option<&'static VictorParams> {
        match variant {
            FormatVariant::VictorSs => Some(&VICTOR_SS),
            FormatVariant::VictorDs => Some(&VICTOR_DS),
            _ => None,
        }
    }

    pub fn image_bytes(&self) -> u64 {
        self.total_sectors as u64 * SECTOR_SIZE as u64
    }

    pub fn geometry(&self) -> Geometry {
        victor_geometry(self.variant, self.data_start_sector, self.total_sectors)
    }
}

fn victor_geometry(variant: FormatVariant, data_start: u32, total_sectors: u32) -> Geometry {
    let fat_sectors = if variant == FormatVariant::VictorDs { 2 } else { 1 };
    let data_sectors = total_sectors.saturating_sub(data_start);
    Geometry {
        total_sectors,
        reserved_sectors: 1,
        fat_count: 2,
        fat_sectors,
        root_dir_sectors: VICTOR_ROOT_DIR_SECTORS,
        root_dir_entries: VICTOR_ROOT_DIR_ENTRIES,
        data_start_sector: data_start,
        sectors_per_cluster: VICTOR_SECTORS_PER_CLUSTER,
        total_clusters: clamp_clusters(data_sectors / VICTOR_SECTORS_PER_CLUSTER, fat_sectors),
        media_descriptor: VICTOR_MEDIA_DESCRIPTOR,
        variant,
        victor_boot_sector: true,
    }
}

pub(crate) fn ibm_geometry(params: &IbmParams, total_sectors: u32) -> Geometry {
    let root_dir_sectors = (params.root_dir_entries * 32 + SECTOR_SIZE as u32 - 1) / SECTOR_SIZE as u32;
    let data_start = 1 + 2 * params.fat_sectors + root_dir_sectors;
    Geometry {
        total_sectors,
        reserved_sectors: 1,
        fat_count: 2,
        fat_sectors: params.fat_sectors,
        root_dir_sectors,
        root_dir_entries: params.root_dir_entries,
        data_start_sector: data_start,
        sectors_per_cluster: params.sectors_per_cluster,
        total_clusters: clamp_clusters(
            total_sectors.saturating_sub(data_start) / params.sectors_per_cluster,
            params.fat_sectors,
        ),
        media_descriptor: params.media_descriptor,
        variant: params.variant,
        victor_boot_sector: false,
    }
}

/// Build geometry from an IBM PC BIOS Parameter Block that already passed
/// `bpb_is_consistent`. Fields come from the BPB itself; the variant tag is
/// inferred from the sector count, nearest size winning for odd counts.
fn geometry_from_bpb(boot: &[u8]) -> Geometry {
    let sectors_per_cluster = boot[0x0D] as u32;
    let reserved_sectors = le16(boot, 0x0E) as u32;
    let root_dir_entries = le16(boot, 0x11) as u32;
    let total_sectors = le16(boot, 0x13) as u32;
    let media_descriptor = boot[0x15];
    let fat_sectors = le16(boot, 0x16) as u32;

    let variant = IbmParams::for_total_sectors(total_sectors)
        .map(|p| p.variant)
        .unwrap_or(match total_sectors {
            0..=1079 => FormatVariant::IbmPc360,
            1080..=1919 => FormatVariant::IbmPc720,
            1920..=2639 => FormatVariant::IbmPc12M,
            _ => FormatVariant::IbmPc144M,
        });

    let root_dir_sectors = (root_dir_entries * 32 + SECTOR_SIZE as u32 - 1) / SECTOR_SIZE as u32;
    let data_start = reserved_sectors + 2 * fat_sectors + root_dir_sectors;
    Geometry {
        total_sectors,
        reserved_sectors,
        fat_count: 2,
        fat_sectors,
        root_dir_sectors,
        root_dir_entries,
        data_start_sector: data_start,
        sectors_per_cluster,
        total_clusters: clamp_clusters(
            total_sectors.saturating_sub(data_start) / sectors_per_cluster,
            fat_sectors,
        ),
        media_descriptor,
        variant,
        victor_boot_sector: false,
    }
}

/// BPB consistency check used by the detector: sector size 512, a sane
/// cluster size, two FATs, and non-zero sector counts.
fn bpb_is_consistent(boot: &[u8]) -> bool {
    le16(boot, 0x0B) == 512
        && matches!(boot[0x0D], 1 | 2 | 4 | 8)
        && boot[0x10] == 2
        && le16(boot, 0x13) > 0
        && le16(boot, 0x16) > 0
}

/// Whether the boot sector carries plausible Victor floppy header fields.
fn victor_boot_plausible(boot: &[u8]) -> bool {
    // Genuine Victor boot sectors record the sector size at offset 26; many
    // dumps zero the header entirely, which the size fallback handles.
    le16(boot, 26) == 512
}

/// Classify an image from its first 2 KB and total length.
///
/// The policy is ordered: Victor hard disk label, IBM PC BPB, Victor floppy.
/// An image matching none of those but whose length equals one of the four
/// canonical IBM sizes is treated as a headerless IBM PC image.
pub fn detect(header: &[u8], total_len: u64) -> DiskResult<Detected> {
    if header.len() < SECTOR_SIZE {
        return Err(DiskError::UnknownFormat);
    }
    let boot = &header[..SECTOR_SIZE];

    if total_len >= 2 * 1024 * 1024 && harddisk::label_sniff(boot) {
        debug!("detected Victor hard disk label ({} bytes)", total_len);
        return Ok(Detected::HardDisk);
    }

    if boot[0x1FE] == 0x55 && boot[0x1FF] == 0xAA && bpb_is_consistent(boot) {
        let geometry = geometry_from_bpb(boot);
        debug!(
            "detected IBM PC floppy via BPB: {} ({} sectors)",
            geometry.variant.describe(),
            geometry.total_sectors
        );
        return Ok(Detected::Floppy(geometry));
    }

    let total_sectors = (total_len / SECTOR_SIZE as u64) as u32;
    let is_victor_size =
        total_len == VICTOR_SS.image_bytes() || total_len == VICTOR_DS.image_bytes();

    if is_victor_size || victor_boot_plausible(boot) {
        let flags = le16(boot, 32);
        let double_sided = flags & 0x0001 != 0;
        let params = if double_sided { &VICTOR_DS } else { &VICTOR_SS };

        let mut data_start = le16(boot, 28) as u32;
        if data_start == 0 || data_start >= total_sectors.max(1) {
            data_start = params.data_start_sector;
        }
        let total = if total_sectors > 0 {
            total_sectors
        } else {
            params.total_sectors
        };
        debug!(
            "detected {} (data_start={})",
            params.variant.describe(),
            data_start
        );
        return Ok(Detected::Floppy(victor_geometry(
            params.variant,
            data_start,
            total,
        )));
    }

    // Legacy escape hatch: a raw dump with no recognizable header but an
    // exact IBM floppy length.
    if let Some(params) = IBM_FORMATS.iter().find(|p| p.image_bytes() == total_len) {
        debug!("headerless image matches {} by size", params.variant.describe());
        return Ok(Detected::Floppy(ibm_geometry(params, params.total_sectors)));
    }

    Err(DiskError::UnknownFormat)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn victor_ds_boot() -> Vec<u8> {
        let mut boot = vec![0u8; 2048];
        boot[26..28].copy_from_slice(&512u16.to_le_bytes());
        boot[32..34].copy_from_slice(&0x0001u16.to_le_bytes());
        boot
    }

    #[test]
    fn test_detect_victor_ds_defaults() {
        // Flags word says double-sided, data start left zero.
        let header = victor_ds_boot();
        let detected = detect(&header, VICTOR_DS.image_bytes()).unwrap();
        let geom = match detected {
            Detected::Floppy(g) => g,
            _ => panic!("expected floppy"),
        };
        assert_eq!(geom.variant, FormatVariant::VictorDs);
        assert_eq!(geom.fat_sectors, 2);
        assert_eq!(geom.root_dir_start_sector(), 5);
        assert_eq!(geom.data_start_sector, 13);
        assert_eq!(geom.sectors_per_cluster, 4);
    }

    #[test]
    fn test_detect_victor_ss() {
        let mut header = victor_ds_boot();
        header[32] = 0x00;
        let detected = detect(&header, VICTOR_SS.image_bytes()).unwrap();
        let geom = match detected {
            Detected::Floppy(g) => g,
            _ => panic!("expected floppy"),
        };
        assert_eq!(geom.variant, FormatVariant::VictorSs);
        assert_eq!(geom.fat_sectors, 1);
        assert_eq!(geom.root_dir_start_sector(), 3);
        assert_eq!(geom.data_start_sector, 11);
    }

    #[test]
    fn test_detect_victor_explicit_data_start() {
        let mut header = victor_ds_boot();
        header[28..30].copy_from_slice(&14u16.to_le_bytes());
        let detected = detect(&header, VICTOR_DS.image_bytes()).unwrap();
        match detected {
            Detected::Floppy(g) => assert_eq!(g.data_start_sector, 14),
            _ => panic!("expected floppy"),
        }
    }

    fn ibm_boot(total: u16, spc: u8, fat_sectors: u16, root_entries: u16) -> Vec<u8> {
        let mut boot = vec![0u8; 2048];
        boot[0x0B..0x0D].copy_from_slice(&512u16.to_le_bytes());
        boot[0x0D] = spc;
        boot[0x0E..0x10].copy_from_slice(&1u16.to_le_bytes());
        boot[0x10] = 2;
        boot[0x11..0x13].copy_from_slice(&root_entries.to_le_bytes());
        boot[0x13..0x15].copy_from_slice(&total.to_le_bytes());
        boot[0x15] = 0xF0;
        boot[0x16..0x18].copy_from_slice(&fat_sectors.to_le_bytes());
        boot[0x1FE] = 0x55;
        boot[0x1FF] = 0xAA;
        boot
    }

    #[test]
    fn test_detect_ibm_144m() {
        let header = ibm_boot(2880, 1, 9, 224);
        let detected = detect(&header, 2880 * 512).unwrap();
        let geom = match detected {
            Detected::Floppy(g) => g,
            _ => panic!("expected floppy"),
        };
        assert_eq!(geom.variant, FormatVariant::IbmPc144M);
        assert_eq!(geom.fat_start_sector(), 1);
        assert_eq!(geom.root_dir_start_sector(), 19);
        assert_eq!(geom.data_start_sector, 33);
        assert_eq!(geom.total_clusters, 2847);
    }

    #[test]
    fn test_detect_ibm_bad_signature_falls_through() {
        let mut header = ibm_boot(2880, 1, 9, 224);
        header[0x1FE] = 0x00;
        // Length still matches 1.44M so the headerless fallback kicks in.
        let detected = detect(&header, 2880 * 512).unwrap();
        match detected {
            Detected::Floppy(g) => assert_eq!(g.variant, FormatVariant::IbmPc144M),
            _ => panic!("expected floppy"),
        }
    }

    #[test]
    fn test_detect_unknown_format() {
        let header = vec![0u8; 2048];
        let err = detect(&header, 1000).unwrap_err();
        assert!(matches!(err, DiskError::UnknownFormat));
    }

    #[test]
    fn test_cluster_to_sector() {
        let geom = VICTOR_DS.geometry();
        assert_eq!(geom.cluster_to_sector(2), 13);
        assert_eq!(geom.cluster_to_sector(3), 17);
    }
}
