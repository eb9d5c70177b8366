//! Creation of blank, formatted disk images.
//!
//! A fresh image carries a canonical boot sector (or Victor header), both
//! FAT copies with entries 0 and 1 seeded, a zeroed root directory, and
//! optionally a volume-label entry as the first root entry. Victor floppies
//! are filled with `0xF6`, matching what MS-DOS FORMAT leaves behind; IBM
//! images are zero-filled.

use log::debug;

use crate::block::{BlockDevice, SECTOR_SIZE};
use crate::dir::{ATTR_VOLUME_LABEL, DIR_ENTRY_SIZE};
use crate::error::{DiskError, DiskResult};
use crate::fat::Fat;
use crate::geometry::{FormatVariant, Geometry, IbmParams, VictorParams};

/// Total image size in bytes for a floppy variant.
pub fn image_size(variant: FormatVariant) -> Option<u64> {
    if let Some(p) = IbmParams::for_variant(variant) {
        return Some(p.image_bytes());
    }
    VictorParams::for_variant(variant).map(|p| p.image_bytes())
}

/// Format a pristine image of `variant` onto `dev`. Returns the resolved
/// geometry. Hard-disk volumes cannot be created this way.
pub fn create_image(
    dev: &mut dyn BlockDevice,
    variant: FormatVariant,
    label: Option<&str>,
) -> DiskResult<Geometry> {
    let (geometry, fill) = match variant {
        FormatVariant::VictorSs | FormatVariant::VictorDs => {
            let params = VictorParams::for_variant(variant).unwrap();
            (params.geometry(), 0xF6u8)
        }
        FormatVariant::VictorHdVolume => return Err(DiskError::UnknownFormat),
        _ => {
            let params = IbmParams::for_variant(variant).ok_or(DiskError::UnknownFormat)?;
            (
                crate::geometry::ibm_geometry(params, params.total_sectors),
                0x00u8,
            )
        }
    };

    // Fill pass first; header, FATs, and root overwrite it below.
    let fill_sector = vec![fill; SECTOR_SIZE];
    for s in 0..geometry.total_sectors as u64 {
        dev.write_sector(s, &fill_sector)?;
    }

    let boot = match variant {
        FormatVariant::VictorSs | FormatVariant::VictorDs => {
            victor_boot_sector(VictorParams::for_variant(variant).unwrap())
        }
        _ => ibm_boot_sector(IbmParams::for_variant(variant).unwrap(), label),
    };
    dev.write_sector(0, &boot)?;

    // Both FAT copies, entries 0 and 1 seeded.
    let fat = Fat::formatted(
        geometry.fat_bytes(),
        geometry.media_descriptor,
        geometry.total_clusters,
    );
    let fat_start = geometry.fat_start_sector() as u64;
    let per_copy = geometry.fat_sectors as u64;
    for copy in 0..geometry.fat_count as u64 {
        for s in 0..per_copy {
            let off = s as usize * SECTOR_SIZE;
            dev.write_sector(
                fat_start + copy * per_copy + s,
                &fat.bytes()[off..off + SECTOR_SIZE],
            )?;
        }
    }

    // Zeroed root directory.
    let zeros = vec![0u8; SECTOR_SIZE];
    let root_start = geometry.root_dir_start_sector() as u64;
    for s in 0..geometry.root_dir_sectors as u64 {
        dev.write_sector(root_start + s, &zeros)?;
    }

    if let Some(label) = label {
        let mut sector = vec![0u8; SECTOR_SIZE];
        sector[..DIR_ENTRY_SIZE].copy_from_slice(&volume_label_entry(label));
        dev.write_sector(root_start, &sector)?;
    }

    dev.flush()?;
    debug!(
        "created {} image ({} sectors)",
        geometry.variant.describe(),
        geometry.total_sectors
    );
    Ok(geometry)
}

/// Create and format an image file on the host filesystem.
pub fn create_image_file(
    path: &std::path::Path,
    variant: FormatVariant,
    label: Option<&str>,
) -> DiskResult<Geometry> {
    let size = image_size(variant).ok_or(DiskError::UnknownFormat)?;
    let mut dev = crate::block::FileDevice::create(path, size)?;
    create_image(&mut dev, variant, label)
}

/// Victor 9000 floppy header: system id, sector size, data start, flags,
/// disc type. The boot-code area is left zeroed.
fn victor_boot_sector(params: &VictorParams) -> Vec<u8> {
    let mut boot = vec![0u8; SECTOR_SIZE];
    boot[0..2].copy_from_slice(&0xFF00u16.to_le_bytes());
    boot[26..28].copy_from_slice(&(SECTOR_SIZE as u16).to_le_bytes());
    boot[28..30].copy_from_slice(&(params.data_start_sector as u16).to_le_bytes());
    boot[32..34].copy_from_slice(&params.flags.to_le_bytes());
    boot[34] = 0x10;
    boot
}

/// IBM PC boot sector with a full BIOS Parameter Block.
fn ibm_boot_sector(params: &IbmParams, label: Option<&str>) -> Vec<u8> {
    let mut boot = vec![0u8; SECTOR_SIZE];
    boot[0..3].copy_from_slice(&[0xEB, 0x3C, 0x90]); // JMP short + NOP
    boot[0x03..0x0B].copy_from_slice(b"MSDOS5.0");

    boot[0x0B..0x0D].copy_from_slice(&(SECTOR_SIZE as u16).to_le_bytes());
    boot[0x0D] = params.sectors_per_cluster as u8;
    boot[0x0E..0x10].copy_from_slice(&1u16.to_le_bytes());
    boot[0x10] = 2;
    boot[0x11..0x13].copy_from_slice(&(params.root_dir_entries as u16).to_le_bytes());
    boot[0x13..0x15].copy_from_slice(&(params.total_sectors as u16).to_le_bytes());
    boot[0x15] = params.media_descriptor;
    boot[0x16..0x18].copy_from_slice(&(params.fat_sectors as u16).to_le_bytes());
    boot[0x18..0x1A].copy_from_slice(&params.sectors_per_track.to_le_bytes());
    boot[0x1A..0x1C].copy_from_slice(&params.heads.to_le_bytes());

    // Extended BPB
    boot[0x26] = 0x29;
    boot[0x27..0x2B].copy_from_slice(&0x1234_5678u32.to_le_bytes());
    boot[0x2B..0x36].copy_from_slice(&padded_label(label.unwrap_or("NO NAME")));
    boot[0x36..0x3E].copy_from_slice(b"FAT12   ");

    boot[0x1FE] = 0x55;
    boot[0x1FF] = 0xAA;
    boot
}

fn padded_label(label: &str) -> [u8; 11] {
    let mut out = [0x20u8; 11];
    for (i, b) in label
        .to_ascii_uppercase()
        .bytes()
        .take(11)
        .enumerate()
    {
        out[i] = b;
    }
    out
}

/// First-root-slot volume label entry. Timestamps stay zero, decoding to
/// the 1980-01-01 sentinel.
fn volume_label_entry(label: &str) -> [u8; DIR_ENTRY_SIZE] {
    let mut entry = [0u8; DIR_ENTRY_SIZE];
    entry[..11].copy_from_slice(&padded_label(label));
    entry[11] = ATTR_VOLUME_LABEL;
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::MemoryDevice;

    #[test]
    fn test_create_144m_layout() {
        let mut dev = MemoryDevice::new(0);
        let geom = create_image(&mut dev, FormatVariant::IbmPc144M, Some("HELLO")).unwrap();

        assert_eq!(dev.len(), 1_474_560);
        assert_eq!(geom.fat_start_sector(), 1);
        assert_eq!(geom.fat_sectors, 9);
        assert_eq!(geom.root_dir_start_sector(), 19);
        assert_eq!(geom.root_dir_sectors, 14);
        assert_eq!(geom.data_start_sector, 33);

        let bytes = dev.bytes();
        assert_eq!(&bytes[0x1FE..0x200], &[0x55, 0xAA]);

        // FAT1 at sector 1, FAT2 at sector 10, entries [0]=0xFF0, [1]=0xFFF.
        for fat_off in [SECTOR_SIZE, 10 * SECTOR_SIZE] {
            assert_eq!(&bytes[fat_off..fat_off + 3], &[0xF0, 0xFF, 0xFF]);
        }

        // First root entry is the volume label.
        let root = 19 * SECTOR_SIZE;
        assert_eq!(&bytes[root..root + 11], b"HELLO      ");
        assert_eq!(bytes[root + 11], ATTR_VOLUME_LABEL);
    }

    #[test]
    fn test_create_victor_ds() {
        let mut dev = MemoryDevice::new(0);
        let geom = create_image(&mut dev, FormatVariant::VictorDs, None).unwrap();

        assert_eq!(dev.len(), 2448 * SECTOR_SIZE as u64);
        assert_eq!(geom.fat_sectors, 2);
        assert_eq!(geom.root_dir_start_sector(), 5);
        assert_eq!(geom.data_start_sector, 13);

        let bytes = dev.bytes();
        assert_eq!(&bytes[0..2], &[0x00, 0xFF]); // system id 0xFF00
        assert_eq!(u16::from_le_bytes([bytes[26], bytes[27]]), 512);
        assert_eq!(u16::from_le_bytes([bytes[28], bytes[29]]), 13);
        assert_eq!(u16::from_le_bytes([bytes[32], bytes[33]]), 0x0001);
        assert_eq!(bytes[34], 0x10);

        // FAT entry 0 carries the Victor media descriptor.
        assert_eq!(&bytes[SECTOR_SIZE..SECTOR_SIZE + 3], &[0x01, 0xFF, 0xFF]);

        // Data area carries the 0xF6 format fill, root directory is zeroed.
        assert_eq!(bytes[13 * SECTOR_SIZE], 0xF6);
        assert_eq!(bytes[5 * SECTOR_SIZE], 0x00);
    }

    #[test]
    fn test_create_hd_volume_rejected() {
        let mut dev = MemoryDevice::new(0);
        let err = create_image(&mut dev, FormatVariant::VictorHdVolume, None).unwrap_err();
        assert!(matches!(err, DiskError::UnknownFormat));
    }

    #[test]
    fn test_created_image_redetects() {
        for variant in [
            FormatVariant::VictorSs,
            FormatVariant::VictorDs,
            FormatVariant::IbmPc360,
            FormatVariant::IbmPc720,
            FormatVariant::IbmPc12M,
            FormatVariant::IbmPc144M,
        ] {
            let mut dev = MemoryDevice::new(0);
            create_image(&mut dev, variant, None).unwrap();
            let header = dev.bytes()[..2048].to_vec();
            let detected = crate::geometry::detect(&header, dev.len()).unwrap();
            match detected {
                crate::geometry::Detected::Floppy(g) => assert_eq!(g.variant, variant),
                _ => panic!("floppy expected"),
            }
        }
    }
}
