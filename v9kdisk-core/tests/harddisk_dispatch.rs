//! Hard disk label parsing, partition dispatch, and image auto-detection.

use chrono::{NaiveDate, NaiveDateTime};

use v9kdisk_core::dir::ATTR_ARCHIVE;
use v9kdisk_core::{BlockDevice, DiskError, DiskImage, Fat, MemoryDevice, SECTOR_SIZE};

const VOLUME_ADDRS: [u32; 2] = [0x40, 0x2000];
const VOLUME_CAPACITY: u32 = 4096;
// Volume-local layout: label, 2 x 4-sector FAT, 4 root sectors, data.
const VOLUME_DATA_START: u32 = 13;
const VOLUME_FAT_SECTORS: u32 = 4;
const VOLUME_UNIT: u16 = 4;
const VOLUME_DIR_ENTRIES: u16 = 64;

fn ts() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1985, 3, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

fn comps(path: &str) -> Vec<String> {
    path.split('\\')
        .filter(|c| !c.is_empty())
        .map(|c| c.to_string())
        .collect()
}

/// Build a two-volume Victor hard disk image in memory: physical label at
/// sector 0, volume labels at 0x40 and 0x2000, each volume formatted with
/// empty FAT copies and a zeroed root directory.
fn hard_disk_image() -> MemoryDevice {
    let total_sectors = VOLUME_ADDRS[1] + VOLUME_CAPACITY;
    let mut dev = MemoryDevice::new(total_sectors as usize * SECTOR_SIZE);

    // Physical label: type 1, 512-byte sectors, empty media lists, two
    // virtual volumes.
    let mut sector0 = vec![0u8; SECTOR_SIZE];
    sector0[0..2].copy_from_slice(&0x0001u16.to_le_bytes());
    sector0[2..4].copy_from_slice(&0x0001u16.to_le_bytes());
    sector0[4..12].copy_from_slice(b"HD-00042");
    sector0[20..22].copy_from_slice(&512u16.to_le_bytes());
    sector0[52] = 0;
    sector0[53] = 0;
    sector0[54] = VOLUME_ADDRS.len() as u8;
    for (i, addr) in VOLUME_ADDRS.iter().enumerate() {
        sector0[55 + i * 4..59 + i * 4].copy_from_slice(&addr.to_le_bytes());
    }
    dev.write_at(0, &sector0).unwrap();

    for (i, &addr) in VOLUME_ADDRS.iter().enumerate() {
        let mut label = vec![0u8; SECTOR_SIZE];
        label[0..2].copy_from_slice(&0x0001u16.to_le_bytes());
        let name = if i == 0 { b"SYSTEM" as &[u8] } else { b"USERS" };
        label[2..2 + name.len()].copy_from_slice(name);
        label[30..34].copy_from_slice(&VOLUME_CAPACITY.to_le_bytes());
        label[34..38].copy_from_slice(&VOLUME_DATA_START.to_le_bytes());
        label[38..40].copy_from_slice(&512u16.to_le_bytes());
        label[40..42].copy_from_slice(&VOLUME_UNIT.to_le_bytes());
        label[42..44].copy_from_slice(&VOLUME_DIR_ENTRIES.to_le_bytes());
        dev.write_at(addr as u64 * SECTOR_SIZE as u64, &label).unwrap();

        // Both FAT copies, freshly formatted.
        let total_clusters = (VOLUME_CAPACITY - VOLUME_DATA_START) / VOLUME_UNIT as u32;
        let fat = Fat::formatted(
            VOLUME_FAT_SECTORS as usize * SECTOR_SIZE,
            0xF8,
            total_clusters,
        );
        for copy in 0..2u64 {
            let sector = addr as u64 + 1 + copy * VOLUME_FAT_SECTORS as u64;
            dev.write_at(sector * SECTOR_SIZE as u64, fat.bytes()).unwrap();
        }
    }
    dev
}

#[test]
fn test_detects_hard_disk_and_lists_partitions() {
    let mut image = DiskImage::from_device(Box::new(hard_disk_image()), true).unwrap();
    assert!(image.is_hard_disk());

    let DiskImage::HardDisk(hd) = &mut image else {
        panic!("expected hard disk");
    };
    let partitions = hd.partitions();
    assert_eq!(partitions.len(), 2);
    assert_eq!(partitions[0].index, 0);
    assert_eq!(partitions[0].name, "SYSTEM");
    assert_eq!(partitions[1].name, "USERS");
    assert_eq!(
        partitions[1].capacity_bytes,
        VOLUME_CAPACITY as u64 * SECTOR_SIZE as u64
    );
}

#[test]
fn test_partition_required_without_selector() {
    let mut image = DiskImage::from_device(Box::new(hard_disk_image()), true).unwrap();
    assert!(matches!(
        image.volume(None),
        Err(DiskError::PartitionRequired)
    ));
    assert!(matches!(
        image.volume(Some(2)),
        Err(DiskError::PartitionOutOfRange { index: 2, count: 2 })
    ));
}

fn volume_geometry(dev: &MemoryDevice, addr: u32) -> v9kdisk_core::Geometry {
    let base = addr as usize * SECTOR_SIZE;
    let label =
        v9kdisk_core::VirtualVolumeLabel::parse(&dev.bytes()[base..base + SECTOR_SIZE], addr)
            .unwrap();
    label.geometry().unwrap()
}

#[test]
fn test_partition_slice_addressing() {
    // Scenario: volumes at sector addresses 0x40 and 0x2000; everything
    // written through partition 1 must land at or past byte 0x2000 * 512.
    let mut dev = hard_disk_image();
    let before = dev.bytes().to_vec();
    let geometry = volume_geometry(&dev, VOLUME_ADDRS[1]);
    assert_eq!(geometry.sectors_per_cluster, VOLUME_UNIT as u32);
    assert_eq!(geometry.fat_sectors, VOLUME_FAT_SECTORS);
    assert_eq!(geometry.root_dir_start_sector(), 9);
    assert_eq!(geometry.data_start_sector, VOLUME_DATA_START);

    {
        let mut vol =
            v9kdisk_core::Volume::open(&mut dev, VOLUME_ADDRS[1] as u64, geometry, true).unwrap();
        vol.write_file(&comps("HELLO.TXT"), b"hello hd", false, ATTR_ARCHIVE, ts())
            .unwrap();
        assert_eq!(vol.read_file(&comps("HELLO.TXT")).unwrap(), b"hello hd");
    }

    let after = dev.bytes();
    let slice_base = VOLUME_ADDRS[1] as usize * SECTOR_SIZE;
    assert_eq!(&after[..slice_base], &before[..slice_base]);
    // The volume's first FAT copy (local sector 1) picked up the allocation.
    let fat1 = slice_base + SECTOR_SIZE;
    assert_ne!(&after[fat1..fat1 + SECTOR_SIZE], &before[fat1..fat1 + SECTOR_SIZE]);
}

#[test]
fn test_partition_roundtrip_through_reopen() {
    let mut dev = hard_disk_image();
    let payload: Vec<u8> = (0..10_000).map(|i| (i % 199) as u8).collect();
    let geometry = volume_geometry(&dev, VOLUME_ADDRS[0]);

    {
        let mut vol =
            v9kdisk_core::Volume::open(&mut dev, VOLUME_ADDRS[0] as u64, geometry, true).unwrap();
        vol.write_file(&comps("DATA.BIN"), &payload, false, ATTR_ARCHIVE, ts())
            .unwrap();
    }

    // Remount: the FAT cache is rebuilt from disk, so the file must read
    // back bit-identical and the volume must verify clean.
    let mut vol =
        v9kdisk_core::Volume::open(&mut dev, VOLUME_ADDRS[0] as u64, geometry, true).unwrap();
    assert_eq!(vol.read_file(&comps("DATA.BIN")).unwrap(), payload);
    let report = v9kdisk_core::verify_volume(&mut vol).unwrap();
    assert!(report.is_clean(), "{:?}", report);
}
