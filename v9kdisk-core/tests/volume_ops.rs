//! End-to-end volume operations on freshly created images.

use chrono::{NaiveDate, NaiveDateTime};

use v9kdisk_core::dir::{ATTR_ARCHIVE, ATTR_DIRECTORY, ATTR_HIDDEN, ATTR_READ_ONLY};
use v9kdisk_core::{
    create_image, verify_volume, volume_stats, BlockDevice, DiskError, FormatVariant,
    MemoryDevice, Volume, SECTOR_SIZE,
};

fn ts() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1983, 11, 2)
        .unwrap()
        .and_hms_opt(9, 15, 30)
        .unwrap()
}

fn comps(path: &str) -> Vec<String> {
    path.split('\\')
        .filter(|c| !c.is_empty())
        .map(|c| c.to_string())
        .collect()
}

fn fresh_device(variant: FormatVariant, label: Option<&str>) -> MemoryDevice {
    let mut dev = MemoryDevice::new(0);
    create_image(&mut dev, variant, label).unwrap();
    dev
}

fn open_volume(dev: &mut MemoryDevice, variant: FormatVariant) -> Volume<'_> {
    let geometry = match v9kdisk_core::detect(&dev.bytes()[..2048].to_vec(), dev.len()).unwrap() {
        v9kdisk_core::Detected::Floppy(g) => g,
        _ => panic!("expected floppy"),
    };
    assert_eq!(geometry.variant, variant);
    Volume::open(dev, 0, geometry, true).unwrap()
}

/// Byte pattern that does not repeat at sector granularity.
fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn test_fresh_image_lists_only_label() {
    let mut dev = fresh_device(FormatVariant::VictorDs, Some("SAMPLES"));
    let mut vol = open_volume(&mut dev, FormatVariant::VictorDs);

    assert_eq!(vol.volume_label().unwrap().as_deref(), Some("SAMPLES"));
    assert!(vol.list(&[], false).unwrap().is_empty());
}

#[test]
fn test_copy_roundtrip_command_com() {
    // 26,912 bytes on a 2048-byte-cluster volume: 14 clusters, the last
    // carrying only 288 bytes.
    let mut dev = fresh_device(FormatVariant::VictorDs, None);
    let mut vol = open_volume(&mut dev, FormatVariant::VictorDs);

    let data = pattern(26_912);
    vol.write_file(&comps("COMMAND.COM"), &data, false, ATTR_ARCHIVE, ts())
        .unwrap();

    let listed = vol.list(&[], false).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].entry.file_name(), "COMMAND.COM");
    assert_eq!(listed[0].entry.file_size, 26_912);

    let chain = vol.fat().chain(listed[0].entry.first_cluster).unwrap();
    assert_eq!(chain.len(), 14);

    let back = vol.read_file(&comps("COMMAND.COM")).unwrap();
    assert_eq!(back, data);
}

#[test]
fn test_fat_copies_identical_after_flush() {
    let mut dev = fresh_device(FormatVariant::VictorDs, None);
    {
        let mut vol = open_volume(&mut dev, FormatVariant::VictorDs);
        vol.write_file(&comps("A.BIN"), &pattern(5000), false, ATTR_ARCHIVE, ts())
            .unwrap();
    }
    // Victor DS: FAT1 at sectors 1-2, FAT2 at sectors 3-4.
    let bytes = dev.bytes();
    assert_eq!(
        &bytes[SECTOR_SIZE..3 * SECTOR_SIZE],
        &bytes[3 * SECTOR_SIZE..5 * SECTOR_SIZE]
    );
}

#[test]
fn test_zero_length_file() {
    let mut dev = fresh_device(FormatVariant::IbmPc144M, None);
    let mut vol = open_volume(&mut dev, FormatVariant::IbmPc144M);

    vol.write_file(&comps("EMPTY.DAT"), &[], false, ATTR_ARCHIVE, ts())
        .unwrap();
    let listed = vol.list(&[], false).unwrap();
    assert_eq!(listed[0].entry.first_cluster, 0);
    assert_eq!(listed[0].entry.file_size, 0);
    assert_eq!(vol.fat().free_count() as u32, vol.geometry().total_clusters);

    assert!(vol.read_file(&comps("EMPTY.DAT")).unwrap().is_empty());
}

#[test]
fn test_whole_cluster_file_terminates_on_eoc() {
    let mut dev = fresh_device(FormatVariant::VictorDs, None);
    let mut vol = open_volume(&mut dev, FormatVariant::VictorDs);

    let data = pattern(2 * 2048);
    vol.write_file(&comps("EXACT.BIN"), &data, false, ATTR_ARCHIVE, ts())
        .unwrap();

    let entry = vol.list(&[], false).unwrap()[0].entry.clone();
    let chain = vol.fat().chain(entry.first_cluster).unwrap();
    assert_eq!(chain.len(), 2);
    assert!(vol.fat().get(*chain.last().unwrap()) >= 0xFF8);
    assert_eq!(vol.read_file(&comps("EXACT.BIN")).unwrap(), data);
}

#[test]
fn test_overwrite_semantics() {
    let mut dev = fresh_device(FormatVariant::VictorDs, None);
    let mut vol = open_volume(&mut dev, FormatVariant::VictorDs);

    vol.write_file(&comps("F.TXT"), b"first", false, ATTR_ARCHIVE, ts())
        .unwrap();
    let err = vol
        .write_file(&comps("F.TXT"), b"second", false, ATTR_ARCHIVE, ts())
        .unwrap_err();
    assert!(matches!(err, DiskError::ExistsAndNoOverwrite(_)));

    vol.write_file(&comps("F.TXT"), b"second", true, ATTR_ARCHIVE, ts())
        .unwrap();
    assert_eq!(vol.read_file(&comps("F.TXT")).unwrap(), b"second");
    assert_eq!(vol.list(&[], false).unwrap().len(), 1);
}

#[test]
fn test_delete_then_recreate_same_chain_length() {
    let mut dev = fresh_device(FormatVariant::VictorDs, None);
    let mut vol = open_volume(&mut dev, FormatVariant::VictorDs);

    let data = pattern(6000);
    vol.write_file(&comps("X.BIN"), &data, false, ATTR_ARCHIVE, ts())
        .unwrap();
    let first = vol.list(&[], false).unwrap()[0].entry.clone();
    let len_before = vol.fat().chain(first.first_cluster).unwrap().len();

    vol.delete_file(&comps("X.BIN")).unwrap();
    assert!(vol.list(&[], false).unwrap().is_empty());
    assert!(matches!(
        vol.read_file(&comps("X.BIN")),
        Err(DiskError::NotFound(_))
    ));

    vol.write_file(&comps("X.BIN"), &data, false, ATTR_ARCHIVE, ts())
        .unwrap();
    let second = vol.list(&[], false).unwrap()[0].entry.clone();
    assert_eq!(
        vol.fat().chain(second.first_cluster).unwrap().len(),
        len_before
    );
    assert_eq!(vol.read_file(&comps("X.BIN")).unwrap(), data);
}

#[test]
fn test_out_of_space_leaves_volume_unchanged() {
    // Single-sided Victor floppy: 303 clusters of 2048 bytes.
    let mut dev = fresh_device(FormatVariant::VictorSs, None);
    let mut vol = open_volume(&mut dev, FormatVariant::VictorSs);
    let free_before = vol.fat().free_count();

    let too_big = vec![0x55u8; (free_before + 1) * 2048];
    let err = vol
        .write_file(&comps("BIG.BIN"), &too_big, false, ATTR_ARCHIVE, ts())
        .unwrap_err();
    assert!(matches!(err, DiskError::OutOfSpace { .. }));

    assert_eq!(vol.fat().free_count(), free_before);
    assert!(vol.list(&[], false).unwrap().is_empty());
}

#[test]
fn test_wildcard_star_vs_star_dot_star() {
    let mut dev = fresh_device(FormatVariant::VictorDs, None);
    let mut vol = open_volume(&mut dev, FormatVariant::VictorDs);

    for name in ["XH", "FOO.COM", "BAR"] {
        vol.write_file(&comps(name), b"x", false, ATTR_ARCHIVE, ts())
            .unwrap();
    }

    let names = |vol: &mut Volume, pat: &str| -> Vec<String> {
        let mut v: Vec<String> = vol
            .list(&[pat.to_string()], false)
            .unwrap()
            .iter()
            .map(|l| l.entry.file_name())
            .collect();
        v.sort();
        v
    };

    assert_eq!(names(&mut vol, "*"), vec!["BAR", "FOO.COM", "XH"]);
    assert_eq!(names(&mut vol, "*.*"), vec!["FOO.COM"]);
    assert_eq!(names(&mut vol, "*.COM"), vec!["FOO.COM"]);
    assert_eq!(names(&mut vol, "?H"), vec!["XH"]);
}

#[test]
fn test_subdirectory_roundtrip_and_dot_entries() {
    let mut dev = fresh_device(FormatVariant::VictorDs, None);
    let mut vol = open_volume(&mut dev, FormatVariant::VictorDs);

    vol.make_dir(&comps("SUB"), ts()).unwrap();
    vol.write_file(&comps("SUB\\DEEP.TXT"), b"below", false, ATTR_ARCHIVE, ts())
        .unwrap();

    assert_eq!(vol.read_file(&comps("SUB\\DEEP.TXT")).unwrap(), b"below");

    // `.` points at the directory itself, `..` at the root (cluster 0).
    let sub = vol.list(&[], false).unwrap()[0].entry.clone();
    assert!(sub.is_directory());
    let slots = vol
        .scan_dir(v9kdisk_core::DirHandle::Chain(sub.first_cluster))
        .unwrap();
    assert_eq!(slots[0].1.file_name(), ".");
    assert_eq!(slots[0].1.first_cluster, sub.first_cluster);
    assert_eq!(slots[1].1.file_name(), "..");
    assert_eq!(slots[1].1.first_cluster, 0);

    // Recursive listing is pre-order: parent before child.
    let recursive = vol.list(&[], true).unwrap();
    let paths: Vec<&str> = recursive.iter().map(|l| l.path.as_str()).collect();
    assert_eq!(paths, vec!["SUB", "SUB\\DEEP.TXT"]);
}

#[test]
fn test_subdirectory_growth_allocates_one_cluster() {
    let mut dev = fresh_device(FormatVariant::VictorDs, None);
    let mut vol = open_volume(&mut dev, FormatVariant::VictorDs);

    vol.make_dir(&comps("SUB"), ts()).unwrap();
    let sub = vol.list(&[], false).unwrap()[0].entry.clone();

    // A 2048-byte cluster holds 64 entries; `.` and `..` occupy two.
    for i in 0..62 {
        let name = format!("SUB\\F{:03}.DAT", i);
        vol.write_file(&comps(&name), b"", false, ATTR_ARCHIVE, ts())
            .unwrap();
    }
    assert_eq!(vol.fat().chain(sub.first_cluster).unwrap().len(), 1);

    vol.write_file(&comps("SUB\\F062.DAT"), b"", false, ATTR_ARCHIVE, ts())
        .unwrap();
    assert_eq!(vol.fat().chain(sub.first_cluster).unwrap().len(), 2);

    // Existing entries survived the growth.
    let listed = vol.list(&comps("SUB"), false).unwrap();
    assert_eq!(listed.len(), 63);
    assert_eq!(
        vol.read_file(&comps("SUB\\F000.DAT")).unwrap(),
        Vec::<u8>::new()
    );
}

#[test]
fn test_root_directory_full() {
    // Single-sided Victor root holds 128 entries.
    let mut dev = fresh_device(FormatVariant::VictorSs, None);
    let mut vol = open_volume(&mut dev, FormatVariant::VictorSs);

    for i in 0..128 {
        let name = format!("F{:03}.DAT", i);
        vol.write_file(&comps(&name), b"", false, ATTR_ARCHIVE, ts())
            .unwrap();
    }
    let err = vol
        .write_file(&comps("F128.DAT"), b"", false, ATTR_ARCHIVE, ts())
        .unwrap_err();
    assert!(matches!(err, DiskError::DirectoryFull));
}

#[test]
fn test_remove_dir() {
    let mut dev = fresh_device(FormatVariant::VictorDs, None);
    let mut vol = open_volume(&mut dev, FormatVariant::VictorDs);

    vol.make_dir(&comps("SUB"), ts()).unwrap();
    vol.write_file(&comps("SUB\\A.TXT"), b"a", false, ATTR_ARCHIVE, ts())
        .unwrap();

    let err = vol.remove_dir(&comps("SUB"), false).unwrap_err();
    assert!(matches!(err, DiskError::DirectoryNotEmpty(_)));

    vol.remove_dir(&comps("SUB"), true).unwrap();
    assert!(vol.list(&[], false).unwrap().is_empty());
    assert_eq!(vol.fat().free_count() as u32, vol.geometry().total_clusters);
}

#[test]
fn test_set_attrs_and_read_only_protection() {
    let mut dev = fresh_device(FormatVariant::VictorDs, None);
    let mut vol = open_volume(&mut dev, FormatVariant::VictorDs);

    vol.write_file(&comps("LOCKED.TXT"), b"keep", false, ATTR_ARCHIVE, ts())
        .unwrap();
    let attrs = vol
        .set_attrs(&comps("LOCKED.TXT"), ATTR_READ_ONLY | ATTR_HIDDEN, 0)
        .unwrap();
    assert_eq!(attrs, ATTR_ARCHIVE | ATTR_READ_ONLY | ATTR_HIDDEN);

    assert!(matches!(
        vol.delete_file(&comps("LOCKED.TXT")),
        Err(DiskError::AttributeProtected(_))
    ));
    assert!(matches!(
        vol.write_file(&comps("LOCKED.TXT"), b"new", true, ATTR_ARCHIVE, ts()),
        Err(DiskError::AttributeProtected(_))
    ));

    // The volume-label bit is off limits.
    assert!(matches!(
        vol.set_attrs(&comps("LOCKED.TXT"), 0x08, 0),
        Err(DiskError::AttributeProtected(_))
    ));

    let attrs = vol
        .set_attrs(&comps("LOCKED.TXT"), 0, ATTR_READ_ONLY | ATTR_HIDDEN)
        .unwrap();
    assert_eq!(attrs, ATTR_ARCHIVE);
    vol.delete_file(&comps("LOCKED.TXT")).unwrap();
}

#[test]
fn test_rename() {
    let mut dev = fresh_device(FormatVariant::VictorDs, None);
    let mut vol = open_volume(&mut dev, FormatVariant::VictorDs);

    vol.write_file(&comps("OLD.TXT"), b"data", false, ATTR_ARCHIVE, ts())
        .unwrap();
    vol.write_file(&comps("TAKEN.TXT"), b"x", false, ATTR_ARCHIVE, ts())
        .unwrap();

    assert!(matches!(
        vol.rename(&comps("OLD.TXT"), "TAKEN.TXT"),
        Err(DiskError::ExistsAndNoOverwrite(_))
    ));

    vol.rename(&comps("OLD.TXT"), "NEW.TXT").unwrap();
    assert_eq!(vol.read_file(&comps("NEW.TXT")).unwrap(), b"data");
    assert!(matches!(
        vol.read_file(&comps("OLD.TXT")),
        Err(DiskError::NotFound(_))
    ));
}

#[test]
fn test_path_resolution_errors() {
    let mut dev = fresh_device(FormatVariant::VictorDs, None);
    let mut vol = open_volume(&mut dev, FormatVariant::VictorDs);

    vol.write_file(&comps("PLAIN.TXT"), b"x", false, ATTR_ARCHIVE, ts())
        .unwrap();

    assert!(matches!(
        vol.read_file(&comps("NOPE.TXT")),
        Err(DiskError::NotFound(_))
    ));
    assert!(matches!(
        vol.read_file(&comps("PLAIN.TXT\\INNER.TXT")),
        Err(DiskError::NotADirectory(_))
    ));
    assert!(matches!(
        vol.write_file(&comps("BAD NAME.TXT"), b"x", false, ATTR_ARCHIVE, ts()),
        Err(DiskError::InvalidName(_))
    ));
}

#[test]
fn test_verify_clean_volume() {
    let mut dev = fresh_device(FormatVariant::VictorDs, Some("CLEAN"));
    let mut vol = open_volume(&mut dev, FormatVariant::VictorDs);
    vol.make_dir(&comps("SUB"), ts()).unwrap();
    vol.write_file(&comps("SUB\\F.BIN"), &pattern(5000), false, ATTR_ARCHIVE, ts())
        .unwrap();

    let report = verify_volume(&mut vol).unwrap();
    assert!(report.is_clean(), "{:?}", report);
    assert_eq!(report.files_checked, 1);
    assert_eq!(report.directories_checked, 2);
}

#[test]
fn test_verify_detects_cross_link_and_orphan() {
    let mut dev = fresh_device(FormatVariant::VictorDs, None);
    {
        let mut vol = open_volume(&mut dev, FormatVariant::VictorDs);
        // A takes clusters 2-3, B takes 4-5.
        vol.write_file(&comps("A.BIN"), &pattern(3000), false, ATTR_ARCHIVE, ts())
            .unwrap();
        vol.write_file(&comps("B.BIN"), &pattern(3000), false, ATTR_ARCHIVE, ts())
            .unwrap();
    }

    // Patch both FAT copies so B's chain is 4 -> 3, sharing cluster 3 with
    // A and leaving cluster 5 orphaned. Entry 4 sits at byte offset 6 of
    // each copy (FAT1 at sector 1, FAT2 at sector 3 on a Victor DS image).
    let mut bytes = dev.bytes().to_vec();
    for fat_base in [SECTOR_SIZE, 3 * SECTOR_SIZE] {
        bytes[fat_base + 6] = 0x03;
        bytes[fat_base + 7] &= 0xF0;
    }
    let mut dev = MemoryDevice::from_bytes(bytes);

    let mut vol = open_volume(&mut dev, FormatVariant::VictorDs);
    let report = verify_volume(&mut vol).unwrap();
    assert!(!report.is_clean());
    assert_eq!(report.cross_links.len(), 1);
    assert_eq!(report.cross_links[0].cluster, 3);
    assert_eq!(report.cross_links[0].paths.len(), 2);
    assert_eq!(report.orphan_clusters, 1);
    assert_eq!(report.fat_mismatches, 0);
}

#[test]
fn test_verify_detects_fat_divergence() {
    let mut dev = fresh_device(FormatVariant::VictorDs, None);
    {
        let mut vol = open_volume(&mut dev, FormatVariant::VictorDs);
        vol.write_file(&comps("A.BIN"), &pattern(3000), false, ATTR_ARCHIVE, ts())
            .unwrap();
    }
    // Corrupt one entry of FAT copy 2 only.
    let mut bytes = dev.bytes().to_vec();
    bytes[3 * SECTOR_SIZE + 6] ^= 0xFF;
    let mut dev = MemoryDevice::from_bytes(bytes);

    let mut vol = open_volume(&mut dev, FormatVariant::VictorDs);
    let report = verify_volume(&mut vol).unwrap();
    assert!(report.fat_mismatches >= 1);
}

#[test]
fn test_volume_stats() {
    let mut dev = fresh_device(FormatVariant::IbmPc144M, Some("STATS"));
    let mut vol = open_volume(&mut dev, FormatVariant::IbmPc144M);
    vol.make_dir(&comps("DIR1"), ts()).unwrap();
    vol.write_file(&comps("A.TXT"), &pattern(600), false, ATTR_ARCHIVE, ts())
        .unwrap();

    let stats = volume_stats(&mut vol).unwrap();
    assert_eq!(stats.variant, FormatVariant::IbmPc144M);
    assert_eq!(stats.volume_label.as_deref(), Some("STATS"));
    assert_eq!(stats.total_clusters, 2847);
    // One cluster for the directory, two for the 600-byte file on a
    // 512-byte-cluster volume.
    assert_eq!(stats.used_clusters, 3);
    assert_eq!(stats.file_count, 1);
    assert_eq!(stats.directory_count, 1);
}

#[test]
fn test_read_only_volume_refuses_mutation() {
    let mut dev = fresh_device(FormatVariant::VictorDs, None);
    let geometry = match v9kdisk_core::detect(&dev.bytes()[..2048].to_vec(), dev.len()).unwrap() {
        v9kdisk_core::Detected::Floppy(g) => g,
        _ => panic!("expected floppy"),
    };
    let mut vol = Volume::open(&mut dev, 0, geometry, false).unwrap();

    assert!(matches!(
        vol.write_file(&comps("A.TXT"), b"x", false, ATTR_ARCHIVE, ts()),
        Err(DiskError::ReadOnlyVolume)
    ));
    assert!(matches!(
        vol.make_dir(&comps("D"), ts()),
        Err(DiskError::ReadOnlyVolume)
    ));
    assert!(vol.list(&[], false).unwrap().is_empty());
}

#[test]
fn test_directory_attr_preserved_by_masks() {
    let mut dev = fresh_device(FormatVariant::VictorDs, None);
    let mut vol = open_volume(&mut dev, FormatVariant::VictorDs);
    vol.make_dir(&comps("SUB"), ts()).unwrap();

    // Clearing every file bit must not strip the directory bit.
    let attrs = vol
        .set_attrs(&comps("SUB"), 0, ATTR_READ_ONLY | ATTR_HIDDEN | ATTR_DIRECTORY)
        .unwrap();
    assert!(attrs & ATTR_DIRECTORY != 0);
}
