//! Image auto-detection dispatch across all supported media.

use v9kdisk_core::{
    create_image, BlockDevice, DiskError, DiskImage, FormatVariant, MemoryDevice, SECTOR_SIZE,
};

#[test]
fn test_dispatch_created_floppies() {
    for (variant, want_victor) in [
        (FormatVariant::VictorSs, true),
        (FormatVariant::VictorDs, true),
        (FormatVariant::IbmPc360, false),
        (FormatVariant::IbmPc144M, false),
    ] {
        let mut dev = MemoryDevice::new(0);
        create_image(&mut dev, variant, None).unwrap();
        let image = DiskImage::from_device(Box::new(dev), false).unwrap();
        match image {
            DiskImage::VictorFloppy(f) => {
                assert!(want_victor, "{:?}", variant);
                assert_eq!(f.geometry().variant, variant);
            }
            DiskImage::IbmFloppy(f) => {
                assert!(!want_victor, "{:?}", variant);
                assert_eq!(f.geometry().variant, variant);
            }
            _ => panic!("unexpected image kind for {:?}", variant),
        }
    }
}

#[test]
fn test_dispatch_cpm_floppy() {
    // A Victor-sized image with a CP/M directory at sector 76 and no FAT
    // header classifies as CP/M.
    let mut dev = MemoryDevice::new(1224 * SECTOR_SIZE);
    let mut dir = vec![0xE5u8; SECTOR_SIZE];
    for (slot, name) in [(0usize, b"PIP     COM"), (1, b"STAT    COM")] {
        let off = slot * 32;
        dir[off] = 0; // user 0
        dir[off + 1..off + 12].copy_from_slice(name);
        dir[off + 15] = 1; // one record
        dir[off + 16..off + 18].copy_from_slice(&((slot as u16 + 1).to_le_bytes()));
    }
    dev.write_at(76 * SECTOR_SIZE as u64, &dir).unwrap();

    let image = DiskImage::from_device(Box::new(dev), false).unwrap();
    let DiskImage::Cpm(mut cpm) = image else {
        panic!("expected CP/M image");
    };
    let files = cpm.list_files().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].name, "PIP.COM");
    assert_eq!(files[1].name, "STAT.COM");
}

#[test]
fn test_dispatch_unknown_format() {
    let dev = MemoryDevice::new(1000);
    let err = DiskImage::from_device(Box::new(dev), false).unwrap_err();
    assert!(matches!(err, DiskError::UnknownFormat));
}
