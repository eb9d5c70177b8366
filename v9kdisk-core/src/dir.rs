//! 32-byte FAT directory entry codec.
//!
//! Layout:
//! - Bytes 0-7: name (space-padded; byte 0 doubles as a sentinel)
//! - Bytes 8-10: extension (space-padded)
//! - Byte 11: attributes
//! - Byte 12: NT reserved
//! - Byte 13: creation time, tenths
//! - Bytes 14-15 / 16-17: creation time / date
//! - Bytes 18-19: last access date
//! - Bytes 20-21: first cluster high (always 0 on FAT12)
//! - Bytes 22-23 / 24-25: write time / date
//! - Bytes 26-27: first cluster low
//! - Bytes 28-31: file size, little-endian
//!
//! Byte 0 sentinels: `0x00` end of directory, `0xE5` deleted, `0x05` escapes
//! a real `0xE5`, `0x2E` dot entry. An attribute byte of `0x0F` marks a VFAT
//! long-name entry, which this codec skips on read and never emits.

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::DiskResult;
use crate::name::validate_name;

pub const DIR_ENTRY_SIZE: usize = 32;

pub const ATTR_READ_ONLY: u8 = 0x01;
pub const ATTR_HIDDEN: u8 = 0x02;
pub const ATTR_SYSTEM: u8 = 0x04;
pub const ATTR_VOLUME_LABEL: u8 = 0x08;
pub const ATTR_DIRECTORY: u8 = 0x10;
pub const ATTR_ARCHIVE: u8 = 0x20;
pub const ATTR_LONG_NAME: u8 = 0x0F;

pub const ENTRY_END: u8 = 0x00;
pub const ENTRY_DELETED: u8 = 0xE5;
pub const ENTRY_E5_ESCAPE: u8 = 0x05;

/// Classification of a raw 32-byte directory slot.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryKind {
    /// End-of-directory marker; no further slots are meaningful.
    End,
    Deleted,
    /// VFAT long-name entry, skipped silently.
    LongName,
    Valid(DirEntry),
}

/// A decoded directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub raw_name: [u8; 8],
    pub raw_ext: [u8; 3],
    pub attributes: u8,
    pub create_time: u16,
    pub create_date: u16,
    pub access_date: u16,
    pub write_time: u16,
    pub write_date: u16,
    pub first_cluster: u16,
    pub file_size: u32,
}

impl DirEntry {
    /// Build an entry from a user-supplied 8.3 name. The name is validated
    /// and folded to upper case; the timestamp is caller-provided so that
    /// callers (and tests) stay deterministic.
    pub fn new(name: &str, attributes: u8, first_cluster: u16, file_size: u32, mtime: NaiveDateTime) -> DiskResult<Self> {
        let (raw_name, raw_ext) = validate_name(name)?;
        let (write_time, write_date) = pack_datetime(mtime);
        Ok(Self {
            raw_name,
            raw_ext,
            attributes,
            create_time: write_time,
            create_date: write_date,
            access_date: write_date,
            write_time,
            write_date,
            first_cluster,
            file_size,
        })
    }

    /// Entry with raw (unvalidated) name bytes; used for `.`/`..` and the
    /// volume label, which are not legal 8.3 names.
    pub fn with_raw_name(
        raw_name: [u8; 8],
        raw_ext: [u8; 3],
        attributes: u8,
        first_cluster: u16,
        mtime: NaiveDateTime,
    ) -> Self {
        let (write_time, write_date) = pack_datetime(mtime);
        Self {
            raw_name,
            raw_ext,
            attributes,
            create_time: write_time,
            create_date: write_date,
            access_date: write_date,
            write_time,
            write_date,
            first_cluster,
            file_size: 0,
        }
    }

    /// Decode one 32-byte slot.
    pub fn decode(raw: &[u8]) -> EntryKind {
        debug_assert!(raw.len() >= DIR_ENTRY_SIZE);
        match raw[0] {
            ENTRY_END => return EntryKind::End,
            ENTRY_DELETED => return EntryKind::Deleted,
            _ => {}
        }
        if raw[11] == ATTR_LONG_NAME {
            return EntryKind::LongName;
        }

        let mut raw_name = [0u8; 8];
        raw_name.copy_from_slice(&raw[0..8]);
        let mut raw_ext = [0u8; 3];
        raw_ext.copy_from_slice(&raw[8..11]);

        EntryKind::Valid(DirEntry {
            raw_name,
            raw_ext,
            attributes: raw[11],
            create_time: u16::from_le_bytes([raw[14], raw[15]]),
            create_date: u16::from_le_bytes([raw[16], raw[17]]),
            access_date: u16::from_le_bytes([raw[18], raw[19]]),
            write_time: u16::from_le_bytes([raw[22], raw[23]]),
            write_date: u16::from_le_bytes([raw[24], raw[25]]),
            first_cluster: u16::from_le_bytes([raw[26], raw[27]]),
            file_size: u32::from_le_bytes([raw[28], raw[29], raw[30], raw[31]]),
        })
    }

    /// Encode to the on-disk 32-byte form.
    pub fn encode(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut out = [0u8; DIR_ENTRY_SIZE];
        out[0..8].copy_from_slice(&self.raw_name);
        out[8..11].copy_from_slice(&self.raw_ext);
        out[11] = self.attributes;
        out[14..16].copy_from_slice(&self.create_time.to_le_bytes());
        out[16..18].copy_from_slice(&self.create_date.to_le_bytes());
        out[18..20].copy_from_slice(&self.access_date.to_le_bytes());
        out[22..24].copy_from_slice(&self.write_time.to_le_bytes());
        out[24..26].copy_from_slice(&self.write_date.to_le_bytes());
        out[26..28].copy_from_slice(&self.first_cluster.to_le_bytes());
        out[28..32].copy_from_slice(&self.file_size.to_le_bytes());
        out
    }

    /// Reconstructed `NAME.EXT`, trailing spaces trimmed. Bytes decode as
    /// Latin-1 since real images carry high-bit characters, and a leading
    /// `0x05` is unescaped back to `0xE5`.
    pub fn file_name(&self) -> String {
        let mut name_bytes = self.raw_name;
        if name_bytes[0] == ENTRY_E5_ESCAPE {
            name_bytes[0] = 0xE5;
        }
        let name: String = latin1(&name_bytes);
        let ext: String = latin1(&self.raw_ext);
        let name = name.trim_end_matches(' ');
        let ext = ext.trim_end_matches(' ');
        if ext.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", name, ext)
        }
    }

    /// Volume-label text: the name and extension fields read as one
    /// 11-byte field, trailing spaces trimmed.
    pub fn volume_label_text(&self) -> String {
        let mut bytes = Vec::with_capacity(11);
        bytes.extend_from_slice(&self.raw_name);
        bytes.extend_from_slice(&self.raw_ext);
        latin1(&bytes).trim_end_matches(' ').to_string()
    }

    pub fn is_directory(&self) -> bool {
        self.attributes & ATTR_DIRECTORY != 0
    }

    pub fn is_volume_label(&self) -> bool {
        self.attributes & ATTR_VOLUME_LABEL != 0
    }

    pub fn is_read_only(&self) -> bool {
        self.attributes & ATTR_READ_ONLY != 0
    }

    /// `.` or `..` entry.
    pub fn is_dot(&self) -> bool {
        self.raw_name[0] == b'.'
    }

    /// Last-write timestamp.
    pub fn modified(&self) -> NaiveDateTime {
        unpack_datetime(self.write_time, self.write_date)
    }

    /// Attribute summary like `RHSDA`, `-` when nothing is set.
    pub fn attr_string(&self) -> String {
        let mut s = String::new();
        for (bit, ch) in [
            (ATTR_READ_ONLY, 'R'),
            (ATTR_HIDDEN, 'H'),
            (ATTR_SYSTEM, 'S'),
            (ATTR_DIRECTORY, 'D'),
            (ATTR_ARCHIVE, 'A'),
        ] {
            if self.attributes & bit != 0 {
                s.push(ch);
            }
        }
        if s.is_empty() {
            s.push('-');
        }
        s
    }
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Pack a timestamp into FAT time and date words.
pub fn pack_datetime(dt: NaiveDateTime) -> (u16, u16) {
    use chrono::{Datelike, Timelike};
    let year = dt.year().clamp(1980, 2107) as u16;
    let date = ((year - 1980) << 9) | ((dt.month() as u16) << 5) | dt.day() as u16;
    let time =
        ((dt.hour() as u16) << 11) | ((dt.minute() as u16) << 5) | (dt.second() as u16 / 2);
    (time, date)
}

/// Unpack FAT time and date words. All-zero words (common on vintage
/// images) yield the 1980-01-01 00:00:00 sentinel.
pub fn unpack_datetime(time: u16, date: u16) -> NaiveDateTime {
    let sentinel = NaiveDate::from_ymd_opt(1980, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    if date == 0 {
        return sentinel;
    }
    let year = 1980 + (date >> 9) as i32;
    let month = ((date >> 5) & 0x0F) as u32;
    let day = (date & 0x1F) as u32;
    let hour = (time >> 11) as u32;
    let minute = ((time >> 5) & 0x3F) as u32;
    let second = ((time & 0x1F) * 2) as u32;

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .unwrap_or(sentinel)
}
