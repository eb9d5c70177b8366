//! 8.3 filename validation and DOS wildcard matching.

use crate::error::{DiskError, DiskResult};

/// Characters allowed in an 8.3 name besides letters and digits.
const SPECIAL_CHARS: &str = "!#$%&'()-@^_`{}~";

fn valid_name_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || SPECIAL_CHARS.contains(c)
}

/// Validate an 8.3 filename, folding lowercase to upper.
///
/// Returns the name and extension as space-padded raw byte fields ready for
/// a directory entry.
pub fn validate_name(input: &str) -> DiskResult<([u8; 8], [u8; 3])> {
    let trimmed = input.trim().to_ascii_uppercase();
    if trimmed.is_empty() {
        return Err(DiskError::InvalidName("empty name".into()));
    }

    let (name, ext) = match trimmed.rfind('.') {
        Some(pos) => (&trimmed[..pos], &trimmed[pos + 1..]),
        None => (trimmed.as_str(), ""),
    };

    if name.is_empty() || name.len() > 8 {
        return Err(DiskError::InvalidName(input.to_string()));
    }
    if ext.len() > 3 {
        return Err(DiskError::InvalidName(input.to_string()));
    }
    for c in name.chars().chain(ext.chars()) {
        if !valid_name_char(c) {
            return Err(DiskError::InvalidName(format!(
                "{} (bad character '{}')",
                input, c
            )));
        }
    }

    let mut name_raw = [0x20u8; 8];
    let mut ext_raw = [0x20u8; 3];
    name_raw[..name.len()].copy_from_slice(name.as_bytes());
    ext_raw[..ext.len()].copy_from_slice(ext.as_bytes());
    Ok((name_raw, ext_raw))
}

/// Whether a path component contains wildcard characters.
pub fn has_wildcards(s: &str) -> bool {
    s.contains('*') || s.contains('?')
}

/// Match one name or extension component. `*` consumes the rest of the
/// component, `?` matches exactly one character.
fn component_matches(pattern: &str, text: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let mut i = 0;
    for p in pattern.chars() {
        match p {
            '*' => return true,
            '?' => {
                if i >= text.len() {
                    return false;
                }
                i += 1;
            }
            _ => {
                if i >= text.len() || !text[i].eq_ignore_ascii_case(&p) {
                    return false;
                }
                i += 1;
            }
        }
    }
    i == text.len()
}

/// Match a DOS wildcard pattern against a reconstructed filename.
///
/// A pattern containing a `.` matches name and extension separately, so
/// `*.*` only matches filenames that themselves contain a dot. A bare `*`
/// matches everything, extensionless names included.
pub fn matches_pattern(pattern: &str, filename: &str) -> bool {
    match pattern.rfind('.') {
        Some(pos) => {
            let (pat_name, pat_ext) = (&pattern[..pos], &pattern[pos + 1..]);
            match filename.rfind('.') {
                Some(fpos) => {
                    component_matches(pat_name, &filename[..fpos])
                        && component_matches(pat_ext, &filename[fpos + 1..])
                }
                None => false,
            }
        }
        None => component_matches(pattern, filename),
    }
}
