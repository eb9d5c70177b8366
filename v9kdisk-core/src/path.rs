//! Path expression parsing.
//!
//! Grammar: `image[:N][:\COMPONENTS]` where `N` is a zero-based partition
//! index for Victor hard disks. The image part is a host filesystem path,
//! recognized by its extension (`.img`, `.ima`, `.dsk`), so host paths
//! containing colons or directories still parse.

use std::path::PathBuf;

use crate::error::{DiskError, DiskResult};

const IMAGE_EXTENSIONS: [&str; 3] = [".img", ".ima", ".dsk"];

/// A parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSpec {
    /// Host path of the image file.
    pub image: PathBuf,
    /// Zero-based partition index, hard disks only.
    pub partition: Option<usize>,
    /// Path components inside the image, upper-cased.
    pub components: Vec<String>,
}

impl PathSpec {
    /// The expression names the image itself, with no internal path.
    pub fn is_image_only(&self) -> bool {
        self.components.is_empty()
    }
}

/// Split an internal path on `\` (or `/`), dropping empty components and
/// folding to upper case.
pub fn split_components(path: &str) -> Vec<String> {
    path.split(['\\', '/'])
        .filter(|p| !p.is_empty())
        .map(|p| p.to_ascii_uppercase())
        .collect()
}

/// Parse a path expression.
pub fn parse_path_spec(spec: &str) -> DiskResult<PathSpec> {
    let lower = spec.to_ascii_lowercase();

    let split_pos = IMAGE_EXTENSIONS
        .iter()
        .filter_map(|ext| lower.find(ext).map(|i| i + ext.len()))
        .min();

    let Some(split_pos) = split_pos else {
        // No recognized image extension: treat the whole spec as the image.
        return Ok(PathSpec {
            image: PathBuf::from(spec),
            partition: None,
            components: Vec::new(),
        });
    };

    let image = PathBuf::from(&spec[..split_pos]);
    let mut rest = &spec[split_pos..];

    if rest.is_empty() {
        return Ok(PathSpec {
            image,
            partition: None,
            components: Vec::new(),
        });
    }

    let mut partition = None;
    if let Some(after_colon) = rest.strip_prefix(':') {
        rest = after_colon;
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() {
            partition = Some(
                digits
                    .parse::<usize>()
                    .map_err(|_| DiskError::NotFound(spec.to_string()))?,
            );
            rest = &rest[digits.len()..];
            rest = rest.strip_prefix(':').unwrap_or(rest);
        }
    } else {
        return Err(DiskError::NotFound(format!(
            "malformed path expression: {}",
            spec
        )));
    }

    Ok(PathSpec {
        image,
        partition,
        components: split_components(rest),
    })
}
