//! Volume integrity checking.
//!
//! `verify_volume` walks the directory tree building a cluster ownership
//! map, then cross-checks it against the FAT. It enumerates problems
//! without aborting and never repairs anything in place.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::DiskResult;
use crate::fat::{FAT_BAD, FAT_FREE};
use crate::volume::{DirHandle, Volume};

/// A cluster referenced by more than one chain.
#[derive(Debug, Clone, Serialize)]
pub struct CrossLink {
    pub cluster: u16,
    pub paths: Vec<String>,
}

/// Findings from a verification pass.
#[derive(Debug, Default, Serialize)]
pub struct VerifyReport {
    pub files_checked: u32,
    pub directories_checked: u32,
    pub used_clusters: u32,
    /// Clusters marked in use in the FAT but reachable from no entry.
    pub orphan_clusters: u32,
    /// Clusters shared between chains, sorted by cluster index.
    pub cross_links: Vec<CrossLink>,
    /// Chains that do not end on an end-of-chain marker.
    pub unterminated_chains: u32,
    /// Directory entries whose first cluster lies outside the data area.
    pub invalid_entries: u32,
    /// FAT copy 1 vs copy 2 disagreements, counted per entry.
    pub fat_mismatches: u32,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl VerifyReport {
    /// No corruption found. Warnings alone do not make a volume dirty.
    pub fn is_clean(&self) -> bool {
        self.orphan_clusters == 0
            && self.cross_links.is_empty()
            && self.unterminated_chains == 0
            && self.invalid_entries == 0
            && self.fat_mismatches == 0
            && self.errors.is_empty()
    }
}

/// Verify one volume.
pub fn verify_volume(vol: &mut Volume) -> DiskResult<VerifyReport> {
    let mut report = VerifyReport::default();
    let mut usage: BTreeMap<u16, Vec<String>> = BTreeMap::new();

    check_reserved_entries(vol, &mut report);
    walk_directory(vol, DirHandle::Root, "", &mut usage, &mut report)?;

    for (&cluster, paths) in &usage {
        if paths.len() > 1 {
            report.cross_links.push(CrossLink {
                cluster,
                paths: paths.clone(),
            });
        }
    }

    // Orphans: allocated in the FAT, owned by nobody.
    let max = vol.fat().max_cluster();
    for cluster in 2..=max {
        let value = vol.fat().get(cluster);
        if value != FAT_FREE && value != FAT_BAD && !usage.contains_key(&cluster) {
            report.orphan_clusters += 1;
        }
    }
    report.used_clusters = usage.len() as u32;

    // FAT copies must agree entry by entry; the slack nibble of the final
    // shared byte is not compared.
    let second = vol.read_fat_copy(1)?;
    for cluster in 0..=max {
        if vol.fat().get(cluster) != second.get(cluster) {
            report.fat_mismatches += 1;
        }
    }

    Ok(report)
}

fn check_reserved_entries(vol: &mut Volume, report: &mut VerifyReport) {
    let entry0 = vol.fat().get(0);
    let entry1 = vol.fat().get(1);
    if entry0 < 0xF00 {
        report
            .warnings
            .push(format!("FAT entry 0 has unusual value {:#05x}", entry0));
    }
    if entry1 < 0xFF8 {
        report
            .warnings
            .push(format!("FAT entry 1 has unusual value {:#05x}", entry1));
    }
}

fn walk_directory(
    vol: &mut Volume,
    dir: DirHandle,
    path: &str,
    usage: &mut BTreeMap<u16, Vec<String>>,
    report: &mut VerifyReport,
) -> DiskResult<()> {
    report.directories_checked += 1;
    let entries = match vol.scan_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            report
                .errors
                .push(format!("cannot read directory {}: {}", display(path), e));
            return Ok(());
        }
    };

    let max = vol.fat().max_cluster();
    for (_, entry) in entries {
        if entry.is_volume_label() || entry.is_dot() {
            continue;
        }
        let entry_path = if path.is_empty() {
            entry.file_name()
        } else {
            format!("{}\\{}", path, entry.file_name())
        };

        if entry.is_directory() {
            if entry.first_cluster < 2 || entry.first_cluster > max {
                report.invalid_entries += 1;
                report.errors.push(format!(
                    "directory {} points outside the data area (cluster {})",
                    entry_path, entry.first_cluster
                ));
                continue;
            }
            let already_seen = usage.contains_key(&entry.first_cluster);
            record_chain(vol, entry.first_cluster, &entry_path, usage, report);
            if !already_seen {
                walk_directory(
                    vol,
                    DirHandle::Chain(entry.first_cluster),
                    &entry_path,
                    usage,
                    report,
                )?;
            }
            continue;
        }

        report.files_checked += 1;
        if entry.file_size == 0 {
            if entry.first_cluster != 0 {
                report.warnings.push(format!(
                    "empty file {} has first cluster {}",
                    entry_path, entry.first_cluster
                ));
            }
            continue;
        }
        if entry.first_cluster < 2 || entry.first_cluster > max {
            report.invalid_entries += 1;
            report.errors.push(format!(
                "file {} points outside the data area (cluster {})",
                entry_path, entry.first_cluster
            ));
            continue;
        }

        let chain_len = record_chain(vol, entry.first_cluster, &entry_path, usage, report);
        let cluster_bytes = vol.geometry().cluster_bytes();
        let expected = (entry.file_size as usize + cluster_bytes - 1) / cluster_bytes;
        if chain_len != 0 && chain_len != expected {
            report.warnings.push(format!(
                "file {}: size {} implies {} cluster(s), chain has {}",
                entry_path, entry.file_size, expected, chain_len
            ));
        }
    }
    Ok(())
}

/// Claim a chain's clusters for `path`, reporting termination problems.
/// Returns the number of clusters actually walked.
fn record_chain(
    vol: &Volume,
    first_cluster: u16,
    path: &str,
    usage: &mut BTreeMap<u16, Vec<String>>,
    report: &mut VerifyReport,
) -> usize {
    match vol.fat().chain_lossy(first_cluster) {
        Ok((clusters, terminated)) => {
            if !terminated {
                report.unterminated_chains += 1;
                report
                    .errors
                    .push(format!("chain of {} does not end on EOC", path));
            }
            for &c in &clusters {
                usage.entry(c).or_default().push(path.to_string());
            }
            clusters.len()
        }
        Err(e) => {
            report.unterminated_chains += 1;
            report.errors.push(format!("chain of {}: {}", path, e));
            0
        }
    }
}

fn display(path: &str) -> &str {
    if path.is_empty() {
        "\\"
    } else {
        path
    }
}
