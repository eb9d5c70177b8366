//! Volume statistics and capacity reporting.

use serde::Serialize;

use crate::error::DiskResult;
use crate::fat::{FAT_BAD, FAT_FREE};
use crate::geometry::FormatVariant;
use crate::volume::Volume;

/// Capacity and usage summary for one volume.
#[derive(Debug, Clone, Serialize)]
pub struct VolumeStats {
    pub variant: FormatVariant,
    pub description: String,
    pub volume_label: Option<String>,
    pub total_clusters: u32,
    pub free_clusters: u32,
    pub used_clusters: u32,
    pub bad_clusters: u32,
    pub cluster_bytes: u32,
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub used_bytes: u64,
    pub file_count: u32,
    pub directory_count: u32,
    pub sectors_per_cluster: u32,
    pub fat_sectors: u32,
    pub fat_copies: u8,
    pub root_dir_entries: u32,
    pub data_start_sector: u32,
}

/// Gather statistics for a volume.
pub fn volume_stats(vol: &mut Volume) -> DiskResult<VolumeStats> {
    let geometry = *vol.geometry();

    let mut free_clusters = 0u32;
    let mut used_clusters = 0u32;
    let mut bad_clusters = 0u32;
    for cluster in 2..=vol.fat().max_cluster() {
        match vol.fat().get(cluster) {
            FAT_FREE => free_clusters += 1,
            FAT_BAD => bad_clusters += 1,
            _ => used_clusters += 1,
        }
    }

    let mut file_count = 0u32;
    let mut directory_count = 0u32;
    for listed in vol.list(&[], true)? {
        if listed.entry.is_directory() {
            directory_count += 1;
        } else {
            file_count += 1;
        }
    }

    let cluster_bytes = geometry.cluster_bytes() as u32;
    Ok(VolumeStats {
        variant: geometry.variant,
        description: geometry.variant.describe().to_string(),
        volume_label: vol.volume_label()?,
        total_clusters: geometry.total_clusters,
        free_clusters,
        used_clusters,
        bad_clusters,
        cluster_bytes,
        total_bytes: geometry.total_clusters as u64 * cluster_bytes as u64,
        free_bytes: free_clusters as u64 * cluster_bytes as u64,
        used_bytes: used_clusters as u64 * cluster_bytes as u64,
        file_count,
        directory_count,
        sectors_per_cluster: geometry.sectors_per_cluster,
        fat_sectors: geometry.fat_sectors,
        fat_copies: geometry.fat_count,
        root_dir_entries: geometry.root_dir_entries,
        data_start_sector: geometry.data_start_sector,
    })
}
