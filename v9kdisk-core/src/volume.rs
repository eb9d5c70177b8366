//! A mounted FAT12 volume and its operations.
//!
//! A `Volume` borrows the block device, caches one FAT copy in memory, and
//! addresses all sectors relative to its slice base (0 for floppies, the
//! virtual-volume start for hard-disk partitions). Directory sectors are
//! read on demand and never cached across calls.
//!
//! Mutations follow a fixed commit order: data sectors, FAT copy 1, FAT
//! copy 2, then the affected directory sector. Failures detected before the
//! first write leave the image untouched; staged FAT changes are reverted
//! in memory.

use chrono::NaiveDateTime;
use log::debug;

use crate::block::{BlockDevice, SECTOR_SIZE};
use crate::dir::{
    DirEntry, EntryKind, ATTR_ARCHIVE, ATTR_DIRECTORY, ATTR_HIDDEN, ATTR_READ_ONLY, ATTR_SYSTEM,
    ATTR_VOLUME_LABEL, DIR_ENTRY_SIZE, ENTRY_DELETED, ENTRY_END,
};
use crate::error::{DiskError, DiskResult};
use crate::fat::{Fat, FAT_FREE};
use crate::geometry::Geometry;
use crate::name::{has_wildcards, matches_pattern, validate_name};

/// Attribute bits a caller may set on a file.
const FILE_ATTR_MASK: u8 = ATTR_READ_ONLY | ATTR_HIDDEN | ATTR_SYSTEM | ATTR_ARCHIVE;

/// Handle to a directory: the fixed root range or a cluster chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirHandle {
    Root,
    Chain(u16),
}

/// Position of a directory entry on disk (volume-local).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryLocation {
    pub sector: u64,
    pub offset: usize,
}

/// One row of a directory listing.
#[derive(Debug, Clone)]
pub struct ListedEntry {
    /// Path relative to the listed directory, `\`-separated.
    pub path: String,
    pub entry: DirEntry,
}

enum SlotSearch {
    Found(EntryLocation),
    Extend { last_cluster: u16 },
}

/// A single mounted FAT12 volume.
pub struct Volume<'d> {
    dev: &'d mut dyn BlockDevice,
    base_sector: u64,
    geometry: Geometry,
    fat: Fat,
    fat_dirty: bool,
    alloc_cursor: u16,
    writable: bool,
}

impl<'d> Volume<'d> {
    /// Mount a volume: load FAT copy 1 into the cache. `base_sector` is the
    /// absolute sector where this volume's slice begins.
    pub fn open(
        dev: &'d mut dyn BlockDevice,
        base_sector: u64,
        geometry: Geometry,
        writable: bool,
    ) -> DiskResult<Self> {
        let mut fat_bytes = vec![0u8; geometry.fat_bytes()];
        let offset = (base_sector + geometry.fat_start_sector() as u64) * SECTOR_SIZE as u64;
        dev.read_at(offset, &mut fat_bytes)?;
        Ok(Self {
            dev,
            base_sector,
            geometry,
            fat: Fat::new(fat_bytes, geometry.total_clusters),
            fat_dirty: false,
            alloc_cursor: 2,
            writable,
        })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn fat(&self) -> &Fat {
        &self.fat
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Read a volume-local sector.
    pub fn read_sector(&mut self, sector: u64) -> DiskResult<Vec<u8>> {
        self.dev.read_sector(self.base_sector + sector)
    }

    /// Write a volume-local sector.
    pub fn write_sector(&mut self, sector: u64, data: &[u8]) -> DiskResult<()> {
        if !self.writable {
            return Err(DiskError::ReadOnlyVolume);
        }
        self.dev.write_sector(self.base_sector + sector, data)
    }

    /// Re-read one FAT copy from disk (0 or 1), bypassing the cache.
    pub fn read_fat_copy(&mut self, copy: u8) -> DiskResult<Fat> {
        let mut bytes = vec![0u8; self.geometry.fat_bytes()];
        let sector = self.geometry.fat_start_sector() as u64
            + copy as u64 * self.geometry.fat_sectors as u64;
        let offset = (self.base_sector + sector) * SECTOR_SIZE as u64;
        self.dev.read_at(offset, &mut bytes)?;
        Ok(Fat::new(bytes, self.geometry.total_clusters))
    }

    fn ensure_writable(&self) -> DiskResult<()> {
        if self.writable {
            Ok(())
        } else {
            Err(DiskError::ReadOnlyVolume)
        }
    }

    // =========================================================================
    // Directory scanning and path resolution
    // =========================================================================

    fn dir_sector_list(&mut self, dir: DirHandle) -> DiskResult<Vec<u64>> {
        match dir {
            DirHandle::Root => {
                let start = self.geometry.root_dir_start_sector() as u64;
                Ok((start..start + self.geometry.root_dir_sectors as u64).collect())
            }
            DirHandle::Chain(cluster) => {
                let chain = self.fat.chain(cluster)?;
                let mut sectors = Vec::new();
                for c in chain {
                    let first = self.geometry.cluster_to_sector(c) as u64;
                    sectors.extend(first..first + self.geometry.sectors_per_cluster as u64);
                }
                Ok(sectors)
            }
        }
    }

    /// All live entries of a directory, in on-disk order, with their slot
    /// locations. Deleted and long-name slots are skipped; scanning stops
    /// at the end-of-directory marker.
    pub fn scan_dir(&mut self, dir: DirHandle) -> DiskResult<Vec<(EntryLocation, DirEntry)>> {
        let mut out = Vec::new();
        'sectors: for sector in self.dir_sector_list(dir)? {
            let data = self.read_sector(sector)?;
            for slot in 0..SECTOR_SIZE / DIR_ENTRY_SIZE {
                let offset = slot * DIR_ENTRY_SIZE;
                match DirEntry::decode(&data[offset..offset + DIR_ENTRY_SIZE]) {
                    EntryKind::End => break 'sectors,
                    EntryKind::Deleted | EntryKind::LongName => continue,
                    EntryKind::Valid(entry) => {
                        out.push((EntryLocation { sector, offset }, entry))
                    }
                }
            }
        }
        Ok(out)
    }

    /// Find the unique non-deleted entry named `name` (case-insensitive).
    /// More than one match means the directory is corrupt.
    pub fn find_entry(
        &mut self,
        dir: DirHandle,
        name: &str,
    ) -> DiskResult<Option<(EntryLocation, DirEntry)>> {
        let needle = name.to_ascii_uppercase();
        let mut found = None;
        for (loc, entry) in self.scan_dir(dir)? {
            if entry.is_volume_label() {
                continue;
            }
            if entry.file_name().to_ascii_uppercase() == needle {
                if found.is_some() {
                    return Err(DiskError::Ambiguous(name.to_string()));
                }
                found = Some((loc, entry));
            }
        }
        Ok(found)
    }

    fn find_required(
        &mut self,
        dir: DirHandle,
        name: &str,
    ) -> DiskResult<(EntryLocation, DirEntry)> {
        self.find_entry(dir, name)?
            .ok_or_else(|| DiskError::NotFound(name.to_string()))
    }

    /// Walk `components` from the root, requiring every component to be a
    /// subdirectory.
    pub fn resolve_dir(&mut self, components: &[String]) -> DiskResult<DirHandle> {
        let mut dir = DirHandle::Root;
        for comp in components {
            let (_, entry) = self.find_required(dir, comp)?;
            if !entry.is_directory() {
                return Err(DiskError::NotADirectory(comp.clone()));
            }
            dir = DirHandle::Chain(entry.first_cluster);
        }
        Ok(dir)
    }

    // =========================================================================
    // Listing
    // =========================================================================

    /// List a directory. The last path component may be a wildcard pattern,
    /// applied to files. With `recursive`, entries come out in pre-order
    /// (parent before children) with `.` and `..` skipped. Order within a
    /// directory is on-disk order.
    pub fn list(&mut self, components: &[String], recursive: bool) -> DiskResult<Vec<ListedEntry>> {
        let (dir, pattern) = match components.split_last() {
            None => (DirHandle::Root, None),
            Some((last, parent)) => {
                if has_wildcards(last) {
                    (self.resolve_dir(parent)?, Some(last.clone()))
                } else {
                    match self.resolve_dir(components) {
                        Ok(dir) => (dir, None),
                        Err(DiskError::NotADirectory(_)) => {
                            // The leaf is a file: list it alone.
                            let parent_dir = self.resolve_dir(parent)?;
                            let (_, entry) = self.find_required(parent_dir, last)?;
                            return Ok(vec![ListedEntry {
                                path: entry.file_name(),
                                entry,
                            }]);
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        };

        let mut out = Vec::new();
        self.collect_entries(dir, "", recursive, pattern.as_deref(), &mut out)?;
        Ok(out)
    }

    fn collect_entries(
        &mut self,
        dir: DirHandle,
        prefix: &str,
        recursive: bool,
        pattern: Option<&str>,
        out: &mut Vec<ListedEntry>,
    ) -> DiskResult<()> {
        for (_, entry) in self.scan_dir(dir)? {
            if entry.is_volume_label() || entry.is_dot() {
                continue;
            }
            let name = entry.file_name();
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}\\{}", prefix, name)
            };
            if entry.is_directory() {
                if pattern.is_none() || recursive {
                    out.push(ListedEntry {
                        path: path.clone(),
                        entry: entry.clone(),
                    });
                }
                if recursive {
                    self.collect_entries(
                        DirHandle::Chain(entry.first_cluster),
                        &path,
                        true,
                        pattern,
                        out,
                    )?;
                }
            } else if pattern.map_or(true, |p| matches_pattern(p, &name)) {
                out.push(ListedEntry { path, entry });
            }
        }
        Ok(())
    }

    /// The volume-label entry's text, if the root carries one.
    pub fn volume_label(&mut self) -> DiskResult<Option<String>> {
        for (_, entry) in self.scan_dir(DirHandle::Root)? {
            if entry.is_volume_label() && !entry.is_directory() {
                return Ok(Some(entry.volume_label_text()));
            }
        }
        Ok(None)
    }

    // =========================================================================
    // File data
    // =========================================================================

    /// Read a file's contents (copy-out). The final cluster contributes
    /// only the residual `file_size mod cluster_bytes` bytes.
    pub fn read_file(&mut self, components: &[String]) -> DiskResult<Vec<u8>> {
        let (parent, leaf) = split_parent(components)?;
        let dir = self.resolve_dir(parent)?;
        let (_, entry) = self.find_required(dir, leaf)?;
        if entry.is_directory() {
            return Err(DiskError::IsADirectory(leaf.clone()));
        }
        self.read_entry_data(&entry)
    }

    /// Read the data belonging to a directory entry.
    pub fn read_entry_data(&mut self, entry: &DirEntry) -> DiskResult<Vec<u8>> {
        if entry.file_size == 0 || entry.first_cluster == 0 {
            return Ok(Vec::new());
        }
        let chain = self.fat.chain(entry.first_cluster)?;
        let mut data = Vec::with_capacity(chain.len() * self.geometry.cluster_bytes());
        for &cluster in &chain {
            let first = self.geometry.cluster_to_sector(cluster) as u64;
            for s in 0..self.geometry.sectors_per_cluster as u64 {
                data.extend_from_slice(&self.read_sector(first + s)?);
            }
        }
        data.truncate(entry.file_size as usize);
        Ok(data)
    }

    /// Write a file (copy-in). Allocates `ceil(len / cluster_bytes)`
    /// clusters, zero-padding the final one, and creates or replaces the
    /// directory entry. On `OutOfSpace` the staged allocation is discarded
    /// and no directory entry is created.
    pub fn write_file(
        &mut self,
        components: &[String],
        data: &[u8],
        overwrite: bool,
        attributes: u8,
        mtime: NaiveDateTime,
    ) -> DiskResult<()> {
        self.ensure_writable()?;
        let (parent, leaf) = split_parent(components)?;
        if has_wildcards(leaf) {
            return Err(DiskError::InvalidName(leaf.clone()));
        }
        validate_name(leaf)?;
        let dir = self.resolve_dir(parent)?;

        let mut replace = None;
        if let Some((loc, entry)) = self.find_entry(dir, leaf)? {
            if entry.is_directory() {
                return Err(DiskError::IsADirectory(leaf.clone()));
            }
            if !overwrite {
                return Err(DiskError::ExistsAndNoOverwrite(leaf.clone()));
            }
            if entry.is_read_only() {
                return Err(DiskError::AttributeProtected(leaf.clone()));
            }
            replace = Some((loc, entry));
        }

        let cluster_bytes = self.geometry.cluster_bytes();
        let needed = (data.len() + cluster_bytes - 1) / cluster_bytes;

        // Stage the allocation in the cached FAT; nothing reaches the disk
        // until the whole operation is known to fit.
        let saved_cursor = self.alloc_cursor;
        let was_dirty = self.fat_dirty;
        let chain = self.fat.allocate_chain(needed, &mut self.alloc_cursor)?;
        if !chain.is_empty() {
            self.fat_dirty = true;
        }

        // Secure a directory slot before any sector is written, so failures
        // here leave the image bit-identical.
        let slot = match &replace {
            Some((loc, _)) => *loc,
            None => match self.prepare_slot(dir) {
                Ok(loc) => loc,
                Err(e) => {
                    self.revert_allocation(&chain, saved_cursor, was_dirty);
                    return Err(e);
                }
            },
        };

        self.write_chain_data(&chain, data)?;

        if let Some((_, old)) = &replace {
            if old.first_cluster != 0 {
                self.fat.free_chain(old.first_cluster)?;
                self.fat_dirty = true;
            }
        }

        let first_cluster = chain.first().copied().unwrap_or(0);
        let entry = DirEntry::new(
            leaf,
            attributes & FILE_ATTR_MASK,
            first_cluster,
            data.len() as u32,
            mtime,
        )?;

        self.flush_fat()?;
        self.write_entry_at(slot, &entry)?;
        self.dev.flush()?;
        debug!(
            "wrote {} ({} bytes, {} cluster(s))",
            leaf,
            data.len(),
            chain.len()
        );
        Ok(())
    }

    /// Delete a file: mark its entry deleted and free the chain. Data
    /// sectors are not zeroed.
    pub fn delete_file(&mut self, components: &[String]) -> DiskResult<()> {
        self.ensure_writable()?;
        let (parent, leaf) = split_parent(components)?;
        let dir = self.resolve_dir(parent)?;
        let (loc, entry) = self.find_required(dir, leaf)?;
        if entry.is_directory() {
            return Err(DiskError::IsADirectory(leaf.clone()));
        }
        if entry.is_read_only() {
            return Err(DiskError::AttributeProtected(leaf.clone()));
        }
        if entry.first_cluster != 0 {
            self.fat.free_chain(entry.first_cluster)?;
            self.fat_dirty = true;
        }
        self.flush_fat()?;
        self.mark_deleted(loc)?;
        self.dev.flush()
    }

    /// Update attribute bits. Only the read-only, hidden, system, and
    /// archive bits may change; the volume-label bit is protected and the
    /// directory bit is preserved. Returns the resulting attribute byte.
    pub fn set_attrs(
        &mut self,
        components: &[String],
        set_mask: u8,
        clear_mask: u8,
    ) -> DiskResult<u8> {
        self.ensure_writable()?;
        if (set_mask | clear_mask) & ATTR_VOLUME_LABEL != 0 {
            return Err(DiskError::AttributeProtected(
                "volume label attribute".to_string(),
            ));
        }
        let (parent, leaf) = split_parent(components)?;
        let dir = self.resolve_dir(parent)?;
        let (loc, mut entry) = self.find_required(dir, leaf)?;

        entry.attributes |= set_mask & FILE_ATTR_MASK;
        entry.attributes &= !(clear_mask & FILE_ATTR_MASK);
        self.write_entry_at(loc, &entry)?;
        self.dev.flush()?;
        Ok(entry.attributes)
    }

    /// Rename a file or subdirectory in place. Fails if an entry with the
    /// new name already exists in the same directory.
    pub fn rename(&mut self, components: &[String], new_name: &str) -> DiskResult<()> {
        self.ensure_writable()?;
        let (parent, leaf) = split_parent(components)?;
        let (raw_name, raw_ext) = validate_name(new_name)?;
        let dir = self.resolve_dir(parent)?;
        let (loc, mut entry) = self.find_required(dir, leaf)?;

        if !leaf.eq_ignore_ascii_case(new_name.trim()) && self.find_entry(dir, new_name)?.is_some()
        {
            return Err(DiskError::ExistsAndNoOverwrite(new_name.to_string()));
        }

        entry.raw_name = raw_name;
        entry.raw_ext = raw_ext;
        self.write_entry_at(loc, &entry)?;
        self.dev.flush()
    }

    // =========================================================================
    // Directories
    // =========================================================================

    /// Create a subdirectory. The new directory gets one zero-filled
    /// cluster seeded with `.` and `..`. Creating a directory that already
    /// exists is a no-op.
    pub fn make_dir(&mut self, components: &[String], mtime: NaiveDateTime) -> DiskResult<()> {
        self.ensure_writable()?;
        let (parent, leaf) = split_parent(components)?;
        validate_name(leaf)?;
        let dir = self.resolve_dir(parent)?;

        if let Some((_, entry)) = self.find_entry(dir, leaf)? {
            if entry.is_directory() {
                return Ok(());
            }
            return Err(DiskError::ExistsAndNoOverwrite(leaf.clone()));
        }

        let saved_cursor = self.alloc_cursor;
        let was_dirty = self.fat_dirty;
        let chain = self.fat.allocate_chain(1, &mut self.alloc_cursor)?;
        let new_cluster = chain[0];
        self.fat_dirty = true;

        let slot = match self.prepare_slot(dir) {
            Ok(loc) => loc,
            Err(e) => {
                self.revert_allocation(&chain, saved_cursor, was_dirty);
                return Err(e);
            }
        };

        self.zero_cluster(new_cluster)?;

        // First two entries: `.` (self) and `..` (parent; 0 when the parent
        // is the root).
        let parent_cluster = match dir {
            DirHandle::Root => 0,
            DirHandle::Chain(c) => c,
        };
        let mut dot_name = [0x20u8; 8];
        dot_name[0] = b'.';
        let mut dotdot_name = [0x20u8; 8];
        dotdot_name[0] = b'.';
        dotdot_name[1] = b'.';
        let dot = DirEntry::with_raw_name(dot_name, [0x20; 3], ATTR_DIRECTORY, new_cluster, mtime);
        let dotdot =
            DirEntry::with_raw_name(dotdot_name, [0x20; 3], ATTR_DIRECTORY, parent_cluster, mtime);

        let first_sector = self.geometry.cluster_to_sector(new_cluster) as u64;
        let mut sector = vec![0u8; SECTOR_SIZE];
        sector[0..DIR_ENTRY_SIZE].copy_from_slice(&dot.encode());
        sector[DIR_ENTRY_SIZE..2 * DIR_ENTRY_SIZE].copy_from_slice(&dotdot.encode());
        self.write_sector(first_sector, &sector)?;

        let entry = DirEntry::new(leaf, ATTR_DIRECTORY, new_cluster, 0, mtime)?;
        self.flush_fat()?;
        self.write_entry_at(slot, &entry)?;
        self.dev.flush()
    }

    /// Remove a subdirectory. Without `recursive` the directory must be
    /// empty apart from `.` and `..`.
    pub fn remove_dir(&mut self, components: &[String], recursive: bool) -> DiskResult<()> {
        self.ensure_writable()?;
        if components.is_empty() {
            return Err(DiskError::InvalidName(
                "cannot remove the root directory".to_string(),
            ));
        }
        let (parent, leaf) = split_parent(components)?;
        let dir = self.resolve_dir(parent)?;
        let (loc, entry) = self.find_required(dir, leaf)?;
        if !entry.is_directory() {
            return Err(DiskError::NotADirectory(leaf.clone()));
        }

        let contents: Vec<DirEntry> = self
            .scan_dir(DirHandle::Chain(entry.first_cluster))?
            .into_iter()
            .map(|(_, e)| e)
            .filter(|e| !e.is_dot() && !e.is_volume_label())
            .collect();

        if !contents.is_empty() {
            if !recursive {
                return Err(DiskError::DirectoryNotEmpty(leaf.clone()));
            }
            for child in contents {
                let mut child_path = components.to_vec();
                child_path.push(child.file_name());
                if child.is_directory() {
                    self.remove_dir(&child_path, true)?;
                } else {
                    self.delete_file(&child_path)?;
                }
            }
        }

        if entry.first_cluster != 0 {
            self.fat.free_chain(entry.first_cluster)?;
            self.fat_dirty = true;
        }
        self.flush_fat()?;
        self.mark_deleted(loc)?;
        self.dev.flush()
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// Write both FAT copies if the cache is dirty, then flush the device.
    pub fn flush(&mut self) -> DiskResult<()> {
        self.flush_fat()?;
        self.dev.flush()
    }

    fn flush_fat(&mut self) -> DiskResult<()> {
        if !self.fat_dirty {
            return Ok(());
        }
        let start = self.geometry.fat_start_sector() as u64;
        let per_copy = self.geometry.fat_sectors as u64;
        let bytes = self.fat.bytes().to_vec();
        for copy in 0..self.geometry.fat_count as u64 {
            for s in 0..per_copy {
                let off = s as usize * SECTOR_SIZE;
                self.write_sector(start + copy * per_copy + s, &bytes[off..off + SECTOR_SIZE])?;
            }
        }
        self.fat_dirty = false;
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn revert_allocation(&mut self, chain: &[u16], saved_cursor: u16, was_dirty: bool) {
        for &c in chain {
            self.fat.set(c, FAT_FREE);
        }
        self.alloc_cursor = saved_cursor;
        self.fat_dirty = was_dirty;
    }

    /// Find a free directory slot, growing a subdirectory chain by one
    /// zero-filled cluster when necessary. The root directory is fixed-size
    /// and fails with `DirectoryFull` instead.
    fn prepare_slot(&mut self, dir: DirHandle) -> DiskResult<EntryLocation> {
        match self.find_free_slot(dir)? {
            SlotSearch::Found(loc) => Ok(loc),
            SlotSearch::Extend { last_cluster } => {
                let ext = self.fat.allocate_chain(1, &mut self.alloc_cursor)?;
                let new_cluster = ext[0];
                self.fat.set(last_cluster, new_cluster);
                self.fat_dirty = true;
                self.zero_cluster(new_cluster)?;
                Ok(EntryLocation {
                    sector: self.geometry.cluster_to_sector(new_cluster) as u64,
                    offset: 0,
                })
            }
        }
    }

    fn find_free_slot(&mut self, dir: DirHandle) -> DiskResult<SlotSearch> {
        let sectors = self.dir_sector_list(dir)?;
        for &sector in &sectors {
            let data = self.read_sector(sector)?;
            for slot in 0..SECTOR_SIZE / DIR_ENTRY_SIZE {
                let offset = slot * DIR_ENTRY_SIZE;
                if data[offset] == ENTRY_END || data[offset] == ENTRY_DELETED {
                    return Ok(SlotSearch::Found(EntryLocation { sector, offset }));
                }
            }
        }
        match dir {
            DirHandle::Root => Err(DiskError::DirectoryFull),
            DirHandle::Chain(cluster) => {
                let chain = self.fat.chain(cluster)?;
                Ok(SlotSearch::Extend {
                    last_cluster: chain.last().copied().unwrap_or(cluster),
                })
            }
        }
    }

    fn write_chain_data(&mut self, chain: &[u16], data: &[u8]) -> DiskResult<()> {
        let mut offset = 0usize;
        for &cluster in chain {
            let first = self.geometry.cluster_to_sector(cluster) as u64;
            for s in 0..self.geometry.sectors_per_cluster as u64 {
                let mut sector = [0u8; SECTOR_SIZE];
                let n = data.len().saturating_sub(offset).min(SECTOR_SIZE);
                sector[..n].copy_from_slice(&data[offset..offset + n]);
                self.write_sector(first + s, &sector)?;
                offset += n;
            }
        }
        Ok(())
    }

    fn zero_cluster(&mut self, cluster: u16) -> DiskResult<()> {
        let zeros = [0u8; SECTOR_SIZE];
        let first = self.geometry.cluster_to_sector(cluster) as u64;
        for s in 0..self.geometry.sectors_per_cluster as u64 {
            self.write_sector(first + s, &zeros)?;
        }
        Ok(())
    }

    fn write_entry_at(&mut self, loc: EntryLocation, entry: &DirEntry) -> DiskResult<()> {
        let mut data = self.read_sector(loc.sector)?;
        data[loc.offset..loc.offset + DIR_ENTRY_SIZE].copy_from_slice(&entry.encode());
        self.write_sector(loc.sector, &data)
    }

    fn mark_deleted(&mut self, loc: EntryLocation) -> DiskResult<()> {
        let mut data = self.read_sector(loc.sector)?;
        data[loc.offset] = ENTRY_DELETED;
        self.write_sector(loc.sector, &data)
    }
}

fn split_parent(components: &[String]) -> DiskResult<(&[String], &String)> {
    match components.split_last() {
        Some((leaf, parent)) => Ok((parent, leaf)),
        None => Err(DiskError::NotFound("empty path".to_string())),
    }
}
