//! v9kdisk - Victor 9000 / IBM PC disk image utility.
//!
//! Usage:
//!   v9kdisk list disk.img
//!   v9kdisk list hd.img:1:\SUBDIR -r
//!   v9kdisk copy disk.img:\*.COM extracted/
//!   v9kdisk copy notes.txt disk.img:\NOTES.TXT
//!   v9kdisk create blank.img -t victor-ds -l SAMPLES
//!   v9kdisk verify hd.img
//!
//! Paths inside an image use `image.img:\COMPONENTS`; hard disks take a
//! zero-based partition selector, `image.img:N:\COMPONENTS`.
//!
//! Exit codes: 0 success, 1 user error, 2 I/O error, 3 corruption.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{DateTime, Local, NaiveDateTime};
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use serde_json::json;

use v9kdisk_core::dir::{ATTR_ARCHIVE, ATTR_HIDDEN, ATTR_READ_ONLY, ATTR_SYSTEM};
use v9kdisk_core::{
    create_image_file, parse_path_spec, verify_volume, volume_stats, CpmImage, DiskError,
    DiskImage, DiskResult, FormatVariant, ListedEntry, PathSpec, VerifyReport, Volume,
};

/// Victor 9000 and IBM PC disk image utility
#[derive(Parser)]
#[command(name = "v9kdisk", version)]
#[command(about = "Read, write, and create Victor 9000 and IBM PC disk images")]
struct Args {
    /// Show detailed output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Machine-readable JSON output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List files, or the partition table of a hard disk
    List {
        /// Image path (image.img, image.img:\DIR, image.img:N:\DIR)
        path: String,
        /// Recurse into subdirectories
        #[arg(short, long)]
        recursive: bool,
    },
    /// Copy files to or from a disk image (wildcards allowed on the image side)
    Copy {
        source: String,
        dest: String,
        /// Copy directory trees
        #[arg(short, long)]
        recursive: bool,
        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,
    },
    /// Delete a file from a disk image
    Delete { path: String },
    /// Show or change file attributes (+R -H +S -A)
    Attr {
        path: String,
        /// Attribute changes: +R +H +S +A set, -R -H -S -A clear
        #[arg(value_name = "MOD", allow_hyphen_values = true)]
        mods: Vec<String>,
    },
    /// Create a blank formatted disk image
    Create {
        output: PathBuf,
        /// Disk type
        #[arg(short = 't', long = "type", value_enum)]
        kind: CreateType,
        /// Volume label
        #[arg(short, long)]
        label: Option<String>,
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Show disk image information
    Info { path: String },
    /// Verify disk image integrity
    Verify { path: String },
    /// Create a directory on a disk image
    Mkdir { path: String },
    /// Remove a directory from a disk image
    Rmdir {
        path: String,
        /// Remove contents recursively
        #[arg(short, long)]
        recursive: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CreateType {
    /// Victor 9000 single-sided (~600 KB)
    VictorSs,
    /// Victor 9000 double-sided (~1.2 MB)
    VictorDs,
    #[value(name = "360k")]
    Ibm360,
    #[value(name = "720k")]
    Ibm720,
    #[value(name = "1.2m")]
    Ibm12M,
    #[value(name = "1.44m")]
    Ibm144M,
}

impl From<CreateType> for FormatVariant {
    fn from(kind: CreateType) -> Self {
        match kind {
            CreateType::VictorSs => FormatVariant::VictorSs,
            CreateType::VictorDs => FormatVariant::VictorDs,
            CreateType::Ibm360 => FormatVariant::IbmPc360,
            CreateType::Ibm720 => FormatVariant::IbmPc720,
            CreateType::Ibm12M => FormatVariant::IbmPc12M,
            CreateType::Ibm144M => FormatVariant::IbmPc144M,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.quiet {
        LevelFilter::Error
    } else if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();

    let out = Output { json: args.json };
    match run(&args.command, &out) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            out.error(&e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}

fn run(command: &Command, out: &Output) -> DiskResult<u8> {
    match command {
        Command::List { path, recursive } => cmd_list(out, path, *recursive),
        Command::Copy {
            source,
            dest,
            recursive,
            force,
        } => cmd_copy(out, source, dest, *recursive, *force),
        Command::Delete { path } => cmd_delete(out, path),
        Command::Attr { path, mods } => cmd_attr(out, path, mods),
        Command::Create {
            output,
            kind,
            label,
            force,
        } => cmd_create(out, output, *kind, label.as_deref(), *force),
        Command::Info { path } => cmd_info(out, path),
        Command::Verify { path } => cmd_verify(out, path),
        Command::Mkdir { path } => cmd_mkdir(out, path),
        Command::Rmdir { path, recursive } => cmd_rmdir(out, path, *recursive),
    }
}

/// Map an error to the documented exit codes.
fn exit_code_for(err: &DiskError) -> u8 {
    match err {
        DiskError::Io(_) => 2,
        DiskError::CorruptLabel(_)
        | DiskError::CorruptBootSector(_)
        | DiskError::CorruptChain(_)
        | DiskError::CrossLink(_)
        | DiskError::Ambiguous(_) => 3,
        _ => 1,
    }
}

// =============================================================================
// Output formatting
// =============================================================================

struct Output {
    json: bool,
}

impl Output {
    fn success(&self, message: &str, data: serde_json::Value) {
        if self.json {
            let mut obj = json!({ "status": "success", "message": message });
            if let (Some(obj), Some(extra)) = (obj.as_object_mut(), data.as_object()) {
                for (k, v) in extra {
                    obj.insert(k.clone(), v.clone());
                }
            }
            println!("{}", obj);
        } else {
            println!("{}", message);
        }
    }

    fn error(&self, err: &DiskError) {
        if self.json {
            println!("{}", json!({ "status": "error", "message": err.to_string() }));
        } else {
            eprintln!("Error: {}", err);
        }
    }

    fn listing(&self, path: &str, entries: &[ListedEntry]) {
        if self.json {
            let files: Vec<serde_json::Value> = entries.iter().map(entry_json).collect();
            println!(
                "{}",
                json!({ "status": "success", "path": path, "files": files })
            );
            return;
        }

        println!("Directory of {}", if path.is_empty() { "\\" } else { path });
        println!();
        let mut total_files = 0u32;
        let mut total_bytes = 0u64;
        for listed in entries {
            let entry = &listed.entry;
            let size = if entry.is_directory() {
                "<DIR>".to_string()
            } else {
                total_bytes += entry.file_size as u64;
                entry.file_size.to_string()
            };
            total_files += 1;
            println!(
                "  {:<24}  {:>10}  {}  {}",
                listed.path,
                size,
                entry.attr_string(),
                entry.modified().format("%Y-%m-%d %H:%M")
            );
        }
        println!();
        println!("  {} file(s)  {} bytes", total_files, total_bytes);
    }
}

fn entry_json(listed: &ListedEntry) -> serde_json::Value {
    let entry = &listed.entry;
    json!({
        "name": entry.file_name(),
        "path": listed.path,
        "size": entry.file_size,
        "attr": entry.attr_string(),
        "cluster": entry.first_cluster,
        "is_directory": entry.is_directory(),
        "modified": entry.modified().format("%Y-%m-%dT%H:%M:%S").to_string(),
    })
}

// =============================================================================
// Commands
// =============================================================================

fn cmd_list(out: &Output, path: &str, recursive: bool) -> DiskResult<u8> {
    let spec = parse_path_spec(path)?;
    let mut image = DiskImage::open(&spec.image, false)?;

    if let DiskImage::Cpm(cpm) = &mut image {
        list_cpm(out, cpm, &spec)?;
        return Ok(0);
    }

    if let DiskImage::HardDisk(hd) = &mut image {
        if spec.partition.is_none() {
            // Addressing a hard disk without a selector lists the
            // partition table; anything deeper needs a partition.
            if !spec.is_image_only() {
                return Err(DiskError::PartitionRequired);
            }
            let partitions = hd.partitions();
            if out.json {
                println!(
                    "{}",
                    json!({ "status": "success", "partitions": partitions })
                );
            } else {
                println!("Partitions in {}:", spec.image.display());
                println!();
                for p in &partitions {
                    let mb = p.capacity_bytes as f64 / (1024.0 * 1024.0);
                    println!("  {}: {:<16} {:>8.1} MB", p.index, p.name, mb);
                }
                println!();
                println!("  {} partition(s)", partitions.len());
            }
            return Ok(0);
        }
    }

    let mut vol = image.volume(spec.partition)?;
    let entries = vol.list(&spec.components, recursive)?;
    out.listing(&spec.components.join("\\"), &entries);
    Ok(0)
}

fn list_cpm(out: &Output, cpm: &mut CpmImage, spec: &PathSpec) -> DiskResult<()> {
    let files = match spec.components.last() {
        Some(pattern) => cpm.find_matching(pattern)?,
        None => cpm.list_files()?,
    };
    if out.json {
        println!("{}", json!({ "status": "success", "files": files }));
        return Ok(());
    }
    println!("Directory of \\ (CP/M)");
    println!();
    println!("  {:>4}  {:<12}  {:>10}  Attr", "User", "Name", "Size");
    let mut total_bytes = 0u64;
    for f in &files {
        let mut attrs = String::new();
        if f.read_only {
            attrs.push('R');
        }
        if f.system {
            attrs.push('S');
        }
        if attrs.is_empty() {
            attrs.push('-');
        }
        println!("  {:>4}  {:<12}  {:>10}  {}", f.user, f.name, f.file_size, attrs);
        total_bytes += f.file_size;
    }
    println!();
    println!("  {} file(s)  {} bytes", files.len(), total_bytes);
    Ok(())
}

fn cmd_copy(
    out: &Output,
    source: &str,
    dest: &str,
    recursive: bool,
    force: bool,
) -> DiskResult<u8> {
    match (is_image_spec(source), is_image_spec(dest)) {
        (true, false) => copy_out(out, source, Path::new(dest), recursive, force),
        (false, true) => copy_in(out, Path::new(source), dest, force),
        (true, true) => copy_between(out, source, dest, force),
        (false, false) => Err(DiskError::InvalidName(
            "neither side names a disk image".to_string(),
        )),
    }
}

/// Extract files from an image to the host filesystem.
fn copy_out(
    out: &Output,
    source: &str,
    dest: &Path,
    recursive: bool,
    force: bool,
) -> DiskResult<u8> {
    let spec = parse_path_spec(source)?;
    let mut image = DiskImage::open(&spec.image, false)?;

    if let DiskImage::Cpm(cpm) = &mut image {
        let pattern = spec
            .components
            .last()
            .cloned()
            .unwrap_or_else(|| "*".to_string());
        let files = cpm.find_matching(&pattern)?;
        if files.is_empty() {
            return Err(DiskError::NotFound(pattern));
        }
        let to_dir = files.len() > 1 || dest.is_dir();
        let mut copied = 0u32;
        for f in &files {
            let data = cpm.read_file(&f.name)?;
            let target = host_target(dest, &f.name, to_dir);
            write_host_file(&target, &data, force)?;
            copied += 1;
        }
        out.success(
            &format!("Copied {} file(s)", copied),
            json!({ "copied": copied }),
        );
        return Ok(0);
    }

    let mut vol = image.volume(spec.partition)?;
    let entries = vol.list(&spec.components, recursive)?;
    let files: Vec<&ListedEntry> = entries.iter().filter(|l| !l.entry.is_directory()).collect();
    if files.is_empty() {
        return Err(DiskError::NotFound(spec.components.join("\\")));
    }

    let to_dir = files.len() > 1 || recursive || dest.is_dir();
    let mut copied = 0u32;
    for listed in files {
        let data = vol.read_entry_data(&listed.entry)?;
        let target = if to_dir {
            let mut t = dest.to_path_buf();
            for part in listed.path.split('\\') {
                t.push(part);
            }
            t
        } else {
            dest.to_path_buf()
        };
        write_host_file(&target, &data, force)?;
        copied += 1;
    }
    out.success(
        &format!("Copied {} file(s)", copied),
        json!({ "copied": copied }),
    );
    Ok(0)
}

/// Insert a host file into an image.
fn copy_in(out: &Output, source: &Path, dest: &str, force: bool) -> DiskResult<u8> {
    let data = std::fs::read(source)?;
    let mtime = host_mtime(source);
    let spec = parse_path_spec(dest)?;
    let mut image = DiskImage::open(&spec.image, true)?;
    if let DiskImage::Cpm(_) = image {
        return Err(DiskError::ReadOnlyVolume);
    }
    let mut vol = image.volume(spec.partition)?;

    let components = resolve_dest_components(&mut vol, &spec, source)?;
    vol.write_file(&components, &data, force, ATTR_ARCHIVE, mtime)?;
    out.success(
        &format!("Copied {} ({} bytes)", components.join("\\"), data.len()),
        json!({ "dest": components.join("\\"), "size": data.len() }),
    );
    Ok(0)
}

/// Copy between two images (flat, wildcard-aware on the source).
fn copy_between(out: &Output, source: &str, dest: &str, force: bool) -> DiskResult<u8> {
    let src_spec = parse_path_spec(source)?;
    let mut src_image = DiskImage::open(&src_spec.image, false)?;

    let mut files: Vec<(String, Vec<u8>, NaiveDateTime)> = Vec::new();
    if let DiskImage::Cpm(cpm) = &mut src_image {
        let pattern = src_spec
            .components
            .last()
            .cloned()
            .unwrap_or_else(|| "*".to_string());
        let sentinel = chrono::NaiveDate::from_ymd_opt(1980, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        for f in cpm.find_matching(&pattern)? {
            let data = cpm.read_file(&f.name)?;
            files.push((f.name, data, sentinel));
        }
    } else {
        let mut src_vol = src_image.volume(src_spec.partition)?;
        for listed in src_vol.list(&src_spec.components, false)? {
            if listed.entry.is_directory() {
                continue;
            }
            let data = src_vol.read_entry_data(&listed.entry)?;
            files.push((listed.entry.file_name(), data, listed.entry.modified()));
        }
    }
    if files.is_empty() {
        return Err(DiskError::NotFound(src_spec.components.join("\\")));
    }

    let dst_spec = parse_path_spec(dest)?;
    let mut dst_image = DiskImage::open(&dst_spec.image, true)?;
    let mut dst_vol = dst_image.volume(dst_spec.partition)?;

    let single_rename = files.len() == 1
        && !dst_spec.components.is_empty()
        && dst_vol.resolve_dir(&dst_spec.components).is_err();
    let mut copied = 0u32;
    for (name, data, mtime) in files {
        let components = if single_rename {
            dst_spec.components.clone()
        } else {
            let mut c = dst_spec.components.clone();
            c.push(name);
            c
        };
        dst_vol.write_file(&components, &data, force, ATTR_ARCHIVE, mtime)?;
        copied += 1;
    }
    out.success(
        &format!("Copied {} file(s)", copied),
        json!({ "copied": copied }),
    );
    Ok(0)
}

fn cmd_delete(out: &Output, path: &str) -> DiskResult<u8> {
    let spec = parse_path_spec(path)?;
    if spec.components.is_empty() {
        return Err(DiskError::NotFound("no file named".to_string()));
    }
    let mut image = DiskImage::open(&spec.image, true)?;
    let mut vol = image.volume(spec.partition)?;
    vol.delete_file(&spec.components)?;
    out.success(
        &format!("Deleted {}", spec.components.join("\\")),
        json!({}),
    );
    Ok(0)
}

fn cmd_attr(out: &Output, path: &str, mods: &[String]) -> DiskResult<u8> {
    let spec = parse_path_spec(path)?;
    if spec.components.is_empty() {
        return Err(DiskError::NotFound("no file named".to_string()));
    }

    if mods.is_empty() {
        // Show current attributes.
        let mut image = DiskImage::open(&spec.image, false)?;
        let mut vol = image.volume(spec.partition)?;
        let entries = vol.list(&spec.components, false)?;
        let entry = entries
            .first()
            .ok_or_else(|| DiskError::NotFound(spec.components.join("\\")))?;
        out.success(
            &format!("{}  {}", entry.entry.file_name(), entry.entry.attr_string()),
            json!({ "attr": entry.entry.attr_string() }),
        );
        return Ok(0);
    }

    let (set_mask, clear_mask) = parse_attr_mods(mods)?;
    let mut image = DiskImage::open(&spec.image, true)?;
    let mut vol = image.volume(spec.partition)?;
    let attrs = vol.set_attrs(&spec.components, set_mask, clear_mask)?;
    out.success(
        &format!("Attributes now {}", attr_display(attrs)),
        json!({ "attr": attr_display(attrs) }),
    );
    Ok(0)
}

fn cmd_create(
    out: &Output,
    output: &Path,
    kind: CreateType,
    label: Option<&str>,
    force: bool,
) -> DiskResult<u8> {
    if output.exists() && !force {
        return Err(DiskError::ExistsAndNoOverwrite(
            output.display().to_string(),
        ));
    }
    let variant: FormatVariant = kind.into();
    let geometry = create_image_file(output, variant, label)?;
    out.success(
        &format!(
            "Created {} ({}, {} clusters)",
            output.display(),
            variant.describe(),
            geometry.total_clusters
        ),
        json!({
            "path": output.display().to_string(),
            "variant": variant,
            "total_clusters": geometry.total_clusters,
        }),
    );
    Ok(0)
}

fn cmd_info(out: &Output, path: &str) -> DiskResult<u8> {
    let spec = parse_path_spec(path)?;
    let mut image = DiskImage::open(&spec.image, false)?;

    if let DiskImage::Cpm(cpm) = &mut image {
        let files = cpm.list_files()?;
        let total: u64 = files.iter().map(|f| f.file_size).sum();
        if out.json {
            println!(
                "{}",
                json!({
                    "status": "success",
                    "type": "cpm",
                    "file_count": files.len(),
                    "total_file_bytes": total,
                })
            );
        } else {
            println!("Disk Type: Victor 9000 CP/M-86");
            println!("Files: {}", files.len());
            println!("Total file bytes: {}", total);
        }
        return Ok(0);
    }

    if let DiskImage::HardDisk(hd) = &mut image {
        if spec.partition.is_none() {
            let partitions = hd.partitions();
            let mut stats = Vec::new();
            for p in &partitions {
                let mut vol = hd.partition(p.index)?;
                stats.push((p.clone(), volume_stats(&mut vol)?));
            }
            if out.json {
                let rows: Vec<serde_json::Value> = stats
                    .iter()
                    .map(|(p, s)| json!({ "partition": p, "stats": s }))
                    .collect();
                println!(
                    "{}",
                    json!({ "status": "success", "type": "harddisk", "partitions": rows })
                );
            } else {
                println!("Disk Type: Victor 9000 Hard Disk");
                println!("Partitions: {}", partitions.len());
                println!();
                for (p, s) in &stats {
                    println!("  Partition {}: {}", p.index, p.name);
                    println!(
                        "    {} files, {} dirs, {} of {} bytes free",
                        s.file_count, s.directory_count, s.free_bytes, s.total_bytes
                    );
                }
            }
            return Ok(0);
        }
    }

    let mut vol = image.volume(spec.partition)?;
    let stats = volume_stats(&mut vol)?;
    if out.json {
        println!("{}", json!({ "status": "success", "stats": stats }));
    } else {
        print_stats(&stats);
    }
    Ok(0)
}

fn print_stats(stats: &v9kdisk_core::VolumeStats) {
    println!("Disk Type: {}", stats.description);
    println!("Filesystem: FAT12");
    if let Some(label) = &stats.volume_label {
        println!("Volume Label: {}", label);
    }
    println!(
        "Capacity: {} bytes ({} clusters of {} bytes)",
        stats.total_bytes, stats.total_clusters, stats.cluster_bytes
    );
    println!(
        "Used: {} bytes ({} clusters)",
        stats.used_bytes, stats.used_clusters
    );
    println!(
        "Free: {} bytes ({} clusters)",
        stats.free_bytes, stats.free_clusters
    );
    if stats.bad_clusters > 0 {
        println!("Bad clusters: {}", stats.bad_clusters);
    }
    println!("Files: {}", stats.file_count);
    println!("Directories: {}", stats.directory_count);
    println!(
        "Layout: {} FAT sector(s) x {}, {} root entries, data at sector {}",
        stats.fat_sectors, stats.fat_copies, stats.root_dir_entries, stats.data_start_sector
    );
}

fn cmd_verify(out: &Output, path: &str) -> DiskResult<u8> {
    let spec = parse_path_spec(path)?;
    let mut image = DiskImage::open(&spec.image, false)?;

    if let DiskImage::Cpm(cpm) = &mut image {
        // The only structural check CP/M offers is directory sanity.
        let files = cpm.list_files()?;
        let mut seen = std::collections::HashSet::new();
        let mut duplicates = 0u32;
        for f in &files {
            if !seen.insert((f.user, f.name.clone())) {
                duplicates += 1;
            }
        }
        let clean = duplicates == 0;
        out.success(
            &format!(
                "CP/M verification: {} ({} files, {} duplicate entries)",
                if clean { "PASSED" } else { "FAILED" },
                files.len(),
                duplicates
            ),
            json!({ "files": files.len(), "duplicates": duplicates }),
        );
        return Ok(if clean { 0 } else { 3 });
    }

    let mut reports: Vec<(Option<usize>, VerifyReport)> = Vec::new();
    if let DiskImage::HardDisk(hd) = &mut image {
        if spec.partition.is_none() {
            for index in 0..hd.partition_count() {
                let mut vol = hd.partition(index)?;
                reports.push((Some(index), verify_volume(&mut vol)?));
            }
        }
    }
    if reports.is_empty() {
        let mut vol = image.volume(spec.partition)?;
        reports.push((spec.partition, verify_volume(&mut vol)?));
    }

    let clean = reports.iter().all(|(_, r)| r.is_clean());
    if out.json {
        let rows: Vec<serde_json::Value> = reports
            .iter()
            .map(|(p, r)| json!({ "partition": p, "report": r }))
            .collect();
        println!(
            "{}",
            json!({ "status": "success", "clean": clean, "reports": rows })
        );
    } else {
        for (partition, report) in &reports {
            if let Some(p) = partition {
                println!("Partition {}:", p);
            }
            print_report(report);
        }
        println!();
        println!(
            "Verification: {}",
            if clean { "PASSED" } else { "FAILED" }
        );
    }
    Ok(if clean { 0 } else { 3 })
}

fn print_report(report: &VerifyReport) {
    println!(
        "  {} file(s), {} directorie(s), {} cluster(s) in use",
        report.files_checked, report.directories_checked, report.used_clusters
    );
    if report.orphan_clusters > 0 {
        println!("  Orphan clusters: {}", report.orphan_clusters);
    }
    if !report.cross_links.is_empty() {
        for link in &report.cross_links {
            println!(
                "  Cross-linked cluster {}: {}",
                link.cluster,
                link.paths.join(", ")
            );
        }
    }
    if report.unterminated_chains > 0 {
        println!("  Unterminated chains: {}", report.unterminated_chains);
    }
    if report.invalid_entries > 0 {
        println!("  Invalid directory entries: {}", report.invalid_entries);
    }
    if report.fat_mismatches > 0 {
        println!("  FAT copy disagreements: {}", report.fat_mismatches);
    }
    for e in &report.errors {
        println!("  ERROR: {}", e);
    }
    for w in &report.warnings {
        println!("  WARNING: {}", w);
    }
}

fn cmd_mkdir(out: &Output, path: &str) -> DiskResult<u8> {
    let spec = parse_path_spec(path)?;
    if spec.components.is_empty() {
        return Err(DiskError::InvalidName("no directory named".to_string()));
    }
    let mut image = DiskImage::open(&spec.image, true)?;
    let mut vol = image.volume(spec.partition)?;
    vol.make_dir(&spec.components, Local::now().naive_local())?;
    out.success(
        &format!("Created {}", spec.components.join("\\")),
        json!({}),
    );
    Ok(0)
}

fn cmd_rmdir(out: &Output, path: &str, recursive: bool) -> DiskResult<u8> {
    let spec = parse_path_spec(path)?;
    let mut image = DiskImage::open(&spec.image, true)?;
    let mut vol = image.volume(spec.partition)?;
    vol.remove_dir(&spec.components, recursive)?;
    out.success(
        &format!("Removed {}", spec.components.join("\\")),
        json!({}),
    );
    Ok(0)
}

// =============================================================================
// Helpers
// =============================================================================

const IMAGE_EXTENSIONS: [&str; 3] = [".img", ".ima", ".dsk"];

/// Whether a copy operand refers to the inside of a disk image.
fn is_image_spec(spec: &str) -> bool {
    let lower = spec.to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.contains(ext))
}

fn parse_attr_mods(mods: &[String]) -> DiskResult<(u8, u8)> {
    let mut set_mask = 0u8;
    let mut clear_mask = 0u8;
    for m in mods {
        let bad = || DiskError::InvalidName(format!("attribute modifier '{}'", m));
        let mut chars = m.chars();
        let (Some(op), Some(attr), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(bad());
        };
        let bit = match attr.to_ascii_uppercase() {
            'R' => ATTR_READ_ONLY,
            'H' => ATTR_HIDDEN,
            'S' => ATTR_SYSTEM,
            'A' => ATTR_ARCHIVE,
            _ => return Err(bad()),
        };
        match op {
            '+' => set_mask |= bit,
            '-' => clear_mask |= bit,
            _ => return Err(bad()),
        }
    }
    Ok((set_mask, clear_mask))
}

fn attr_display(attrs: u8) -> String {
    let mut s = String::new();
    for (bit, ch) in [
        (ATTR_READ_ONLY, 'R'),
        (ATTR_HIDDEN, 'H'),
        (ATTR_SYSTEM, 'S'),
        (ATTR_ARCHIVE, 'A'),
    ] {
        if attrs & bit != 0 {
            s.push(ch);
        }
    }
    if s.is_empty() {
        s.push('-');
    }
    s
}

/// Destination components for a copy-in: an empty or directory destination
/// takes the source's filename.
fn resolve_dest_components(
    vol: &mut Volume,
    spec: &PathSpec,
    source: &Path,
) -> DiskResult<Vec<String>> {
    let filename = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| DiskError::InvalidName(source.display().to_string()))?
        .to_ascii_uppercase();

    if spec.components.is_empty() {
        return Ok(vec![filename]);
    }
    // If the destination resolves to an existing directory, drop the file
    // inside it; otherwise treat it as the target filename.
    if vol.resolve_dir(&spec.components).is_ok() {
        let mut c = spec.components.clone();
        c.push(filename);
        return Ok(c);
    }
    Ok(spec.components.clone())
}

fn host_target(dest: &Path, name: &str, to_dir: bool) -> PathBuf {
    if to_dir {
        dest.join(name)
    } else {
        dest.to_path_buf()
    }
}

fn write_host_file(target: &Path, data: &[u8], force: bool) -> DiskResult<()> {
    if target.exists() && !force {
        return Err(DiskError::ExistsAndNoOverwrite(
            target.display().to_string(),
        ));
    }
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(target, data)?;
    Ok(())
}

fn host_mtime(path: &Path) -> NaiveDateTime {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(|t| DateTime::<Local>::from(t).naive_local())
        .unwrap_or_else(|_| Local::now().naive_local())
}
