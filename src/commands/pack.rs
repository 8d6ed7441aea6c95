//! Pack command - build an archive from a loose directory
//!
//! Useful for:
//! - Shipping a transferred unit's assets as a single override archive
//! - Building fixture archives for testing

use anyhow::Result;
use modbridge::graph::format_size;
use modbridge::{ArchiveBuilder, Config};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::path::Path;

pub fn run(dir: &Path, output: &Path, priority: bool) -> Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("Source directory does not exist: {}", dir.display());
    }

    let marker = if priority {
        let config = Config::load()?;
        if config.archives.priority_marker.is_empty() {
            anyhow::bail!("--priority needs a non-empty archives.priority_marker");
        }
        Some(config.archives.priority_marker)
    } else {
        None
    };

    println!("Packing {}...", dir.display());
    println!();

    let mut builder = ArchiveBuilder::new();
    for entry in walkdir::WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(should_include_entry)
    {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let relative = path.strip_prefix(dir)?;
        let mut name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("\\");
        if let Some(marker) = &marker {
            name = format!("{}{}", marker, name);
        }
        builder.add_file(name, path)?;
    }

    if builder.is_empty() {
        anyhow::bail!("No files to pack in {}", dir.display());
    }

    let written = builder.write(output)?;
    let checksum = calculate_checksum(output)?;

    println!("Archive created successfully!");
    println!();
    println!("  Output:   {}", output.display());
    println!("  Entries:  {}", builder.len());
    println!("  Size:     {}", format_size(written));
    println!("  Checksum: {}", checksum);

    Ok(())
}

fn should_include_entry(entry: &walkdir::DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();

    let exclude_patterns = [".git", ".svn", ".DS_Store", "Thumbs.db", "desktop.ini"];
    if exclude_patterns.iter().any(|p| name == *p) {
        return false;
    }

    // editor backups
    !(name.ends_with(".bak") || name.ends_with(".tmp") || name.ends_with('~'))
}

fn calculate_checksum(file_path: &Path) -> Result<String> {
    let mut file = File::open(file_path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("sha256:{:x}", hasher.finalize()))
}

