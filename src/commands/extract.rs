use super::mount_sources;
use crate::SourceArgs;
use anyhow::{Context, Result};
use modbridge::graph::format_size;
use modbridge::Config;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;

pub fn run(name: &str, output: Option<PathBuf>, sources: &SourceArgs) -> Result<()> {
    let config = Config::load()?;
    let index = mount_sources(&config, sources)?;

    let location = index
        .lookup(name)
        .ok_or_else(|| anyhow::anyhow!("Entry not found in mounted archives: {}", name))?;

    let output_path = match output {
        Some(path) => path,
        None => {
            let file_name = name
                .rsplit(['/', '\\'])
                .find(|part| !part.is_empty())
                .unwrap_or(name);
            std::env::current_dir()?.join(file_name)
        }
    };

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(&output_path)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);
    let written = index.extract_to(name, &mut writer)?;

    println!("Extracted {}", location.entry_name);
    println!("  From:   {}", location.container.display());
    println!("  To:     {}", output_path.display());
    println!("  Size:   {}", format_size(written));
    println!("  Digest: {}", index.digest(name)?);

    Ok(())
}
