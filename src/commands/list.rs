use super::mount_sources;
use crate::SourceArgs;
use anyhow::Result;
use modbridge::graph::format_size;
use modbridge::Config;
use serde::Serialize;

#[derive(Serialize)]
struct ListedEntry {
    name: String,
    container: String,
    size: u32,
    high_priority: bool,
}

pub fn run(sources: &SourceArgs, filter: Option<&str>, json: bool) -> Result<()> {
    let config = Config::load()?;
    let index = mount_sources(&config, sources)?;

    let filter = filter.map(str::to_lowercase);
    let entries: Vec<ListedEntry> = index
        .list_names()
        .into_iter()
        .filter(|name| {
            filter
                .as_deref()
                .map(|f| name.to_lowercase().contains(f))
                .unwrap_or(true)
        })
        .filter_map(|name| {
            let location = index.lookup(&name)?;
            let container = location
                .container
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Some(ListedEntry {
                name,
                container,
                size: location.size,
                high_priority: location.high_priority,
            })
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if index.containers().is_empty() {
        println!("No archives mounted.");
        println!();
        println!("Pass archives with --archive <PATH> or add archives.search_paths to the config.");
        return Ok(());
    }

    println!("Mounted archives:");
    for container in index.containers() {
        println!("  {} ({} entries)", container.path().display(), container.entries().len());
    }
    println!();

    for entry in &entries {
        println!(
            "  {:<60} {:>10}  {}{}",
            entry.name,
            format_size(entry.size as u64),
            entry.container,
            if entry.high_priority { "  [priority]" } else { "" }
        );
    }
    println!();
    println!(
        "Total: {} entr{}",
        entries.len(),
        if entries.len() == 1 { "y" } else { "ies" }
    );

    Ok(())
}
