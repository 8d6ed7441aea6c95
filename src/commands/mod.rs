pub mod analyze;
pub mod check;
pub mod config;
pub mod extract;
pub mod list;
pub mod pack;
pub mod weapon;

use crate::{SourceArgs, UnitArgs};
use anyhow::{Context, Result};
use modbridge::archive::find_containers;
use modbridge::audit::TracingAuditSink;
use modbridge::probe::ProbeChain;
use modbridge::{ArchiveIndex, AssetProbe, Config, DefinitionTable, FieldMap, FieldSource, FsProbe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;

/// Exit status of `check` and `weapon` when the policy rejects the input
pub const EXIT_REJECTED: i32 = 2;

/// A policy decision against the input, as opposed to a failure to run
#[derive(Debug, thiserror::Error)]
#[error("{kind} '{name}' rejected")]
pub struct Rejected {
    pub kind: &'static str,
    pub name: String,
}

/// Install the stderr subscriber; `-v` flags win over the configured level
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Config::load()
            .ok()
            .and_then(|c| c.logging.level.parse::<Level>().ok())
            .unwrap_or(Level::WARN),
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Mount the archives named on the command line, or the configured search paths
pub fn mount_sources(config: &Config, sources: &SourceArgs) -> Result<ArchiveIndex> {
    let requested: Vec<PathBuf> = if sources.archives.is_empty() {
        config.archives.expanded_search_paths()
    } else {
        sources.archives.clone()
    };

    let mut paths = Vec::new();
    for path in &requested {
        if path.is_dir() {
            paths.extend(find_containers(path, &config.archives.extension)?);
        } else {
            paths.push(path.clone());
        }
    }

    let mut index = ArchiveIndex::new(Arc::new(TracingAuditSink))
        .with_priority_marker(config.archives.priority_marker.clone());
    let report = index.mount(&paths);

    for failure in &report.failed {
        eprintln!("⚠ Skipped {}: {}", failure.path.display(), failure.error);
    }
    if report.skipped_entries > 0 {
        eprintln!("⚠ Skipped {} corrupt entries", report.skipped_entries);
    }
    Ok(index)
}

/// Definitions from a file on disk, or from an archive entry of that name
pub fn load_definitions(index: &ArchiveIndex, definitions: &str) -> Result<DefinitionTable> {
    let path = Path::new(definitions);
    if path.is_file() {
        return DefinitionTable::parse_file(path)
            .with_context(|| format!("Failed to parse {}", path.display()));
    }

    let bytes = index
        .extract(definitions)
        .with_context(|| format!("Definitions not found on disk or in archives: {}", definitions))?;
    DefinitionTable::parse_bytes(&bytes).with_context(|| format!("Failed to parse {}", definitions))
}

/// Everything `analyze` and `check` need about one unit
pub struct LoadedUnit {
    pub config: Config,
    pub index: ArchiveIndex,
    pub table: DefinitionTable,
    pub fields: FieldMap,
}

pub fn load_unit(unit: &UnitArgs) -> Result<LoadedUnit> {
    let config = Config::load()?;
    let index = mount_sources(&config, &unit.sources)?;
    let table = load_definitions(&index, &unit.definitions)?;
    let Some(fields) = table.fields_for(&unit.object) else {
        let known: Vec<&str> = table.object_names().take(5).collect();
        if known.is_empty() {
            anyhow::bail!("Object '{}' not found in {}", unit.object, unit.definitions);
        }
        anyhow::bail!(
            "Object '{}' not found in {} (defined objects include: {})",
            unit.object,
            unit.definitions,
            known.join(", ")
        );
    };

    Ok(LoadedUnit {
        config,
        index,
        table,
        fields,
    })
}

/// Archive first, then the loose asset directory
pub fn probe_chain<'a>(index: &'a ArchiveIndex, fs_probe: Option<&'a FsProbe>) -> ProbeChain<'a> {
    let mut chain = ProbeChain::new().with(index as &dyn AssetProbe);
    if let Some(fs_probe) = fs_probe {
        chain.push(fs_probe);
    }
    chain
}
