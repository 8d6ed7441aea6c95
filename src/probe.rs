//! Existence checks for referenced assets
//!
//! The resolver never opens assets itself. It asks an [`AssetProbe`] whether a
//! name exists and, if so, how large it is and when it was last modified. A
//! mounted [`ArchiveIndex`] and a plain directory ([`FsProbe`]) both implement
//! the trait; [`ProbeChain`] tries several in order.

use crate::archive::ArchiveIndex;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// What a probe learned about an existing asset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetMetadata {
    pub size: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
}

pub trait AssetProbe {
    /// `Some` when the asset exists
    fn probe(&self, name: &str) -> Option<AssetMetadata>;

    fn exists(&self, name: &str) -> bool {
        self.probe(name).is_some()
    }
}

impl AssetProbe for ArchiveIndex {
    fn probe(&self, name: &str) -> Option<AssetMetadata> {
        self.lookup(name).map(|location| AssetMetadata {
            size: Some(location.size as u64),
            modified: location.modified(),
        })
    }

    fn exists(&self, name: &str) -> bool {
        ArchiveIndex::exists(self, name)
    }
}

/// Looks assets up as files below a root directory
///
/// Names use either separator and are matched case-insensitively, component by
/// component, the way the game resolves them on Windows.
#[derive(Debug, Clone)]
pub struct FsProbe {
    root: PathBuf,
}

impl FsProbe {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of an existing file for `name`, if any
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        if !is_valid_reference(name) {
            return None;
        }
        let relative = name.replace('\\', "/");
        let exact = self.root.join(&relative);
        if exact.is_file() {
            return Some(exact);
        }
        find_case_insensitive(&self.root, &relative)
    }

    /// Size and modification time of the file for `name`
    pub fn metadata(&self, name: &str) -> Option<(u64, Option<DateTime<Utc>>)> {
        let path = self.locate(name)?;
        let meta = fs::metadata(&path).ok()?;
        let modified = meta.modified().ok().map(DateTime::<Utc>::from);
        Some((meta.len(), modified))
    }
}

impl AssetProbe for FsProbe {
    fn probe(&self, name: &str) -> Option<AssetMetadata> {
        self.metadata(name).map(|(size, modified)| AssetMetadata {
            size: Some(size),
            modified,
        })
    }
}

/// Ordered list of probes; the first one that finds the asset answers
#[derive(Default)]
pub struct ProbeChain<'a> {
    probes: Vec<&'a dyn AssetProbe>,
}

impl<'a> ProbeChain<'a> {
    pub fn new() -> Self {
        Self { probes: Vec::new() }
    }

    pub fn with(mut self, probe: &'a dyn AssetProbe) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn push(&mut self, probe: &'a dyn AssetProbe) {
        self.probes.push(probe);
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

impl AssetProbe for ProbeChain<'_> {
    fn probe(&self, name: &str) -> Option<AssetMetadata> {
        self.probes.iter().find_map(|probe| probe.probe(name))
    }
}

/// Whether a referenced name can be probed at all
///
/// Empty names, NUL bytes, absolute paths and `..` components are rejected.
pub fn is_valid_reference(name: &str) -> bool {
    if name.trim().is_empty() || name.contains('\0') {
        return false;
    }
    let normalized = name.replace('\\', "/");
    let path = Path::new(&normalized);
    path.components().all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

fn find_case_insensitive(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut current = root.to_path_buf();
    for part in relative.split('/').filter(|p| !p.is_empty() && *p != ".") {
        let direct = current.join(part);
        if direct.exists() {
            current = direct;
            continue;
        }
        let matched = fs::read_dir(&current)
            .ok()?
            .flatten()
            .find(|entry| entry.file_name().to_string_lossy().eq_ignore_ascii_case(part))?;
        current = matched.path();
    }
    if current.is_file() {
        Some(current)
    } else {
        None
    }
}
