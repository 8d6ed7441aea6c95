//! Archive containers and the priority-aware asset index
//!
//! Game assets ship inside `.big` containers: a 12 byte header followed by a
//! packed entry table and the entry payloads. An [`ArchiveIndex`] mounts a set
//! of containers and maps every case-insensitive entry name to exactly one
//! location, applying the same "last mod wins" override rule as the game.
//!
//! Container layout (all integers little-endian):
//!
//! ```text
//! +--------+-------------+---------------+
//! | "BIGF" | entry_count | declared_size |   header, 12 bytes
//! +--------+-------------+---------------+
//! | offset | size | timestamp | name\0   |   entry_count times, no padding
//! +--------------------------------------+
//! | payload bytes ...                    |
//! +--------------------------------------+
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use modbridge::archive::mount_archives;
//! use modbridge::audit::TracingAuditSink;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let index = mount_archives(&["Data/INI.big", "Data/!!MyMod.big"], Arc::new(TracingAuditSink));
//!
//! if let Some(location) = index.lookup("data/ini/weapon.ini") {
//!     println!("{} bytes in {}", location.size, location.container.display());
//! }
//! let bytes = index.extract("data/ini/weapon.ini")?;
//! println!("Read {} bytes", bytes.len());
//! # Ok(())
//! # }
//! ```

use crate::audit::{AuditRecord, SharedAuditSink, Verdict};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Container signature
pub const ARCHIVE_MAGIC: [u8; 4] = *b"BIGF";

/// Size of the fixed container header
pub const HEADER_SIZE: u64 = 12;

/// Name prefix that marks a container or an entry as high-priority
pub const DEFAULT_PRIORITY_MARKER: &str = "!!";

/// Longest entry name accepted before the table is considered corrupt
const MAX_NAME_LEN: u64 = 4096;

/// One entry of a container's table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub offset: u32,
    pub size: u32,
    /// Seconds since the Unix epoch
    pub timestamp: u32,
}

impl ArchiveEntry {
    /// First byte past the end of the entry's payload
    pub fn end(&self) -> u64 {
        self.offset as u64 + self.size as u64
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp as i64, 0)
    }
}

/// Container header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub entry_count: u32,
    pub declared_size: u32,
}

impl ArchiveHeader {
    fn parse(bytes: &[u8; 12], path: &Path) -> Result<Self> {
        if bytes[0..4] != ARCHIVE_MAGIC {
            return Err(Error::InvalidFormat {
                path: path.to_path_buf(),
                reason: format!(
                    "signature mismatch (expected {:?}, found {})",
                    String::from_utf8_lossy(&ARCHIVE_MAGIC),
                    hex::encode(&bytes[0..4])
                ),
            });
        }
        Ok(Self {
            entry_count: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            declared_size: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
        })
    }
}

/// Table entry that could not be indexed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    /// Position in the container's table
    pub position: u32,
    pub name: Option<String>,
    pub reason: String,
}

/// An opened container: its header and entry table
///
/// Only the table is read into memory. The file handle used to read it is
/// closed before [`ArchiveContainer::open`] returns; payload reads open their
/// own handle.
#[derive(Debug, Clone)]
pub struct ArchiveContainer {
    path: PathBuf,
    file_name: String,
    header: ArchiveHeader,
    len: u64,
    entries: Vec<ArchiveEntry>,
    skipped: Vec<SkippedEntry>,
}

impl ArchiveContainer {
    /// Read the header and entry table of a container
    ///
    /// Fails with [`Error::InvalidFormat`] when the signature does not match or
    /// the header itself is truncated. Corrupt entries do not fail the call;
    /// they are listed in [`ArchiveContainer::skipped`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let mut header_bytes = [0u8; 12];
        reader.read_exact(&mut header_bytes).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                Error::InvalidFormat {
                    path: path.to_path_buf(),
                    reason: format!("file is {} bytes, shorter than the header", len),
                }
            } else {
                Error::Io(e)
            }
        })?;
        let header = ArchiveHeader::parse(&header_bytes, path)?;

        let (entries, skipped) = read_table(&mut reader, header.entry_count, len)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        tracing::debug!(
            container = %path.display(),
            entries = entries.len(),
            skipped = skipped.len(),
            "read archive table"
        );

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            header,
            len,
            entries,
            skipped,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name of the container, used for priority ordering
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn header(&self) -> ArchiveHeader {
        self.header
    }

    /// Length of the container file when its table was read
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn skipped(&self) -> &[SkippedEntry] {
        &self.skipped
    }

    pub fn is_priority(&self, marker: &str) -> bool {
        !marker.is_empty() && self.file_name.starts_with(marker)
    }
}

/// Scan `count` table entries; stops at the first entry that cannot be framed
fn read_table<R: BufRead>(
    reader: &mut R,
    count: u32,
    container_len: u64,
) -> Result<(Vec<ArchiveEntry>, Vec<SkippedEntry>)> {
    // The table can never hold more entries than the file has room for
    let capacity = (count as u64).min(container_len / 13) as usize;
    let mut entries = Vec::with_capacity(capacity);
    let mut skipped = Vec::new();

    for position in 0..count {
        let mut fixed = [0u8; 12];
        match reader.read_exact(&mut fixed) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                skipped.push(SkippedEntry {
                    position,
                    name: None,
                    reason: format!(
                        "table truncated after {} of {} entries",
                        position, count
                    ),
                });
                break;
            }
            Err(e) => return Err(e.into()),
        }

        let mut raw_name = Vec::new();
        reader
            .by_ref()
            .take(MAX_NAME_LEN + 1)
            .read_until(0, &mut raw_name)?;
        if raw_name.last() != Some(&0) {
            skipped.push(SkippedEntry {
                position,
                name: None,
                reason: "truncated name (no terminator)".to_string(),
            });
            break;
        }
        raw_name.pop();

        let name = match String::from_utf8(raw_name) {
            Ok(name) => name,
            Err(e) => {
                let name = String::from_utf8_lossy(e.as_bytes()).into_owned();
                // distinct raw names may collapse to the same key once replaced
                tracing::warn!(position, name = %name, "entry name is not valid UTF-8; decoded lossily");
                name
            }
        };

        let entry = ArchiveEntry {
            name,
            offset: u32::from_le_bytes([fixed[0], fixed[1], fixed[2], fixed[3]]),
            size: u32::from_le_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]),
            timestamp: u32::from_le_bytes([fixed[8], fixed[9], fixed[10], fixed[11]]),
        };

        if entry.name.is_empty() {
            skipped.push(SkippedEntry {
                position,
                name: None,
                reason: "empty name".to_string(),
            });
            continue;
        }
        if entry.end() > container_len {
            skipped.push(SkippedEntry {
                position,
                reason: format!(
                    "payload {}..{} lies beyond container length {}",
                    entry.offset,
                    entry.end(),
                    container_len
                ),
                name: Some(entry.name),
            });
            continue;
        }

        entries.push(entry);
    }

    Ok((entries, skipped))
}

fn open_window(container: &Path, entry: &ArchiveEntry) -> Result<io::Take<File>> {
    let mut file = File::open(container)?;
    let len = file.metadata()?.len();
    if entry.end() > len {
        return Err(Error::CorruptEntry {
            path: container.to_path_buf(),
            name: entry.name.clone(),
            reason: format!(
                "payload ends at byte {} but the container is {} bytes",
                entry.end(),
                len
            ),
        });
    }
    file.seek(SeekFrom::Start(entry.offset as u64))?;
    Ok(file.take(entry.size as u64))
}

/// Where an indexed name resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLocation {
    pub container: PathBuf,
    /// Entry name as stored in the container
    pub entry_name: String,
    pub offset: u32,
    pub size: u32,
    pub timestamp: u32,
    pub high_priority: bool,
}

impl AssetLocation {
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp as i64, 0)
    }
}

#[derive(Debug, Clone)]
struct IndexedEntry {
    container: usize,
    /// Name with the priority marker removed, original case
    display_name: String,
    entry: ArchiveEntry,
    high_priority: bool,
}

/// Container that could not be mounted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of a [`ArchiveIndex::mount`] call
#[derive(Debug, Clone, Default)]
pub struct MountReport {
    /// Containers in processing order
    pub mounted: Vec<PathBuf>,
    pub failed: Vec<MountFailure>,
    pub skipped_entries: usize,
    pub indexed: usize,
}

impl MountReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.skipped_entries == 0
    }
}

/// Case-insensitive name -> location index over a set of mounted containers
///
/// Build it with [`ArchiveIndex::mount`], then share it for reads. Mounting
/// again replaces the whole mount set.
pub struct ArchiveIndex {
    containers: Vec<ArchiveContainer>,
    entries: HashMap<String, IndexedEntry>,
    priority_marker: String,
    sink: SharedAuditSink,
}

impl std::fmt::Debug for ArchiveIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveIndex")
            .field("containers", &self.containers.len())
            .field("entries", &self.entries.len())
            .field("priority_marker", &self.priority_marker)
            .finish()
    }
}

impl ArchiveIndex {
    pub fn new(sink: SharedAuditSink) -> Self {
        Self {
            containers: Vec::new(),
            entries: HashMap::new(),
            priority_marker: DEFAULT_PRIORITY_MARKER.to_string(),
            sink,
        }
    }

    pub fn with_priority_marker(mut self, marker: impl Into<String>) -> Self {
        self.priority_marker = marker.into();
        self
    }

    pub fn priority_marker(&self) -> &str {
        &self.priority_marker
    }

    /// Replace the mount set with `paths` and rebuild the index
    ///
    /// A container that cannot be opened or has a bad signature is reported in
    /// [`MountReport::failed`] and left out; the others are still indexed.
    pub fn mount<P: AsRef<Path>>(&mut self, paths: &[P]) -> MountReport {
        let mut report = MountReport::default();
        let mut containers = Vec::with_capacity(paths.len());

        for path in paths {
            let path = path.as_ref();
            match ArchiveContainer::open(path) {
                Ok(container) => containers.push(container),
                Err(e) => {
                    tracing::warn!(container = %path.display(), error = %e, "failed to mount archive");
                    self.sink.record(
                        AuditRecord::new(
                            "mount",
                            path.display().to_string(),
                            Verdict::Skipped,
                            mount_failure_reason(&e),
                        )
                        .with_details(e.to_string()),
                    );
                    report.failed.push(MountFailure {
                        path: path.to_path_buf(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let marker = self.priority_marker.clone();
        containers.sort_by(|a, b| {
            a.is_priority(&marker)
                .cmp(&b.is_priority(&marker))
                .then_with(|| {
                    a.file_name
                        .to_lowercase()
                        .cmp(&b.file_name.to_lowercase())
                })
        });

        self.containers = containers;
        self.entries.clear();

        for (container_idx, container) in self.containers.iter().enumerate() {
            for skipped in &container.skipped {
                tracing::warn!(
                    container = %container.path.display(),
                    position = skipped.position,
                    reason = %skipped.reason,
                    "skipping corrupt archive entry"
                );
                self.sink.record(
                    AuditRecord::new(
                        "index",
                        skipped
                            .name
                            .clone()
                            .unwrap_or_else(|| format!("#{}", skipped.position)),
                        Verdict::Skipped,
                        "Corrupt archive entry",
                    )
                    .with_details(format!(
                        "{}: {}",
                        container.path.display(),
                        skipped.reason
                    )),
                );
            }
            report.skipped_entries += container.skipped.len();
            report.mounted.push(container.path.clone());

            let container_priority = container.is_priority(&marker);
            for entry in &container.entries {
                let entry_priority = !marker.is_empty() && entry.name.starts_with(&marker);
                let display_name = strip_marker(&entry.name, &marker).to_string();
                let candidate = IndexedEntry {
                    container: container_idx,
                    display_name,
                    entry: entry.clone(),
                    high_priority: container_priority || entry_priority,
                };
                insert_with_priority(&mut self.entries, normalize_key(&entry.name, &marker), candidate);
            }
        }

        report.indexed = self.entries.len();
        tracing::debug!(
            containers = report.mounted.len(),
            failed = report.failed.len(),
            indexed = report.indexed,
            "archive index rebuilt"
        );
        report
    }

    /// Mount every container with the given extension found under `dir`
    pub fn mount_dir<P: AsRef<Path>>(&mut self, dir: P, extension: &str) -> Result<MountReport> {
        let paths = find_containers(dir.as_ref(), extension)?;
        Ok(self.mount(&paths))
    }

    pub fn lookup(&self, name: &str) -> Option<AssetLocation> {
        let indexed = self
            .entries
            .get(&normalize_key(name, &self.priority_marker))?;
        let container = &self.containers[indexed.container];
        Some(AssetLocation {
            container: container.path.clone(),
            entry_name: indexed.entry.name.clone(),
            offset: indexed.entry.offset,
            size: indexed.entry.size,
            timestamp: indexed.entry.timestamp,
            high_priority: indexed.high_priority,
        })
    }

    pub fn exists(&self, name: &str) -> bool {
        self.entries
            .contains_key(&normalize_key(name, &self.priority_marker))
    }

    /// Every indexed name, sorted case-insensitively
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<(&String, &String)> = self
            .entries
            .iter()
            .map(|(key, indexed)| (key, &indexed.display_name))
            .collect();
        names.sort_by(|a, b| a.0.cmp(b.0));
        names.into_iter().map(|(_, name)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mounted containers in processing order
    pub fn containers(&self) -> &[ArchiveContainer] {
        &self.containers
    }

    /// Open a bounded read window over the named entry
    ///
    /// Each call opens its own handle, so windows may be read from several
    /// threads at once.
    pub fn open(&self, name: &str) -> Result<io::Take<File>> {
        let indexed = self
            .entries
            .get(&normalize_key(name, &self.priority_marker))
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        open_window(&self.containers[indexed.container].path, &indexed.entry)
    }

    /// Read the named entry's payload
    pub fn extract(&self, name: &str) -> Result<Vec<u8>> {
        let mut window = self.open(name)?;
        let expected = window.limit();
        let mut buf = Vec::with_capacity(expected as usize);
        window.read_to_end(&mut buf)?;
        if (buf.len() as u64) < expected {
            return Err(self.short_read(name, buf.len() as u64, expected));
        }
        Ok(buf)
    }

    /// Stream the named entry into `destination`, returning the bytes written
    pub fn extract_to<W: Write>(&self, name: &str, destination: &mut W) -> Result<u64> {
        let mut window = self.open(name)?;
        let expected = window.limit();
        let written = io::copy(&mut window, destination)?;
        if written < expected {
            return Err(self.short_read(name, written, expected));
        }
        Ok(written)
    }

    /// SHA-256 of the named entry as `sha256:<hex>`
    pub fn digest(&self, name: &str) -> Result<String> {
        let mut window = self.open(name)?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0; 8192];
        loop {
            let bytes_read = window.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }
        Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
    }

    fn short_read(&self, name: &str, got: u64, expected: u64) -> Error {
        let container = self
            .lookup(name)
            .map(|l| l.container)
            .unwrap_or_default();
        Error::CorruptEntry {
            path: container,
            name: name.to_string(),
            reason: format!("read {} of {} bytes", got, expected),
        }
    }
}

/// Mount `paths` into a fresh index
pub fn mount_archives<P: AsRef<Path>>(paths: &[P], sink: SharedAuditSink) -> ArchiveIndex {
    let mut index = ArchiveIndex::new(sink);
    index.mount(paths);
    index
}

/// Resolve `name` against a mounted index
pub fn lookup_asset(index: &ArchiveIndex, name: &str) -> Option<AssetLocation> {
    index.lookup(name)
}

/// Container files with `extension` under `dir`, in directory-walk order
pub fn find_containers(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::Other(format!(
            "Archive directory does not exist: {}",
            dir.display()
        )));
    }

    let extension = extension.trim_start_matches('.');
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| Error::Other(format!("Failed to scan {}: {}", dir.display(), e)))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if matches {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}

/// Apply the override rule: insert when absent, replace only when a
/// high-priority entry meets a normal one, otherwise keep what is there.
fn insert_with_priority(
    entries: &mut HashMap<String, IndexedEntry>,
    key: String,
    candidate: IndexedEntry,
) {
    match entries.get(&key) {
        None => {
            entries.insert(key, candidate);
        }
        Some(existing) if candidate.high_priority && !existing.high_priority => {
            entries.insert(key, candidate);
        }
        Some(_) => {}
    }
}

fn strip_marker<'a>(name: &'a str, marker: &str) -> &'a str {
    if marker.is_empty() {
        name
    } else {
        name.strip_prefix(marker).unwrap_or(name)
    }
}

fn normalize_key(name: &str, marker: &str) -> String {
    strip_marker(name, marker).replace('\\', "/").to_lowercase()
}

fn mount_failure_reason(error: &Error) -> &'static str {
    match error {
        Error::InvalidFormat { .. } => "Invalid archive format",
        Error::Io(_) => "Archive could not be read",
        _ => "Archive could not be mounted",
    }
}

/// Writes containers in the format [`ArchiveContainer`] reads
#[derive(Debug, Default, Clone)]
pub struct ArchiveBuilder {
    entries: Vec<(String, Vec<u8>, u32)>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry stamped with the current time
    pub fn add(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> &mut Self {
        let now = Utc::now().timestamp().clamp(0, u32::MAX as i64) as u32;
        self.add_with_timestamp(name, data, now)
    }

    pub fn add_with_timestamp(
        &mut self,
        name: impl Into<String>,
        data: impl Into<Vec<u8>>,
        timestamp: u32,
    ) -> &mut Self {
        self.entries.push((name.into(), data.into(), timestamp));
        self
    }

    /// Add a file from disk, stamped with its modification time
    pub fn add_file<P: AsRef<Path>>(&mut self, name: impl Into<String>, path: P) -> Result<&mut Self> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let timestamp = fs::metadata(path)?
            .modified()
            .ok()
            .map(DateTime::<Utc>::from)
            .map(|t| t.timestamp().clamp(0, u32::MAX as i64) as u32)
            .unwrap_or(0);
        Ok(self.add_with_timestamp(name, data, timestamp))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize the container, returning the number of bytes written
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<u64> {
        for (name, _, _) in &self.entries {
            if name.is_empty() || name.as_bytes().contains(&0) {
                return Err(Error::Other(format!("Invalid entry name: {:?}", name)));
            }
        }

        let table_len: u64 = self
            .entries
            .iter()
            .map(|(name, _, _)| 12 + name.len() as u64 + 1)
            .sum();
        let payload_len: u64 = self.entries.iter().map(|(_, data, _)| data.len() as u64).sum();
        let total = HEADER_SIZE + table_len + payload_len;
        if total > u32::MAX as u64 {
            return Err(Error::Other(format!(
                "Archive would be {} bytes, above the 4 GiB format limit",
                total
            )));
        }

        out.write_all(&ARCHIVE_MAGIC)?;
        out.write_all(&(self.entries.len() as u32).to_le_bytes())?;
        out.write_all(&(payload_len as u32).to_le_bytes())?;

        let mut offset = HEADER_SIZE + table_len;
        for (name, data, timestamp) in &self.entries {
            out.write_all(&(offset as u32).to_le_bytes())?;
            out.write_all(&(data.len() as u32).to_le_bytes())?;
            out.write_all(&timestamp.to_le_bytes())?;
            out.write_all(name.as_bytes())?;
            out.write_all(&[0])?;
            offset += data.len() as u64;
        }
        for (_, data, _) in &self.entries {
            out.write_all(data)?;
        }
        Ok(total)
    }

    /// Write the container to `path`, creating parent directories
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<u64> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = io::BufWriter::new(File::create(path)?);
        let written = self.write_to(&mut file)?;
        file.flush()?;
        Ok(written)
    }
}
