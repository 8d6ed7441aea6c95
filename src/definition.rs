//! Definition text parsing
//!
//! Unit, weapon and effect data is authored in a line-oriented text format:
//!
//! ```text
//! ; comment
//! [GameData]
//! MaxCameraHeight = 300
//!
//! Object AmericaInfantryRanger
//!   KindOf = INFANTRY SELECTABLE
//!   ArmorSet = HumanArmor
//!   WeaponSet = RangerRifle
//! End
//! ```
//!
//! [`DefinitionTable::parse`] keeps two views of the same input: a
//! case-insensitive section/key/value table, and the untouched source text of
//! every `Object ... End` block so it can be re-emitted byte for byte.
//!
//! # Examples
//!
//! ```
//! use modbridge::definition::DefinitionTable;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let text = "[Audio]\nVolume = 80\nObject Ranger\n  KindOf = INFANTRY\nEnd\n";
//! let table = DefinitionTable::parse(text)?;
//!
//! assert_eq!(table.get_value("audio", "VOLUME"), Some("80"));
//! assert_eq!(table.extract_object("ranger"), Some("Object Ranger\n  KindOf = INFANTRY\nEnd"));
//! # Ok(())
//! # }
//! ```

use crate::resolver::{FieldMap, FieldSource};
use crate::{Error, Result};
use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

/// Section that receives key/value lines outside any `[Section]`
pub const GLOBAL_SECTION: &str = "";

const BYTE_ORDER_MARK: char = '\u{FEFF}';

static OBJECT_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i:object)\s+([^\s=;]+)").expect("object header pattern is valid")
});

static SECTION_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[([^\[\]]+)\]$").expect("section header pattern is valid"));

/// Ordered key/value pairs of one section
#[derive(Debug, Clone, Default, Serialize)]
pub struct Section {
    name: String,
    /// lowercase key -> (key as written, value)
    values: IndexMap<String, (String, String)>,
}

impl Section {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            values: IndexMap::new(),
        }
    }

    /// Section name as first written
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(&key.to_lowercase())
            .map(|(_, value)| value.as_str())
    }

    /// Pairs in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .values()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_fields(&self) -> FieldMap {
        self.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn insert(&mut self, key: &str, value: &str) {
        self.values
            .insert(key.to_lowercase(), (key.to_string(), value.to_string()));
    }
}

/// Verbatim source of one `Object ... End` block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectBlock {
    pub name: String,
    /// From the first byte of the `Object` line to the last byte of `End`
    pub text: String,
    /// 1-based line of the `Object` keyword
    pub line: usize,
    /// False when input ended before the closing `End`
    pub terminated: bool,
}

/// Parsed definition text
#[derive(Debug, Clone, Default, Serialize)]
pub struct DefinitionTable {
    sections: IndexMap<String, Section>,
    objects: IndexMap<String, ObjectBlock>,
}

struct Capture {
    name: String,
    line: usize,
    text: String,
}

impl DefinitionTable {
    /// Parse definition text
    ///
    /// Malformed lines and `Object` lines without an identifier are skipped.
    /// Only input that is not text at all (contains NUL bytes) is an error.
    /// A leading byte-order mark is ignored.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(text);
        if let Some(pos) = text.find('\0') {
            return Err(Error::MalformedInput(format!(
                "input contains a NUL byte at offset {}; this looks like binary data",
                pos
            )));
        }

        let mut table = Self::default();
        let mut current = GLOBAL_SECTION.to_string();
        let mut capture: Option<Capture> = None;

        for (idx, raw) in text.split_inclusive('\n').enumerate() {
            let line_no = idx + 1;
            let trimmed = raw.trim();

            if let Some(mut open) = capture.take() {
                if trimmed.eq_ignore_ascii_case("end") {
                    open.text.push_str(strip_line_ending(raw));
                    table.finish_object(open, true);
                    current = GLOBAL_SECTION.to_string();
                } else {
                    open.text.push_str(raw);
                    capture = Some(open);
                }
                continue;
            }

            if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with("//") {
                continue;
            }

            if let Some(caps) = SECTION_HEADER.captures(trimmed) {
                let name = caps[1].trim();
                if name.is_empty() {
                    tracing::debug!(line = line_no, "skipping empty section header");
                    continue;
                }
                table
                    .sections
                    .entry(name.to_lowercase())
                    .or_insert_with(|| Section::new(name));
                current = name.to_lowercase();
                continue;
            }

            if let Some(caps) = OBJECT_HEADER.captures(trimmed) {
                capture = Some(Capture {
                    name: caps[1].to_string(),
                    line: line_no,
                    text: raw.to_string(),
                });
                continue;
            }

            if is_bare_object_keyword(trimmed) {
                tracing::debug!(line = line_no, "skipping object block without identifier");
                continue;
            }

            match trimmed.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    // named sections exist from their header line on
                    table
                        .sections
                        .entry(current.clone())
                        .or_insert_with(|| Section::new(GLOBAL_SECTION))
                        .insert(key.trim(), value.trim());
                }
                _ => {
                    tracing::debug!(line = line_no, "skipping unrecognized line");
                }
            }
        }

        if let Some(open) = capture {
            tracing::warn!(
                object = %open.name,
                line = open.line,
                "object block not closed before end of input"
            );
            table.finish_object(open, false);
        }

        Ok(table)
    }

    /// Parse raw bytes, decoding invalid UTF-8 lossily
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.contains(&0) {
            return Err(Error::MalformedInput(
                "input contains NUL bytes; this looks like binary data".to_string(),
            ));
        }
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        Self::parse(&String::from_utf8_lossy(bytes))
    }

    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        Self::parse_bytes(&bytes)
    }

    pub fn get_value(&self, section: &str, key: &str) -> Option<&str> {
        self.sections.get(&section.to_lowercase())?.get(key)
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(&name.to_lowercase())
    }

    /// Verbatim text of the named object block
    pub fn extract_object(&self, name: &str) -> Option<&str> {
        self.object(name).map(|block| block.text.as_str())
    }

    pub fn object(&self, name: &str) -> Option<&ObjectBlock> {
        self.objects.get(&name.to_lowercase())
    }

    /// Object names in first-seen order
    pub fn object_names(&self) -> impl Iterator<Item = &str> {
        self.objects.values().map(|block| block.name.as_str())
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// `key = value` assignments inside an object block
    ///
    /// Derived from the verbatim text on request; the `Object` and `End` lines
    /// and comments are ignored, later assignments replace earlier ones.
    pub fn object_fields(&self, name: &str) -> Option<FieldMap> {
        let block = self.object(name)?;
        let mut fields = FieldMap::new();
        for line in block.text.lines().skip(1) {
            let trimmed = line.trim();
            if trimmed.is_empty()
                || trimmed.starts_with(';')
                || trimmed.starts_with("//")
                || trimmed.eq_ignore_ascii_case("end")
            {
                continue;
            }
            if let Some((key, value)) = trimmed.split_once('=') {
                let key = key.trim();
                if key.is_empty() {
                    continue;
                }
                // keep a single entry per key regardless of case
                fields.retain(|existing, _| !existing.eq_ignore_ascii_case(key));
                fields.insert(key.to_string(), value.trim().to_string());
            }
        }
        Some(fields)
    }

    fn finish_object(&mut self, capture: Capture, terminated: bool) {
        let key = capture.name.to_lowercase();
        self.sections
            .entry(key.clone())
            .or_insert_with(|| Section::new(&capture.name));
        self.objects.insert(
            key,
            ObjectBlock {
                name: capture.name,
                text: capture.text,
                line: capture.line,
                terminated,
            },
        );
    }
}

/// Section values first, falling back to the object block's own assignments
impl FieldSource for DefinitionTable {
    fn fields_for(&self, name: &str) -> Option<FieldMap> {
        match self.section(name) {
            Some(section) if !section.is_empty() => Some(section.to_fields()),
            _ => self.object_fields(name),
        }
    }
}

fn is_bare_object_keyword(trimmed: &str) -> bool {
    let mut words = trimmed.split_whitespace();
    match words.next() {
        Some(first) if first.eq_ignore_ascii_case("object") => !trimmed.contains('='),
        _ => false,
    }
}

fn strip_line_ending(raw: &str) -> &str {
    let line = raw.strip_suffix('\n').unwrap_or(raw);
    line.strip_suffix('\r').unwrap_or(line)
}
