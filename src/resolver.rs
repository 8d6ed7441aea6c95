//! Dependency graph resolution for units
//!
//! Starting from a unit's field map, the resolver follows a fixed reference
//! chain (armor, weapon, projectile, visual effect, audio) and builds a
//! [`UnitDependencyGraph`]. Every referenced asset becomes a node whose
//! existence is checked against the mounted archives first and an asset
//! directory second.
//!
//! Only the root carries a field map unless a [`FieldSource`] is attached, so
//! by default resolution stops one hop past the root. A field source (such as
//! a parsed [`DefinitionTable`](crate::DefinitionTable)) lets the walk continue
//! into the referenced assets' own definitions, still bounded by the depth
//! ceiling and the per-analysis visited set.
//!
//! # Examples
//!
//! ```
//! use modbridge::resolver::{DependencyGraphResolver, FieldMap};
//!
//! let mut fields = FieldMap::new();
//! fields.insert("Armor".to_string(), "InfArmor".to_string());
//! fields.insert("Weapon".to_string(), "Rifle".to_string());
//!
//! let graph = DependencyGraphResolver::new().analyze("1", "Rifleman", &fields);
//! assert_eq!(graph.node_count(), 3);
//! ```

use crate::archive::ArchiveIndex;
use crate::config::ResolverConfig;
use crate::graph::{DependencyNode, DependencyType, NodeStatus, UnitDependencyGraph};
use crate::policy::MAX_CHAIN_DEPTH;
use crate::probe::{is_valid_reference, AssetMetadata, AssetProbe, FsProbe};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Raw key/value data describing one object
pub type FieldMap = HashMap<String, String>;

/// Supplies field maps for referenced assets
pub trait FieldSource {
    fn fields_for(&self, name: &str) -> Option<FieldMap>;
}

/// Name -> fields, matched case-insensitively
impl FieldSource for HashMap<String, FieldMap> {
    fn fields_for(&self, name: &str) -> Option<FieldMap> {
        self.get(name)
            .or_else(|| {
                self.iter()
                    .filter(|(key, _)| key.eq_ignore_ascii_case(name))
                    .min_by(|a, b| a.0.cmp(b.0))
                    .map(|(_, fields)| fields)
            })
            .cloned()
    }
}

/// One step of the reference chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainStep {
    pub kind: DependencyType,
    /// Key as usually written in definition text
    pub key: &'static str,
    /// Conventional suffix dropped by the short form of the key
    pub suffix: &'static str,
}

/// armor -> weapon -> projectile -> visual effect -> audio
pub const DEPENDENCY_CHAIN: [ChainStep; 5] = [
    ChainStep {
        kind: DependencyType::Armor,
        key: "ArmorSet",
        suffix: "Set",
    },
    ChainStep {
        kind: DependencyType::Weapon,
        key: "WeaponSet",
        suffix: "Set",
    },
    ChainStep {
        kind: DependencyType::Projectile,
        key: "ProjectileObject",
        suffix: "Object",
    },
    ChainStep {
        kind: DependencyType::VisualEffect,
        key: "FXList",
        suffix: "List",
    },
    ChainStep {
        kind: DependencyType::Audio,
        key: "AudioEvent",
        suffix: "Event",
    },
];

/// Key spellings tried for each chain step, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyVariant {
    /// `WeaponSet`
    Literal,
    /// `Weapon`
    SuffixStripped,
    /// `WeaponName`
    NameSuffixed,
    /// `InheritsWeapon`
    Inherits,
}

pub const KEY_VARIANTS: [KeyVariant; 4] = [
    KeyVariant::Literal,
    KeyVariant::SuffixStripped,
    KeyVariant::NameSuffixed,
    KeyVariant::Inherits,
];

impl KeyVariant {
    pub fn apply(self, step: &ChainStep) -> String {
        match self {
            KeyVariant::Literal => step.key.to_string(),
            KeyVariant::SuffixStripped => step.base().to_string(),
            KeyVariant::NameSuffixed => format!("{}Name", step.base()),
            KeyVariant::Inherits => format!("Inherits{}", step.base()),
        }
    }
}

impl ChainStep {
    /// Key with the conventional suffix removed
    pub fn base(&self) -> &'static str {
        match self.key.strip_suffix(self.suffix) {
            Some(base) if !base.is_empty() => base,
            _ => self.key,
        }
    }

    pub fn key_variants(&self) -> Vec<String> {
        KEY_VARIANTS.iter().map(|variant| variant.apply(self)).collect()
    }

    /// First non-empty value under any key variant
    pub fn find_reference<'f>(&self, fields: &'f FieldMap) -> Option<&'f str> {
        KEY_VARIANTS
            .iter()
            .find_map(|variant| field_value(fields, &variant.apply(self)))
    }
}

/// Case-insensitive lookup that treats blank and `None` values as absent
///
/// The exact key is tried first. Keys that differ only by case are then
/// tried in sorted order, so the answer does not depend on map iteration.
pub fn field_value<'f>(fields: &'f FieldMap, key: &str) -> Option<&'f str> {
    if let Some(value) = fields.get(key).and_then(|raw| usable(raw)) {
        return Some(value);
    }

    let mut matches: Vec<(&String, &String)> = fields
        .iter()
        .filter(|(k, _)| k.as_str() != key && k.eq_ignore_ascii_case(key))
        .collect();
    matches.sort_by(|a, b| a.0.cmp(b.0));
    matches.into_iter().find_map(|(_, raw)| usable(raw))
}

fn usable(raw: &str) -> Option<&str> {
    let value = raw.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(value)
    }
}

/// Builds dependency graphs; cheap to construct, reusable across units
pub struct DependencyGraphResolver<'a> {
    archive: Option<&'a ArchiveIndex>,
    filesystem: Option<FsProbe>,
    field_source: Option<&'a dyn FieldSource>,
    max_depth: usize,
}

impl Default for DependencyGraphResolver<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> DependencyGraphResolver<'a> {
    pub fn new() -> Self {
        Self {
            archive: None,
            filesystem: None,
            field_source: None,
            max_depth: MAX_CHAIN_DEPTH,
        }
    }

    pub fn from_config(config: &ResolverConfig) -> Self {
        Self::new().with_max_depth(config.max_depth)
    }

    /// Probe mounted archives first
    pub fn with_archive(mut self, index: &'a ArchiveIndex) -> Self {
        self.archive = Some(index);
        self
    }

    /// Probe files below `dir` when the archives do not have the asset
    pub fn with_asset_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.filesystem = Some(FsProbe::new(dir));
        self
    }

    /// Expand referenced assets using their own field maps
    pub fn with_field_source(mut self, source: &'a dyn FieldSource) -> Self {
        self.field_source = Some(source);
        self
    }

    /// Deepest level a node may sit at; the root is level 0
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Resolve the dependency tree of one unit
    pub fn analyze(&self, unit_id: &str, unit_name: &str, fields: &FieldMap) -> UnitDependencyGraph {
        let mut visited = HashSet::new();
        visited.insert(unit_name.to_lowercase());

        let mut root = DependencyNode::new(unit_name, DependencyType::ObjectDefinition, 0);
        self.expand(&mut root, fields, &mut visited);

        let graph = UnitDependencyGraph::from_root(unit_id, unit_name, root);
        tracing::debug!(
            unit = unit_name,
            nodes = graph.node_count(),
            found = graph.found_count(),
            missing = graph.missing_count(),
            status = %graph.status(),
            "resolved unit dependencies"
        );
        graph
    }

    fn expand(&self, node: &mut DependencyNode, fields: &FieldMap, visited: &mut HashSet<String>) {
        if node.depth >= self.max_depth {
            return;
        }

        for step in DEPENDENCY_CHAIN.iter() {
            let Some(reference) = step.find_reference(fields) else {
                continue;
            };
            if !visited.insert(reference.to_lowercase()) {
                tracing::debug!(
                    parent = %node.name,
                    reference,
                    "skipping already visited asset"
                );
                continue;
            }

            let mut child = DependencyNode::new(reference, step.kind, node.depth + 1);
            self.verify(&mut child);

            if child.status != NodeStatus::Invalid {
                let child_fields = self
                    .field_source
                    .and_then(|source| source.fields_for(reference));
                if let Some(child_fields) = child_fields {
                    self.expand(&mut child, &child_fields, visited);
                }
            }

            node.push_child(child);
        }
    }

    fn verify(&self, node: &mut DependencyNode) {
        if !is_valid_reference(&node.name) {
            node.status = NodeStatus::Invalid;
            return;
        }
        if self.archive.is_none() && self.filesystem.is_none() {
            return;
        }

        let found = self
            .archive
            .and_then(|index| index.probe(&node.name))
            .or_else(|| {
                self.filesystem
                    .as_ref()
                    .and_then(|fs| fs.probe(&node.name))
            });

        match found {
            Some(AssetMetadata { size, modified }) => {
                node.status = NodeStatus::Found;
                node.size = size;
                node.modified = modified;
            }
            None => node.status = NodeStatus::Missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::CompletionStatus;
    use std::fs;
    use tempfile::TempDir;

    fn fields(pairs: &[(&str, &str)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_key_variants_order() {
        assert_eq!(
            DEPENDENCY_CHAIN[0].key_variants(),
            vec!["ArmorSet", "Armor", "ArmorName", "InheritsArmor"]
        );
        assert_eq!(
            DEPENDENCY_CHAIN[3].key_variants(),
            vec!["FXList", "FX", "FXName", "InheritsFX"]
        );
    }

    #[test]
    fn test_first_non_empty_variant_wins() {
        let map = fields(&[("WeaponSet", "  "), ("weapon", "None"), ("WeaponName", "Rifle"), ("InheritsWeapon", "Base")]);
        assert_eq!(DEPENDENCY_CHAIN[1].find_reference(&map), Some("Rifle"));
    }

    #[test]
    fn test_case_variant_keys_resolve_deterministically() {
        for _ in 0..50 {
            let map = fields(&[("weapon", "None"), ("WEAPON", "Rifle")]);
            assert_eq!(DEPENDENCY_CHAIN[1].find_reference(&map), Some("Rifle"));
            let graph = DependencyGraphResolver::new().analyze("1", "Ranger", &map);
            assert_eq!(graph.node_count(), 2);
        }

        let map = fields(&[("Weapon", "Exact"), ("WEAPON", "Upper"), ("weapon", "Lower")]);
        assert_eq!(field_value(&map, "Weapon"), Some("Exact"));
        assert_eq!(field_value(&map, "wEaPoN"), Some("Upper"));
    }

    #[test]
    fn test_field_source_picks_lowest_case_variant() {
        let mut defs: HashMap<String, FieldMap> = HashMap::new();
        defs.insert("RIFLE".to_string(), fields(&[("FXList", "FX_A")]));
        defs.insert("rifle".to_string(), fields(&[("FXList", "FX_B")]));
        for _ in 0..20 {
            let found = defs.fields_for("Rifle").unwrap();
            assert_eq!(found.get("FXList").map(String::as_str), Some("FX_A"));
        }
    }

    #[test]
    fn test_no_chain_keys_gives_root_only() {
        let graph = DependencyGraphResolver::new().analyze("7", "Civilian", &fields(&[("KindOf", "INFANTRY")]));
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.status(), CompletionStatus::CannotVerify);
    }

    #[test]
    fn test_children_follow_chain_order() {
        let map = fields(&[
            ("AudioEvent", "RangerVoice"),
            ("FXList", "FX_Muzzle"),
            ("Projectile", "Bullet"),
            ("Weapon", "Rifle"),
            ("Armor", "InfArmor"),
        ]);
        let graph = DependencyGraphResolver::new().analyze("1", "Ranger", &map);
        let kinds: Vec<DependencyType> = graph.root().children().iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DependencyType::Armor,
                DependencyType::Weapon,
                DependencyType::Projectile,
                DependencyType::VisualEffect,
                DependencyType::Audio
            ]
        );
        assert!(graph.all_nodes().iter().skip(1).all(|n| n.depth == 1));
    }

    #[test]
    fn test_self_and_duplicate_references_are_skipped() {
        let map = fields(&[("Armor", "ranger"), ("Weapon", "Shared"), ("Projectile", "SHARED")]);
        let graph = DependencyGraphResolver::new().analyze("1", "Ranger", &map);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.root().children()[0].name, "Shared");
    }

    #[test]
    fn test_invalid_reference_is_marked() {
        let map = fields(&[("Armor", "../../outside.ini")]);
        let graph = DependencyGraphResolver::new().analyze("1", "Ranger", &map);
        assert_eq!(graph.root().children()[0].status, NodeStatus::Invalid);
        assert_eq!(graph.missing_count(), 0);
    }

    #[test]
    fn test_filesystem_probe_marks_found_and_missing() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("InfArmor"), b"armor-data").unwrap();

        let map = fields(&[("Armor", "InfArmor"), ("Weapon", "Rifle")]);
        let graph = DependencyGraphResolver::new()
            .with_asset_dir(temp_dir.path())
            .analyze("1", "Rifleman", &map);

        let armor = graph.root().find("InfArmor").unwrap();
        assert_eq!(armor.status, NodeStatus::Found);
        assert_eq!(armor.size, Some(10));
        assert_eq!(graph.root().find("Rifle").unwrap().status, NodeStatus::Missing);
        assert_eq!(graph.status(), CompletionStatus::Incomplete);
        assert_eq!(graph.total_size(), 10);
    }

    #[test]
    fn test_field_source_enables_deeper_resolution() {
        let mut source: HashMap<String, FieldMap> = HashMap::new();
        source.insert("Rifle".to_string(), fields(&[("Projectile", "Bullet")]));
        source.insert("bullet".to_string(), fields(&[("FXList", "FX_Tracer")]));

        let map = fields(&[("Weapon", "Rifle")]);
        let graph = DependencyGraphResolver::new()
            .with_field_source(&source)
            .analyze("1", "Rifleman", &map);

        let names: Vec<&str> = graph.all_nodes().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Rifleman", "Rifle", "Bullet", "FX_Tracer"]);
        assert_eq!(graph.max_depth(), 3);
    }

    #[test]
    fn test_depth_ceiling() {
        let mut source: HashMap<String, FieldMap> = HashMap::new();
        for i in 0..10 {
            source.insert(format!("A{}", i), fields(&[("Weapon", &format!("A{}", i + 1))]));
        }
        let graph = DependencyGraphResolver::new()
            .with_field_source(&source)
            .with_max_depth(3)
            .analyze("1", "Root", &fields(&[("Weapon", "A0")]));

        assert_eq!(graph.max_depth(), 3);
        assert!(graph.all_nodes().iter().all(|n| n.depth <= 3));
        assert_eq!(graph.node_count(), 4);
    }

    #[test]
    fn test_zero_depth_keeps_only_root() {
        let graph = DependencyGraphResolver::new()
            .with_max_depth(0)
            .analyze("1", "Root", &fields(&[("Weapon", "Rifle")]));
        assert_eq!(graph.node_count(), 1);
    }
}
