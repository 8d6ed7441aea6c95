//! Weapon sub-chains
//!
//! A weapon pulls in its projectile, effects and sounds. [`resolve_weapon_chain`]
//! walks those references through a [`FieldSource`], probes every name, and
//! decides whether the chain is complete. The policy engine only reads the
//! result.

use crate::graph::DependencyType;
use crate::policy::MAX_CHAIN_DEPTH;
use crate::probe::{is_valid_reference, AssetProbe};
use crate::resolver::{field_value, FieldMap, FieldSource, DEPENDENCY_CHAIN};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// Weapon-only reference keys not covered by the dependency chain
const EXTRA_REFERENCE_KEYS: [(&str, DependencyType); 4] = [
    ("FireFX", DependencyType::VisualEffect),
    ("ProjectileDetonationFX", DependencyType::VisualEffect),
    ("FireSound", DependencyType::Audio),
    ("ProjectileExhaust", DependencyType::VisualEffect),
];

/// Resolved state of one weapon and everything it references
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponChain {
    pub weapon_name: String,
    pub projectile: Option<String>,
    /// Every referenced name, in discovery order
    pub related_files: Vec<String>,
    /// Subset of `related_files` that no probe could find
    pub missing_files: Vec<String>,
    pub dependency_count: usize,
    pub depth: usize,
    pub is_complete: bool,
}

impl WeaponChain {
    /// Read a chain that was resolved elsewhere and flattened into fields
    ///
    /// List fields are separated by `,` or `;`. A missing `DependencyCount`
    /// falls back to the number of related files.
    pub fn from_fields(fields: &FieldMap) -> Self {
        let related_files = list_field(fields, "RelatedFiles");
        let dependency_count = field_value(fields, "DependencyCount")
            .and_then(|v| v.parse().ok())
            .unwrap_or(related_files.len());

        Self {
            weapon_name: field_value(fields, "WeaponName")
                .or_else(|| field_value(fields, "Name"))
                .unwrap_or_default()
                .to_string(),
            projectile: field_value(fields, "Projectile")
                .or_else(|| field_value(fields, "ProjectileObject"))
                .map(str::to_string),
            missing_files: list_field(fields, "MissingFiles"),
            related_files,
            dependency_count,
            depth: field_value(fields, "Depth")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            is_complete: field_value(fields, "IsComplete")
                .map(parse_flag)
                .unwrap_or(false),
        }
    }
}

fn list_field(fields: &FieldMap, key: &str) -> Vec<String> {
    field_value(fields, key)
        .map(|value| {
            value
                .split([',', ';'])
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "yes" | "1")
}

/// References a weapon-side field map points at
fn weapon_references(fields: &FieldMap) -> Vec<(DependencyType, String)> {
    let mut refs: Vec<(DependencyType, String)> = DEPENDENCY_CHAIN
        .iter()
        .filter(|step| {
            !matches!(step.kind, DependencyType::Armor | DependencyType::Weapon)
        })
        .filter_map(|step| step.find_reference(fields).map(|name| (step.kind, name.to_string())))
        .collect();

    for (key, kind) in EXTRA_REFERENCE_KEYS {
        if let Some(name) = field_value(fields, key) {
            refs.push((kind, name.to_string()));
        }
    }
    refs
}

/// Walk a weapon's references and probe each one
///
/// The weapon itself sits at depth 0; nothing is expanded past
/// [`MAX_CHAIN_DEPTH`]. A weapon without a definition comes back incomplete
/// with no related files.
pub fn resolve_weapon_chain(source: &dyn FieldSource, weapon: &str, probe: &dyn AssetProbe) -> WeaponChain {
    let mut chain = WeaponChain {
        weapon_name: weapon.trim().to_string(),
        ..WeaponChain::default()
    };

    let Some(fields) = source.fields_for(weapon) else {
        tracing::debug!(weapon, "no definition for weapon");
        return chain;
    };

    let mut visited = HashSet::new();
    visited.insert(weapon.trim().to_lowercase());
    let mut queue = VecDeque::from([(fields, 0usize)]);

    while let Some((fields, level)) = queue.pop_front() {
        for (kind, name) in weapon_references(&fields) {
            if !visited.insert(name.to_lowercase()) {
                continue;
            }
            let depth = level + 1;

            if level == 0 && kind == DependencyType::Projectile && chain.projectile.is_none() {
                chain.projectile = Some(name.clone());
            }
            if !is_valid_reference(&name) || !probe.exists(&name) {
                chain.missing_files.push(name.clone());
            }
            chain.depth = chain.depth.max(depth);

            if depth < MAX_CHAIN_DEPTH {
                if let Some(child) = source.fields_for(&name) {
                    queue.push_back((child, depth));
                }
            }
            chain.related_files.push(name);
        }
    }

    chain.dependency_count = chain.related_files.len();
    chain.is_complete = chain.projectile.is_some()
        && !chain.related_files.is_empty()
        && chain.missing_files.is_empty();

    tracing::debug!(
        weapon = %chain.weapon_name,
        related = chain.related_files.len(),
        missing = chain.missing_files.len(),
        complete = chain.is_complete,
        "resolved weapon chain"
    );
    chain
}
