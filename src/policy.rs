//! Acceptance policy for transferable units and weapons
//!
//! Each check is a pure predicate over its input that returns a
//! [`PolicyVerdict`] and reports the decision to the engine's audit sink.
//! A rejection is a normal result, not an error: it carries a stable reason
//! string that can be shown to the user or aggregated across many units.
//!
//! # Examples
//!
//! ```
//! use modbridge::audit::NullAuditSink;
//! use modbridge::policy::PolicyEngine;
//! use std::sync::Arc;
//!
//! let engine = PolicyEngine::new(Arc::new(NullAuditSink));
//!
//! let verdict = engine.check_kind_of("Barracks", Some("BUILDING STRUCTURE"));
//! assert!(!verdict.accepted);
//! assert_eq!(verdict.reason, "Forbidden type: STRUCTURE");
//!
//! assert!(engine.check_kind_of("Rifleman", Some("INFANTRY")).accepted);
//! ```

use crate::audit::{AuditRecord, SharedAuditSink, Verdict};
use crate::config::PolicyConfig;
use crate::graph::{CompletionStatus, NodeStatus, UnitDependencyGraph};
use crate::resolver::{field_value, FieldMap};
use crate::weapon::WeaponChain;
use serde::Serialize;
use std::fmt;

/// Most dependencies a weapon chain may pull in
pub const MAX_WEAPON_DEPENDENCIES: usize = 80;

/// Deepest dependency level accepted
pub const MAX_CHAIN_DEPTH: usize = 4;

pub const REASON_CINEMATIC: &str = "Cinematic-only object";
pub const REASON_MISSING_KIND_OF: &str = "Missing KindOf classification";
pub const REASON_NO_COMBAT_TYPE: &str = "No combat unit type";
pub const REASON_DEPENDENCY_LIMIT: &str = "Dependency count exceeds limit";
pub const REASON_DEPENDENCY_OK: &str = "Dependency count within limit";
pub const REASON_DEPTH_LIMIT: &str = "Dependency depth exceeds limit";
pub const REASON_DEPTH_OK: &str = "Dependency depth within limit";
pub const REASON_WEAPON_INCOMPLETE: &str = "Weapon marked as incomplete";
pub const REASON_EMPTY_WEAPON_NAME: &str = "Weapon name is empty";
pub const REASON_NO_PROJECTILE: &str = "Missing projectile reference";
pub const REASON_NO_RELATED_FILES: &str = "No related files";
pub const REASON_MISSING_FILES: &str = "Weapon has missing files";
pub const REASON_WEAPON_COMPLETE: &str = "Weapon chain complete";

/// Unit categories that may be transferred
pub const DEFAULT_ALLOWED_KINDS: &[&str] = &["INFANTRY", "VEHICLE", "AIRCRAFT", "HUGE_VEHICLE"];

/// Categories that are never transferred, even alongside an allowed one
pub const DEFAULT_FORBIDDEN_KINDS: &[&str] = &["STRUCTURE", "SHRUBBERY", "PRELOAD", "CRATE", "DECORATION"];

/// Object name prefix of cinematic-only units
pub const DEFAULT_CINEMATIC_PREFIX: &str = "CINE_";

/// Numeric ceilings applied to chains and graphs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PolicyLimits {
    pub max_dependencies: usize,
    pub max_depth: usize,
}

impl Default for PolicyLimits {
    fn default() -> Self {
        Self {
            max_dependencies: MAX_WEAPON_DEPENDENCIES,
            max_depth: MAX_CHAIN_DEPTH,
        }
    }
}

/// Which check produced a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PolicyRule {
    TypeFilter,
    DependencyLimit,
    DepthLimit,
    Completeness,
}

impl PolicyRule {
    /// Operation name used in audit records
    pub fn operation(&self) -> &'static str {
        match self {
            PolicyRule::TypeFilter => "type_filter",
            PolicyRule::DependencyLimit => "dependency_limit",
            PolicyRule::DepthLimit => "depth_limit",
            PolicyRule::Completeness => "weapon_completeness",
        }
    }
}

impl fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operation())
    }
}

/// Outcome of one check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyVerdict {
    pub rule: PolicyRule,
    pub accepted: bool,
    /// Stable, aggregatable reason
    pub reason: String,
    /// Specifics that vary per input (counts, names)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl PolicyVerdict {
    pub fn accept(rule: PolicyRule, reason: impl Into<String>) -> Self {
        Self {
            rule,
            accepted: true,
            reason: reason.into(),
            details: None,
        }
    }

    pub fn reject(rule: PolicyRule, reason: impl Into<String>) -> Self {
        Self {
            rule,
            accepted: false,
            reason: reason.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// KindOf-based classification rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeFilter {
    pub allowed: Vec<String>,
    pub forbidden: Vec<String>,
    pub cinematic_prefix: String,
}

impl Default for TypeFilter {
    fn default() -> Self {
        Self {
            allowed: DEFAULT_ALLOWED_KINDS.iter().map(|s| s.to_string()).collect(),
            forbidden: DEFAULT_FORBIDDEN_KINDS.iter().map(|s| s.to_string()).collect(),
            cinematic_prefix: DEFAULT_CINEMATIC_PREFIX.to_string(),
        }
    }
}

impl TypeFilter {
    fn evaluate(&self, object_name: &str, kind_of: Option<&str>) -> PolicyVerdict {
        let prefix = &self.cinematic_prefix;
        if !prefix.is_empty()
            && object_name.len() >= prefix.len()
            && object_name
                .get(..prefix.len())
                .map(|head| head.eq_ignore_ascii_case(prefix))
                .unwrap_or(false)
        {
            return PolicyVerdict::reject(PolicyRule::TypeFilter, REASON_CINEMATIC)
                .with_details(format!("name starts with {}", prefix));
        }

        let tokens: Vec<&str> = kind_of
            .map(|k| {
                k.split(|c: char| c.is_whitespace() || c == ',' || c == '|')
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        if tokens.is_empty() {
            return PolicyVerdict::reject(PolicyRule::TypeFilter, REASON_MISSING_KIND_OF);
        }

        if let Some(forbidden) = self
            .forbidden
            .iter()
            .find(|f| tokens.iter().any(|t| t.eq_ignore_ascii_case(f)))
        {
            return PolicyVerdict::reject(
                PolicyRule::TypeFilter,
                format!("Forbidden type: {}", forbidden.to_uppercase()),
            )
            .with_details(format!("KindOf = {}", tokens.join(" ")));
        }

        match self
            .allowed
            .iter()
            .find(|a| tokens.iter().any(|t| t.eq_ignore_ascii_case(a)))
        {
            Some(allowed) => PolicyVerdict::accept(
                PolicyRule::TypeFilter,
                format!("Allowed type: {}", allowed.to_uppercase()),
            ),
            None => PolicyVerdict::reject(PolicyRule::TypeFilter, REASON_NO_COMBAT_TYPE)
                .with_details(format!("KindOf = {}", tokens.join(" "))),
        }
    }
}

/// One problem found while validating a graph or weapon chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl ValidationIssue {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            file: None,
        }
    }

    fn for_file(code: &'static str, message: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            file: Some(file.into()),
        }
    }
}

/// Aggregated verdict for one unit or weapon
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub unit_id: String,
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    fn from_issues(unit_id: &str, errors: Vec<ValidationIssue>, warnings: Vec<ValidationIssue>) -> Self {
        Self {
            unit_id: unit_id.to_string(),
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

pub const CODE_TYPE_REJECTED: &str = "TYPE_REJECTED";
pub const CODE_MISSING_DEPENDENCY: &str = "MISSING_DEPENDENCY";
pub const CODE_INVALID_REFERENCE: &str = "INVALID_REFERENCE";
pub const CODE_DEPENDENCY_LIMIT: &str = "DEPENDENCY_LIMIT";
pub const CODE_DEPTH_LIMIT: &str = "DEPTH_LIMIT";
pub const CODE_WEAPON_INCOMPLETE: &str = "WEAPON_INCOMPLETE";
pub const CODE_UNVERIFIED: &str = "UNVERIFIED_DEPENDENCY";
pub const CODE_PARTIAL: &str = "PARTIAL_COMPLETION";

/// Runs the acceptance checks and reports every decision to the audit sink
pub struct PolicyEngine {
    limits: PolicyLimits,
    type_filter: TypeFilter,
    sink: SharedAuditSink,
}

impl PolicyEngine {
    pub fn new(sink: SharedAuditSink) -> Self {
        Self {
            limits: PolicyLimits::default(),
            type_filter: TypeFilter::default(),
            sink,
        }
    }

    pub fn from_config(config: &PolicyConfig, sink: SharedAuditSink) -> Self {
        Self::new(sink)
            .with_limits(PolicyLimits {
                max_dependencies: config.max_dependencies,
                max_depth: config.max_depth,
            })
            .with_type_filter(TypeFilter {
                allowed: config.allowed_kinds.clone(),
                forbidden: config.forbidden_kinds.clone(),
                cinematic_prefix: config.cinematic_prefix.clone(),
            })
    }

    pub fn with_limits(mut self, limits: PolicyLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_type_filter(mut self, type_filter: TypeFilter) -> Self {
        self.type_filter = type_filter;
        self
    }

    pub fn limits(&self) -> PolicyLimits {
        self.limits
    }

    /// Type filter over an object's `KindOf` field
    pub fn check_object_type(&self, object_name: &str, fields: &FieldMap) -> PolicyVerdict {
        self.check_kind_of(object_name, field_value(fields, "KindOf"))
    }

    /// Type filter over an explicit `KindOf` value
    pub fn check_kind_of(&self, object_name: &str, kind_of: Option<&str>) -> PolicyVerdict {
        let verdict = self.type_filter.evaluate(object_name, kind_of);
        self.audit(object_name, &verdict);
        verdict
    }

    /// Rejects when `count` is strictly above the dependency ceiling
    pub fn check_dependency_count(&self, target: &str, count: usize) -> PolicyVerdict {
        let max = self.limits.max_dependencies;
        let verdict = if count > max {
            PolicyVerdict::reject(PolicyRule::DependencyLimit, REASON_DEPENDENCY_LIMIT)
        } else {
            PolicyVerdict::accept(PolicyRule::DependencyLimit, REASON_DEPENDENCY_OK)
        }
        .with_details(format!("{} dependencies, limit {}", count, max));
        self.audit(target, &verdict);
        verdict
    }

    /// Rejects when `depth` is strictly above the depth ceiling
    pub fn check_depth(&self, target: &str, depth: usize) -> PolicyVerdict {
        let max = self.limits.max_depth;
        let verdict = if depth > max {
            PolicyVerdict::reject(PolicyRule::DepthLimit, REASON_DEPTH_LIMIT)
        } else {
            PolicyVerdict::accept(PolicyRule::DepthLimit, REASON_DEPTH_OK)
        }
        .with_details(format!("depth {}, limit {}", depth, max));
        self.audit(target, &verdict);
        verdict
    }

    /// Completeness gate for a weapon chain
    ///
    /// The upstream completeness flag is checked first, then name, projectile,
    /// related and missing files, and the dependency limit last.
    pub fn is_weapon_complete(&self, chain: &WeaponChain) -> PolicyVerdict {
        let target = chain.weapon_name.as_str();
        let rejection = if !chain.is_complete {
            Some(PolicyVerdict::reject(PolicyRule::Completeness, REASON_WEAPON_INCOMPLETE))
        } else if chain.weapon_name.trim().is_empty() {
            Some(PolicyVerdict::reject(PolicyRule::Completeness, REASON_EMPTY_WEAPON_NAME))
        } else if chain
            .projectile
            .as_deref()
            .map(|p| p.trim().is_empty())
            .unwrap_or(true)
        {
            Some(PolicyVerdict::reject(PolicyRule::Completeness, REASON_NO_PROJECTILE))
        } else if chain.related_files.is_empty() {
            Some(PolicyVerdict::reject(PolicyRule::Completeness, REASON_NO_RELATED_FILES))
        } else if !chain.missing_files.is_empty() {
            Some(
                PolicyVerdict::reject(PolicyRule::Completeness, REASON_MISSING_FILES)
                    .with_details(chain.missing_files.join(", ")),
            )
        } else {
            None
        };

        if let Some(verdict) = rejection {
            self.audit(target, &verdict);
            return verdict;
        }

        let limit = self.check_dependency_count(target, chain.dependency_count);
        if !limit.accepted {
            return limit;
        }

        let verdict = PolicyVerdict::accept(PolicyRule::Completeness, REASON_WEAPON_COMPLETE)
            .with_details(format!("{} related files", chain.related_files.len()));
        self.audit(target, &verdict);
        verdict
    }

    /// Limits and missing/invalid dependencies of a resolved graph
    pub fn evaluate_graph(&self, graph: &UnitDependencyGraph) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        self.collect_graph_issues(graph, &mut errors, &mut warnings);
        ValidationResult::from_issues(graph.unit_id(), errors, warnings)
    }

    /// Type filter on the unit's own fields plus [`PolicyEngine::evaluate_graph`]
    pub fn evaluate_unit(&self, graph: &UnitDependencyGraph, fields: &FieldMap) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let verdict = self.check_object_type(graph.unit_name(), fields);
        if !verdict.accepted {
            errors.push(ValidationIssue::new(CODE_TYPE_REJECTED, verdict.reason));
        }
        self.collect_graph_issues(graph, &mut errors, &mut warnings);
        ValidationResult::from_issues(graph.unit_id(), errors, warnings)
    }

    /// Completeness and limits of a weapon chain
    pub fn evaluate_weapon(&self, chain: &WeaponChain) -> ValidationResult {
        let mut errors = Vec::new();

        for missing in &chain.missing_files {
            errors.push(ValidationIssue::for_file(
                CODE_MISSING_DEPENDENCY,
                format!("Missing file: {}", missing),
                missing.clone(),
            ));
        }

        let depth = self.check_depth(&chain.weapon_name, chain.depth);
        if !depth.accepted {
            errors.push(ValidationIssue::new(CODE_DEPTH_LIMIT, depth.reason));
        }

        let verdict = self.is_weapon_complete(chain);
        if !verdict.accepted {
            let code = if verdict.rule == PolicyRule::DependencyLimit {
                CODE_DEPENDENCY_LIMIT
            } else {
                CODE_WEAPON_INCOMPLETE
            };
            errors.push(ValidationIssue::new(code, verdict.reason));
        }

        ValidationResult::from_issues(&chain.weapon_name, errors, Vec::new())
    }

    fn collect_graph_issues(
        &self,
        graph: &UnitDependencyGraph,
        errors: &mut Vec<ValidationIssue>,
        warnings: &mut Vec<ValidationIssue>,
    ) {
        let target = graph.unit_name();

        let count = self.check_dependency_count(target, graph.dependency_count());
        if !count.accepted {
            errors.push(ValidationIssue::new(CODE_DEPENDENCY_LIMIT, count.reason));
        }
        let depth = self.check_depth(target, graph.max_depth());
        if !depth.accepted {
            errors.push(ValidationIssue::new(CODE_DEPTH_LIMIT, depth.reason));
        }

        for node in graph.all_nodes().into_iter().skip(1) {
            match node.status {
                NodeStatus::Missing => errors.push(ValidationIssue::for_file(
                    CODE_MISSING_DEPENDENCY,
                    format!("Missing {} dependency: {}", node.kind, node.name),
                    node.name.clone(),
                )),
                NodeStatus::Invalid => errors.push(ValidationIssue::for_file(
                    CODE_INVALID_REFERENCE,
                    format!("Invalid {} reference: {}", node.kind, node.name),
                    node.name.clone(),
                )),
                NodeStatus::NotVerified => warnings.push(ValidationIssue::for_file(
                    CODE_UNVERIFIED,
                    format!("Could not verify {} dependency: {}", node.kind, node.name),
                    node.name.clone(),
                )),
                NodeStatus::Found => {}
            }
        }

        if graph.status() == CompletionStatus::Partial {
            warnings.push(ValidationIssue::new(
                CODE_PARTIAL,
                format!("{:.0}% of dependencies found", graph.completion_percentage()),
            ));
        }
    }

    fn audit(&self, target: &str, verdict: &PolicyVerdict) {
        let outcome = if verdict.accepted {
            Verdict::Accepted
        } else {
            Verdict::Rejected
        };
        let mut record = AuditRecord::new(verdict.rule.operation(), target, outcome, verdict.reason.clone());
        if let Some(details) = &verdict.details {
            record = record.with_details(details.clone());
        }
        self.sink.record(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::graph::{DependencyNode, DependencyType};
    use std::sync::Arc;

    fn engine() -> (PolicyEngine, Arc<MemoryAuditSink>) {
        let sink = Arc::new(MemoryAuditSink::new());
        (PolicyEngine::new(sink.clone()), sink)
    }

    fn complete_chain() -> WeaponChain {
        WeaponChain {
            weapon_name: "RangerRifle".to_string(),
            projectile: Some("RifleBullet".to_string()),
            related_files: vec!["RifleBullet".to_string(), "FX_Muzzle".to_string()],
            missing_files: Vec::new(),
            dependency_count: 2,
            depth: 2,
            is_complete: true,
        }
    }

    #[test]
    fn test_type_filter_forbidden_before_allowed() {
        let (engine, _) = engine();
        let verdict = engine.check_kind_of("Hybrid", Some("INFANTRY CRATE"));
        assert!(!verdict.accepted);
        assert_eq!(verdict.reason, "Forbidden type: CRATE");
    }

    #[test]
    fn test_type_filter_cinematic_prefix_first() {
        let (engine, _) = engine();
        let verdict = engine.check_kind_of("cine_Ranger", Some("INFANTRY"));
        assert!(!verdict.accepted);
        assert_eq!(verdict.reason, REASON_CINEMATIC);
    }

    #[test]
    fn test_type_filter_missing_kind_of() {
        let (engine, _) = engine();
        assert_eq!(engine.check_kind_of("Thing", None).reason, REASON_MISSING_KIND_OF);
        assert_eq!(engine.check_kind_of("Thing", Some("   ")).reason, REASON_MISSING_KIND_OF);
    }

    #[test]
    fn test_type_filter_non_combat() {
        let (engine, _) = engine();
        let verdict = engine.check_kind_of("Cow", Some("SELECTABLE CAN_ATTACK"));
        assert!(!verdict.accepted);
        assert_eq!(verdict.reason, REASON_NO_COMBAT_TYPE);
    }

    #[test]
    fn test_type_filter_reads_fields() {
        let (engine, _) = engine();
        let mut fields = FieldMap::new();
        fields.insert("kindof".to_string(), "vehicle selectable".to_string());
        let verdict = engine.check_object_type("Humvee", &fields);
        assert!(verdict.accepted);
        assert_eq!(verdict.reason, "Allowed type: VEHICLE");
    }

    #[test]
    fn test_limits_are_strict() {
        let (engine, _) = engine();
        assert!(engine.check_dependency_count("w", 80).accepted);
        assert!(!engine.check_dependency_count("w", 81).accepted);
        assert!(engine.check_depth("w", 4).accepted);
        assert!(!engine.check_depth("w", 5).accepted);
    }

    #[test]
    fn test_from_config_applies_limits_and_filter() {
        let config = PolicyConfig {
            max_dependencies: 10,
            max_depth: 2,
            forbidden_kinds: vec!["HERO".to_string()],
            ..PolicyConfig::default()
        };
        let engine = PolicyEngine::from_config(&config, Arc::new(MemoryAuditSink::new()));

        assert_eq!(engine.limits(), PolicyLimits { max_dependencies: 10, max_depth: 2 });
        assert!(!engine.check_dependency_count("w", 11).accepted);
        assert!(!engine.check_depth("w", 3).accepted);
        assert!(!engine.check_kind_of("Hero", Some("INFANTRY HERO")).accepted);
        // STRUCTURE is no longer forbidden, only outside the allowed set
        let verdict = engine.check_kind_of("Barracks", Some("STRUCTURE"));
        assert_eq!(verdict.reason, REASON_NO_COMBAT_TYPE);
    }

    #[test]
    fn test_with_limits_overrides_defaults() {
        let (engine, _) = engine();
        assert_eq!(engine.limits(), PolicyLimits::default());

        let engine = engine.with_limits(PolicyLimits { max_dependencies: 1, max_depth: 1 });
        let mut chain = complete_chain();
        chain.dependency_count = 2;
        assert_eq!(engine.is_weapon_complete(&chain).rule, PolicyRule::DependencyLimit);
    }

    #[test]
    fn test_every_check_is_audited() {
        let (engine, sink) = engine();
        engine.check_kind_of("Rifleman", Some("INFANTRY"));
        engine.check_kind_of("Barracks", Some("STRUCTURE"));
        engine.check_depth("w", 9);

        let records = sink.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].verdict, Verdict::Accepted);
        assert_eq!(records[1].operation, "type_filter");
        assert_eq!(records[2].reason, REASON_DEPTH_LIMIT);
        assert_eq!(records[2].details.as_deref(), Some("depth 9, limit 4"));
    }

    #[test]
    fn test_incomplete_flag_wins_over_everything() {
        let (engine, _) = engine();
        let chain = WeaponChain {
            weapon_name: String::new(),
            projectile: None,
            is_complete: false,
            ..WeaponChain::default()
        };
        let verdict = engine.is_weapon_complete(&chain);
        assert!(!verdict.accepted);
        assert_eq!(verdict.reason, REASON_WEAPON_INCOMPLETE);
    }

    #[test]
    fn test_completeness_reasons() {
        let (engine, _) = engine();

        let mut chain = complete_chain();
        chain.projectile = Some(" ".to_string());
        assert_eq!(engine.is_weapon_complete(&chain).reason, REASON_NO_PROJECTILE);

        let mut chain = complete_chain();
        chain.related_files.clear();
        assert_eq!(engine.is_weapon_complete(&chain).reason, REASON_NO_RELATED_FILES);

        let mut chain = complete_chain();
        chain.missing_files.push("FX_Muzzle".to_string());
        let verdict = engine.is_weapon_complete(&chain);
        assert_eq!(verdict.reason, REASON_MISSING_FILES);
        assert_eq!(verdict.details.as_deref(), Some("FX_Muzzle"));

        let mut chain = complete_chain();
        chain.weapon_name = String::new();
        assert_eq!(engine.is_weapon_complete(&chain).reason, REASON_EMPTY_WEAPON_NAME);
    }

    #[test]
    fn test_dependency_limit_is_final_gate() {
        let (engine, _) = engine();
        let mut chain = complete_chain();
        chain.dependency_count = 81;
        let verdict = engine.is_weapon_complete(&chain);
        assert!(!verdict.accepted);
        assert_eq!(verdict.rule, PolicyRule::DependencyLimit);

        chain.dependency_count = 80;
        let verdict = engine.is_weapon_complete(&chain);
        assert!(verdict.accepted);
        assert_eq!(verdict.reason, REASON_WEAPON_COMPLETE);
    }

    #[test]
    fn test_evaluate_graph_collects_issues() {
        let (engine, _) = engine();
        let mut root = DependencyNode::new("Ranger", DependencyType::ObjectDefinition, 0);
        let mut found = DependencyNode::new("HumanArmor", DependencyType::Armor, 1);
        found.status = NodeStatus::Found;
        let mut missing = DependencyNode::new("Rifle", DependencyType::Weapon, 1);
        missing.status = NodeStatus::Missing;
        let unverified = DependencyNode::new("Voice", DependencyType::Audio, 1);
        root.push_child(found);
        root.push_child(missing);
        root.push_child(unverified);
        let graph = UnitDependencyGraph::from_root("9", "Ranger", root);

        let result = engine.evaluate_graph(&graph);
        assert!(!result.is_valid);
        assert_eq!(result.unit_id, "9");
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, CODE_MISSING_DEPENDENCY);
        assert_eq!(result.errors[0].file.as_deref(), Some("Rifle"));
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].code, CODE_UNVERIFIED);
    }

    #[test]
    fn test_evaluate_unit_adds_type_filter() {
        let (engine, _) = engine();
        let graph = UnitDependencyGraph::from_root(
            "3",
            "Barracks",
            DependencyNode::new("Barracks", DependencyType::ObjectDefinition, 0),
        );
        let mut fields = FieldMap::new();
        fields.insert("KindOf".to_string(), "BUILDING STRUCTURE".to_string());

        let result = engine.evaluate_unit(&graph, &fields);
        assert!(!result.is_valid);
        assert_eq!(result.errors[0].code, CODE_TYPE_REJECTED);
        assert_eq!(result.errors[0].message, "Forbidden type: STRUCTURE");
    }

    #[test]
    fn test_evaluate_weapon() {
        let (engine, _) = engine();
        assert!(engine.evaluate_weapon(&complete_chain()).is_valid);

        let mut chain = complete_chain();
        chain.missing_files.push("FX_Muzzle".to_string());
        chain.is_complete = false;
        let result = engine.evaluate_weapon(&chain);
        assert!(!result.is_valid);
        assert_eq!(result.errors[0].code, CODE_MISSING_DEPENDENCY);
        assert_eq!(result.errors.last().unwrap().message, REASON_WEAPON_INCOMPLETE);
    }
}
