//! modbridge - archive-backed asset dependency resolution for game mods
//!
//! modbridge reads the game's packed asset containers and its INI-like object
//! definitions, works out everything a unit depends on, and decides whether the
//! unit can be transferred to another mod. It provides:
//!
//! - A case-insensitive index over many containers with priority overrides
//! - Bounded, streamed extraction of individual entries
//! - Verbatim extraction of `Object ... End` definition blocks
//! - Dependency graphs with cycle protection and a depth ceiling
//! - An acceptance policy with stable rejection reasons and an audit trail
//!
//! # Examples
//!
//! ```no_run
//! use modbridge::audit::TracingAuditSink;
//! use modbridge::{mount_archives, DefinitionTable, DependencyGraphResolver, FieldSource};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let index = mount_archives(&["INIZH.big", "!!Patch.big"], Arc::new(TracingAuditSink));
//! let table = DefinitionTable::parse_bytes(&index.extract("Data/INI/Object/AmericaInfantry.ini")?)?;
//!
//! let fields = table.fields_for("AmericaInfantryRanger").unwrap_or_default();
//! let graph = DependencyGraphResolver::new()
//!     .with_archive(&index)
//!     .analyze("1", "AmericaInfantryRanger", &fields);
//!
//! println!("{}", graph.render_tree());
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`archive`] - Container format, mounting, lookup and extraction
//! - [`definition`] - Definition text parsing and object block extraction
//! - [`resolver`] - Dependency chain walking
//! - [`graph`] - Dependency trees and completion statistics
//! - [`probe`] - Existence checks against archives and directories
//! - [`policy`] - Type filter, limits and weapon completeness
//! - [`weapon`] - Weapon sub-chain resolution
//! - [`audit`] - Audit records and sinks
//! - [`config`] - User configuration management
//! - [`error`] - Error types and result handling

pub mod archive;
pub mod audit;
pub mod config;
pub mod definition;
pub mod error;
pub mod graph;
pub mod policy;
pub mod probe;
pub mod resolver;
pub mod weapon;

pub use archive::{
    lookup_asset, mount_archives, ArchiveBuilder, ArchiveContainer, ArchiveEntry, ArchiveIndex,
    AssetLocation, MountReport,
};
pub use audit::{AuditRecord, AuditSink, MemoryAuditSink, SharedAuditSink, Verdict};
pub use config::{Config, PolicyConfig, ResolverConfig};
pub use definition::{DefinitionTable, ObjectBlock};
pub use error::{Error, Result};
pub use graph::{CompletionStatus, DependencyNode, DependencyType, NodeStatus, UnitDependencyGraph};
pub use policy::{PolicyEngine, PolicyVerdict, ValidationResult, MAX_CHAIN_DEPTH, MAX_WEAPON_DEPENDENCIES};
pub use probe::{AssetProbe, FsProbe};
pub use resolver::{DependencyGraphResolver, FieldMap, FieldSource};
pub use weapon::{resolve_weapon_chain, WeaponChain};
