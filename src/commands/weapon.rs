use super::check::print_result;
use super::{load_definitions, mount_sources, probe_chain, Rejected};
use crate::SourceArgs;
use anyhow::Result;
use modbridge::audit::TracingAuditSink;
use modbridge::{resolve_weapon_chain, Config, FsProbe, PolicyEngine};
use serde_json::json;
use std::sync::Arc;

pub fn run(definitions: &str, weapon: &str, sources: &SourceArgs, json: bool) -> Result<()> {
    let config = Config::load()?;
    let index = mount_sources(&config, sources)?;
    let table = load_definitions(&index, definitions)?;

    let fs_probe = sources.asset_dir.as_ref().map(FsProbe::new);
    let probe = probe_chain(&index, fs_probe.as_ref());
    let chain = resolve_weapon_chain(&table, weapon, &probe);

    let engine = PolicyEngine::from_config(&config.policy, Arc::new(TracingAuditSink));
    let result = engine.evaluate_weapon(&chain);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "chain": chain, "validation": result }))?
        );
    } else {
        println!("Weapon: {}", chain.weapon_name);
        println!(
            "  Projectile:   {}",
            chain.projectile.as_deref().unwrap_or("(none)")
        );
        println!("  Dependencies: {}  Depth: {}", chain.dependency_count, chain.depth);
        for file in &chain.related_files {
            let mark = if chain.missing_files.contains(file) { "✗" } else { "✓" };
            println!("    {} {}", mark, file);
        }
        println!();
        print_result(&result);
    }

    if !result.is_valid {
        return Err(Rejected {
            kind: "Weapon",
            name: weapon.to_string(),
        }
        .into());
    }
    Ok(())
}
