use super::analyze::{print_graph, resolve};
use super::{load_unit, Rejected};
use crate::UnitArgs;
use anyhow::Result;
use modbridge::audit::TracingAuditSink;
use modbridge::policy::ValidationResult;
use modbridge::PolicyEngine;
use std::sync::Arc;

pub fn run(unit: &UnitArgs, json: bool) -> Result<()> {
    let loaded = load_unit(unit)?;
    let graph = resolve(unit, &loaded);

    let engine = PolicyEngine::from_config(&loaded.config.policy, Arc::new(TracingAuditSink));
    let result = engine.evaluate_unit(&graph, &loaded.fields);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_graph(&graph);
        let limits = engine.limits();
        println!(
            "  Limits:       {} dependencies, depth {}",
            limits.max_dependencies, limits.max_depth
        );
        println!();
        print_result(&result);
    }

    if !result.is_valid {
        return Err(Rejected {
            kind: "Unit",
            name: unit.object.clone(),
        }
        .into());
    }
    Ok(())
}

pub fn print_result(result: &ValidationResult) {
    if result.is_valid {
        println!("✓ {} accepted", result.unit_id);
    } else {
        println!("✗ {} rejected", result.unit_id);
    }

    if !result.errors.is_empty() {
        println!();
        println!("Errors:");
        for issue in &result.errors {
            println!("  [{}] {}", issue.code, issue.message);
        }
    }

    if !result.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for issue in &result.warnings {
            println!("  [{}] {}", issue.code, issue.message);
        }
    }
}
