use super::{load_unit, LoadedUnit};
use crate::UnitArgs;
use anyhow::Result;
use modbridge::graph::format_size;
use modbridge::{DependencyGraphResolver, NodeStatus, UnitDependencyGraph};

pub fn run(unit: &UnitArgs, json: bool) -> Result<()> {
    let loaded = load_unit(unit)?;
    let graph = resolve(unit, &loaded);

    if json {
        println!("{}", serde_json::to_string_pretty(&graph)?);
        return Ok(());
    }

    print_graph(&graph);
    Ok(())
}

/// Resolve the unit's graph with the command-line overrides applied
pub fn resolve(unit: &UnitArgs, loaded: &LoadedUnit) -> UnitDependencyGraph {
    let mut resolver = DependencyGraphResolver::from_config(&loaded.config.resolver)
        .with_archive(&loaded.index);
    if let Some(dir) = &unit.sources.asset_dir {
        resolver = resolver.with_asset_dir(dir);
    }
    if let Some(max_depth) = unit.max_depth {
        resolver = resolver.with_max_depth(max_depth);
    }
    if unit.follow || loaded.config.resolver.follow_definitions {
        resolver = resolver.with_field_source(&loaded.table);
    }

    let id = unit.id.as_deref().unwrap_or(&unit.object);
    resolver.analyze(id, &unit.object, &loaded.fields)
}

pub fn print_graph(graph: &UnitDependencyGraph) {
    println!("Dependency tree:");
    println!();
    print!("{}", graph.render_tree());
    println!();
    println!(
        "  Dependencies: {}  Found: {}  Missing: {}  Depth: {}",
        graph.dependency_count(),
        graph.found_count(),
        graph.missing_count(),
        graph.max_depth()
    );
    println!("  Total size:   {}", format_size(graph.total_size()));
    println!(
        "  Completion:   {:.1}% ({})",
        graph.completion_percentage(),
        graph.status()
    );

    let unresolved: Vec<_> = [NodeStatus::Missing, NodeStatus::Invalid]
        .into_iter()
        .flat_map(|status| graph.nodes_with_status(status))
        .collect();
    if !unresolved.is_empty() {
        println!();
        println!("Unresolved:");
        for node in unresolved {
            let label = if node.status == NodeStatus::Invalid { "invalid" } else { "missing" };
            println!("  - {} [{}] {}", node.name, node.kind, label);
        }
    }
}
