use anyhow::Result;
use modbridge::Config;

pub fn run(action: &crate::ConfigAction) -> Result<()> {
    use crate::ConfigAction;

    match action {
        ConfigAction::Show => show_config(),
        ConfigAction::Path => {
            println!("{}", Config::default_path()?.display());
            Ok(())
        }
    }
}

fn show_config() -> Result<()> {
    let config = Config::load()?;
    let config_path = Config::default_path()?;

    println!("Config file: {}", config_path.display());
    if !config_path.exists() {
        println!("  (not created yet, showing defaults)");
    }
    println!();

    println!("[archives]");
    println!("  priority_marker     = {:?}", config.archives.priority_marker);
    println!("  extension           = {:?}", config.archives.extension);
    if config.archives.search_paths.is_empty() {
        println!("  search_paths        = (none)");
    } else {
        println!("  search_paths:");
        for (raw, expanded) in config
            .archives
            .search_paths
            .iter()
            .zip(config.archives.expanded_search_paths())
        {
            let marker = if expanded.exists() { "✓" } else { "✗" };
            println!("    {} {} -> {}", marker, raw, expanded.display());
        }
    }
    println!();

    println!("[resolver]");
    println!("  max_depth           = {}", config.resolver.max_depth);
    println!("  follow_definitions  = {}", config.resolver.follow_definitions);
    println!();

    println!("[policy]");
    println!("  max_dependencies    = {}", config.policy.max_dependencies);
    println!("  max_depth           = {}", config.policy.max_depth);
    println!("  allowed_kinds       = {}", config.policy.allowed_kinds.join(", "));
    println!("  forbidden_kinds     = {}", config.policy.forbidden_kinds.join(", "));
    println!("  cinematic_prefix    = {:?}", config.policy.cinematic_prefix);
    println!();

    println!("[logging]");
    println!("  level               = {:?}", config.logging.level);

    Ok(())
}
