//! `lockstep list` and `lockstep describe`: browse the built-in scenarios.

use anyhow::Result;

use lockstep_core::ScenarioRegistry;

/// Registered scenario names, sorted, one per line.
pub fn render_list(registry: &ScenarioRegistry) -> String {
    let mut names = registry.list_names();
    names.sort_unstable();
    names.join("\n")
}

/// Name and description of one scenario.
pub fn render_description(registry: &ScenarioRegistry, name: &str) -> Result<String> {
    let entry = registry.resolve(name)?;
    let body = entry
        .description
        .as_deref()
        .unwrap_or("(no description)");
    Ok(format!("{}\n\n{body}", entry.name))
}

pub fn run_list(registry: &ScenarioRegistry) {
    println!("{}", render_list(registry));
}

pub fn run_describe(registry: &ScenarioRegistry, name: &str) -> Result<()> {
    println!("{}", render_description(registry, name)?);
    Ok(())
}
