//! Install command - download and unpack components.

use console::style;
use stonectl::component::{Component, ComponentSpec};
use stonectl::manager::{InstallerConfig, Outcome};
use tracing::info;

use crate::error::CliError;
use crate::ui::{format_size, TerminalObserver};

/// Run the install command. An empty component list installs everything.
pub fn run(
    config: InstallerConfig,
    components: Vec<Component>,
    max_concurrent: Option<usize>,
) -> Result<(), CliError> {
    let config = match max_concurrent {
        Some(max) => config.with_max_concurrent_transfers(max),
        None => config,
    };
    let components = resolve_components(components);
    let specs: Vec<ComponentSpec> = components.iter().map(Component::spec).collect();

    println!(
        "Installing {} into {}",
        component_list(&components),
        config.root.display()
    );
    info!(root = %config.root.display(), ceiling = config.concurrency(), "Install started");

    let observer = TerminalObserver::new();
    let result = stonectl::install(&specs, &config, &observer);
    observer.clear();
    let report = result?;

    println!();
    for component in &report.components {
        match &component.outcome {
            Outcome::Installed(_) => println!(
                "  {} {} ({})",
                style("✔").green(),
                component.component,
                format_size(component.bytes_received)
            ),
            Outcome::Failed(e) => {
                println!("  {} {}: {}", style("✘").red(), component.component, e)
            }
        }
    }
    println!();
    println!("{}", report);

    if report.all_installed() {
        Ok(())
    } else {
        Err(CliError::Incomplete {
            failed: report.failures().count(),
            total: report.components.len(),
        })
    }
}

/// Default to every component; keep the first occurrence of duplicates.
fn resolve_components(requested: Vec<Component>) -> Vec<Component> {
    if requested.is_empty() {
        return Component::ALL.to_vec();
    }
    let mut components = Vec::with_capacity(requested.len());
    for component in requested {
        if !components.contains(&component) {
            components.push(component);
        }
    }
    components
}

fn component_list(components: &[Component]) -> String {
    components
        .iter()
        .map(Component::name)
        .collect::<Vec<_>>()
        .join(", ")
}
