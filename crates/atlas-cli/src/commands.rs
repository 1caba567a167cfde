//! CLI command implementations.

use crate::config::{Config, Settings, CONFIG_DIR};
use crate::ViewArgs;
use atlas_core::{DependencyScope, ProjectRef, ProjectRelationship, ProjectVersionRef};
use atlas_graph::{
    AncestryTraversal, DependencyFilter, Direction, FilteringTraversal, ParentFilter, Provenance,
    SelectionKey, TraversalStrategy, ViewParams,
};
use colored::Colorize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use url::Url;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Initialize Atlas in a directory.
pub fn init(path: &Path, workspace: Option<&str>) -> Result<()> {
    if path.join(CONFIG_DIR).exists() {
        println!("{} Already initialized", "✓".green());
        return Ok(());
    }

    let config = Config::new(workspace);
    config.write(path)?;

    println!(
        "{} Initialized Atlas in {} (workspace {})",
        "✓".green(),
        path.display(),
        config.workspace.cyan()
    );
    println!("  Run {} to load relationships", "atlas import <file>".cyan());

    Ok(())
}

/// Import relationships from a JSON array into the workspace graph.
pub fn import(
    settings: &Settings,
    file: &Path,
    source: Option<&str>,
    pom_location: Option<&str>,
) -> Result<()> {
    let text = fs::read_to_string(file)?;
    let rels: Vec<ProjectRelationship> = serde_json::from_str(&text)?;

    let mut provenance = match source {
        Some(source) => Provenance::from_source(parse_location(source)?),
        None => Provenance::default(),
    };
    if let Some(location) = pom_location {
        provenance = provenance.with_pom_location(parse_location(location)?);
    }

    let store = settings.open_store()?;
    let mut graph = store.load_or_default(&settings.workspace)?;
    let before = graph.edge_count();
    graph.add_relationships(&rels, &provenance);
    store.save_graph(&settings.workspace, &graph)?;

    println!(
        "{} Imported {} relationships ({} new) into workspace {}",
        "✓".green(),
        rels.len().to_string().cyan(),
        graph.edge_count() - before,
        settings.workspace.cyan()
    );

    Ok(())
}

/// Walk a view and print the accepted relationships.
pub fn walk(settings: &Settings, args: &ViewArgs, reverse: bool, stats: bool, json: bool) -> Result<()> {
    let store = settings.open_store()?;
    let graph = store.load_graph(&settings.workspace)?.ok_or_else(|| {
        format!(
            "workspace '{}' is empty; run `atlas import` first",
            settings.workspace
        )
    })?;

    let (view, strategy) = build_view(settings, args)?;
    view.touch();

    let connection = graph.connect(view.clone());
    let direction = if reverse {
        Direction::Incoming
    } else {
        Direction::Outgoing
    };
    let outcome = atlas_graph::walk(&connection, strategy, direction);

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!(
        "{} {} relationships in view {}",
        "✓".green(),
        outcome.accepted.len().to_string().cyan(),
        view.short_id()[..12].dimmed()
    );

    for rel in &outcome.accepted {
        let managed = if rel.is_managed() { " (managed)" } else { "" };
        println!(
            "  {} {} {} {}{}",
            rel.relationship_type().to_string().yellow(),
            rel.declaring(),
            "->".dimmed(),
            rel.target().to_string().cyan(),
            managed.dimmed()
        );
    }

    if stats {
        for pass in &outcome.stats {
            println!("\n{}", pass);
        }
    }

    Ok(())
}

/// Print a view's long and short ids.
pub fn view_id(settings: &Settings, args: &ViewArgs) -> Result<()> {
    let (view, _) = build_view(settings, args)?;
    println!("{}", view.long_id());
    println!("{} {}", "shortId:".dimmed(), view.short_id().cyan());
    Ok(())
}

/// Show stored workspaces.
pub fn info(settings: &Settings) -> Result<()> {
    let store = settings.open_store()?;
    let workspaces = store.workspaces()?;

    println!("Store: {}", settings.store_path.display().to_string().cyan());

    if workspaces.is_empty() {
        println!("No workspaces stored yet.");
        return Ok(());
    }

    for ws in workspaces {
        let marker = if ws.workspace == settings.workspace {
            "*".green()
        } else {
            " ".normal()
        };
        let saved = ws
            .saved_at()
            .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "unknown".to_string());

        println!(
            "{} {}  {} nodes, {} edges, {} sources  {}",
            marker,
            ws.workspace.bold(),
            ws.stats.node_count,
            ws.stats.edge_count,
            ws.stats.sources,
            format!("(saved {})", saved).dimmed()
        );
    }

    Ok(())
}

/// Remove the current workspace's graph, or all of them.
pub fn clear(settings: &Settings, all: bool) -> Result<()> {
    let store = settings.open_store()?;

    if all {
        store.clear_all()?;
        println!("{} Cleared every workspace", "✓".green());
    } else {
        store.clear(&settings.workspace)?;
        println!("{} Cleared workspace {}", "✓".green(), settings.workspace.cyan());
    }

    Ok(())
}

/// Builds the view and traversal strategy described by the arguments.
fn build_view(
    settings: &Settings,
    args: &ViewArgs,
) -> Result<(Arc<ViewParams>, Arc<dyn TraversalStrategy>)> {
    let roots = args
        .roots
        .iter()
        .map(|root| root.parse::<ProjectVersionRef>())
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let selections = args
        .selections
        .iter()
        .map(|s| parse_selection(s))
        .collect::<Result<Vec<_>>>()?;

    let sources = args
        .sources
        .iter()
        .map(|s| parse_location(s))
        .collect::<Result<Vec<_>>>()?;

    let pom_locations = args
        .pom_locations
        .iter()
        .map(|s| parse_location(s))
        .collect::<Result<Vec<_>>>()?;

    let mut builder = ViewParams::builder(settings.workspace.clone())
        .with_roots(roots)
        .with_selections(selections)
        .with_active_sources(sources)
        .with_active_pom_locations(pom_locations);

    if args.ancestry {
        builder = builder.with_filter(Arc::new(ParentFilter));
    } else if let Some(scope) = &args.scope {
        let scope: DependencyScope = scope.parse()?;
        builder = builder.with_filter(Arc::new(DependencyFilter::new(scope)));
    }

    let view = Arc::new(builder.build()?);
    debug!("View: {}", view);

    let strategy: Arc<dyn TraversalStrategy> = if args.ancestry {
        Arc::new(AncestryTraversal)
    } else {
        Arc::new(FilteringTraversal::from_view(&view))
    };

    Ok((view, strategy))
}

/// Parses `g:a=g:a:v` (any version of a project) or `g:a:v=g:a:v2`.
fn parse_selection(input: &str) -> Result<(SelectionKey, ProjectVersionRef)> {
    let (key, selected) = input
        .split_once('=')
        .ok_or_else(|| format!("selection '{}' must look like KEY=GROUP:ARTIFACT:VERSION", input))?;

    let key = match key.matches(':').count() {
        1 => SelectionKey::Project(key.parse::<ProjectRef>()?),
        _ => SelectionKey::Version(key.parse::<ProjectVersionRef>()?),
    };

    Ok((key, selected.parse()?))
}

/// Accepts a URL, or a file path taken relative to the current directory.
fn parse_location(input: &str) -> Result<Url> {
    if let Ok(url) = Url::parse(input) {
        return Ok(url);
    }

    let path = std::env::current_dir()?.join(input);
    Url::from_file_path(&path)
        .map_err(|_| format!("'{}' is neither a URL nor a usable path", input).into())
}
