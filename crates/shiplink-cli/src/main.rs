//! CLI binary for shiplink: replay scenarios, run transfers, inspect saves.

mod scenario;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scenario::Scenario;
use shiplink_core::memory::MemoryWorld;
use shiplink_core::{Network, ShiplinkConfig, storage};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "shiplink", about = "Item transport across moving structures")]
struct Cli {
    /// Directory holding shiplink.toml (defaults to current directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario and run the transfer scheduler
    Run {
        /// Scenario file (TOML)
        scenario: PathBuf,

        /// Ticks to simulate (defaults to one scheduling interval)
        #[arg(short, long)]
        ticks: Option<u32>,

        /// Save the resulting network into this world directory
        #[arg(long)]
        save: Option<PathBuf>,

        /// Print transfer reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a saved network
    Info {
        /// World directory containing shiplink/network.json
        dir: PathBuf,
    },

    /// Load a saved network against a scenario world and report stale links
    Validate {
        /// World directory containing shiplink/network.json
        dir: PathBuf,

        /// Scenario describing the current world
        #[arg(short, long)]
        scenario: PathBuf,
    },
}

fn get_config_root(cli: &Cli) -> Result<PathBuf> {
    match &cli.config {
        Some(p) => Ok(p.clone()),
        None => std::env::current_dir().context("failed to get current directory"),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ShiplinkConfig::load(&get_config_root(&cli)?)?;

    match cli.command {
        Commands::Run {
            scenario,
            ticks,
            save,
            json,
        } => cmd_run(config, &scenario, ticks, save.as_deref(), json),
        Commands::Info { dir } => cmd_info(&dir),
        Commands::Validate { dir, scenario } => cmd_validate(config, &dir, &scenario),
    }
}

fn cmd_run(
    config: ShiplinkConfig,
    scenario_path: &Path,
    ticks: Option<u32>,
    save: Option<&Path>,
    json: bool,
) -> Result<()> {
    let scenario = Scenario::load(scenario_path)?;
    let structures = scenario.structures();
    let ticks = ticks.unwrap_or(config.transfer.interval_ticks);
    let (mut world, mut net) = scenario.build(config)?;

    println!(
        "Loaded {} groups, {} storage groups, {} pending",
        net.group_ids().len(),
        net.storage_groups().count(),
        net.pending_count()
    );
    print_groups(&net);

    let mut runs = 0;
    for tick in 1..=ticks {
        let Some(report) = net.tick(&mut world, &structures) else {
            continue;
        };
        runs += 1;
        if json {
            println!("{}", serde_json::to_string(&report)?);
            continue;
        }
        println!(
            "\nTick {}: {} pairs considered, {} active, {} items moved",
            tick,
            report.pairs_considered,
            report.records.len(),
            report.total_moved()
        );
        for r in &report.records {
            println!(
                "  {} -> {}  alignment {:.1}%  quota {}  moved {}",
                r.exporter, r.importer, r.alignment, r.quota, r.moved
            );
        }
    }
    if runs == 0 {
        println!("\nNo scheduler run within {} ticks.", ticks);
    }
    tracing::info!("simulated {} ticks, {} scheduler runs", ticks, runs);

    if !json {
        print_inventories(&world);
    }

    if let Some(dir) = save {
        storage::save(dir, &mut net)?;
        println!("\nSaved to {}", storage::save_file(dir).display());
    }
    Ok(())
}

fn print_groups(net: &Network) {
    for group in net.groups() {
        println!(
            "  {}  {}  facing {}  {} nodes  {} storage  {:?}",
            group.id,
            group.mode,
            group.facing,
            group.len(),
            group.containers().len(),
            net.structure_info(group.id).unwrap_or(shiplink_core::StructureInfo::Grounded)
        );
    }
}

fn print_inventories(world: &MemoryWorld) {
    println!("\nInventories:");
    for pos in world.container_positions() {
        if let Some(inv) = world.inventory(pos) {
            println!("  {}  {} items", pos, inv.total());
        }
    }
}

fn cmd_info(dir: &Path) -> Result<()> {
    if !storage::exists(dir) {
        eprintln!("No network save found in {}.", dir.display());
        return Ok(());
    }

    let saved = storage::load_saved(dir)?;
    println!("Save v{}", saved.version);
    if let Some(at) = saved.saved_at {
        println!("Saved: {}", at.to_rfc3339());
    }
    println!("Groups: {}", saved.groups.len());
    println!("Storage groups: {}", saved.storage_groups.len());

    if !saved.groups.is_empty() {
        println!("\nGroups:");
        for g in &saved.groups {
            let place = match g.structure() {
                Some(id) => id.to_string(),
                None => "grounded".to_string(),
            };
            let facing = g.facing.map_or_else(|| "?".to_string(), |f| f.to_string());
            println!(
                "  {}  {}  facing {}  {} nodes  {}",
                g.id,
                g.mode(),
                facing,
                g.blocks.len(),
                place
            );
        }
    }

    if !saved.storage_groups.is_empty() {
        println!("\nStorage groups:");
        for sg in &saved.storage_groups {
            let linked: Vec<String> = sg.linked_groups.iter().map(ToString::to_string).collect();
            println!(
                "  {}  {} containers  linked [{}]",
                sg.primary,
                sg.members.len(),
                linked.join(", ")
            );
        }
    }

    Ok(())
}

fn cmd_validate(config: ShiplinkConfig, dir: &Path, scenario_path: &Path) -> Result<()> {
    let scenario = Scenario::load(scenario_path)?;
    let world = scenario.world()?;
    let (net, report) = storage::load(dir, config, &world)
        .with_context(|| format!("failed to load network from {}", dir.display()))?;

    println!("Groups checked: {}", report.groups_checked);
    println!("Nodes dropped: {}", report.nodes_dropped);
    println!("Groups split: {}", report.groups_split);
    println!("Containers dropped: {}", report.containers_dropped);
    println!("Links dropped: {}", report.links_dropped);
    println!(
        "\n{} groups, {} storage groups after validation",
        net.group_ids().len(),
        net.storage_groups().count()
    );
    Ok(())
}
