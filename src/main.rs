use anyhow::{bail, Result};
use clap::Parser;
use petgraph::Direction;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use typegraph::core::{AnalyzerOptions, LinkType, ScanMode, SolutionAnalyzer, TypeGraph};
use typegraph::formatters::{artifact_path, JsonGraphFormatter};
use typegraph::parsers::TypeKind;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "typegraph",
    version = "0.1.0",
    author = "typegraph developers",
    about = "Type-level dependency graphs for C# solutions"
)]
struct Cli {
    /// Solution (.sln), project (.csproj) or source directory to analyze
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Which links to discover
    #[arg(short, long, value_enum, default_value_t = ScanMode::Full)]
    mode: ScanMode,

    /// Comma-separated list of type kinds to register as nodes
    #[arg(
        short,
        long,
        value_name = "KINDS",
        value_enum,
        value_delimiter = ',',
        default_value = "class,record"
    )]
    kinds: Vec<TypeKind>,

    /// Directory the artifact is written to (defaults to the input's directory)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Write single-line JSON instead of indented JSON
    #[arg(long)]
    compact: bool,

    /// Parse every source unit even if a cached result exists
    #[arg(long)]
    no_cache: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    run(cli)
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let Cli {
        input,
        mode,
        kinds,
        output_dir,
        compact,
        no_cache,
        verbose: _,
    } = cli;

    if !input.exists() {
        bail!("Input not found: {}", input.display());
    }

    let start_time = Instant::now();
    let kind_names: Vec<&str> = kinds.iter().map(|kind| kind.as_str()).collect();

    println!("TYPEGRAPH - Type Dependency Analysis");
    println!("Input: {}", input.display());
    println!("Mode: {}", mode.as_str());
    println!("Kinds: {:?}", kind_names);

    let options = AnalyzerOptions::new()
        .with_mode(mode)
        .with_kinds(kinds)
        .with_cache(!no_cache);
    let analyzer = SolutionAnalyzer::new(options)?;
    let analysis = analyzer.analyze(&input)?;
    let graph = &analysis.graph;

    println!(
        "Analysis completed in {:.2}s",
        start_time.elapsed().as_secs_f64()
    );

    let out_dir = match output_dir {
        Some(dir) => dir,
        None => input
            .canonicalize()?
            .parent()
            .map(PathBuf::from)
            .unwrap_or_default(),
    };
    let output = artifact_path(&input, mode, &out_dir);
    JsonGraphFormatter::new()
        .with_compact(compact)
        .format_to_file(graph, &output)?;

    println!(
        "Projects: {} scanned, {} skipped",
        analysis.stats.modules_scanned, analysis.stats.modules_skipped
    );
    println!("Nodes: {}", graph.node_count());
    println!("Reference links: {}", graph.count_of(LinkType::Reference));
    println!("Inheritance links: {}", graph.count_of(LinkType::Inheritance));
    if let Some((name, dependents)) = most_depended_upon(graph) {
        println!("Most depended-upon: {name} ({dependents} incoming)");
    }
    println!("Generated {}", output.display());
    println!(
        "Total execution time: {:.2}s",
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}

fn most_depended_upon(graph: &TypeGraph) -> Option<(String, usize)> {
    let petgraph = graph.to_petgraph();
    petgraph
        .node_indices()
        .map(|idx| {
            let incoming = petgraph.edges_directed(idx, Direction::Incoming).count();
            (idx, incoming)
        })
        .filter(|&(_, incoming)| incoming > 0)
        .max_by_key(|&(_, incoming)| incoming)
        .map(|(idx, incoming)| (petgraph[idx].name.clone(), incoming))
}
