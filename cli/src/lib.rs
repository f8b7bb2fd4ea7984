use anyhow::{anyhow, Error, Result};
use clap::{Parser, Subcommand};
use log::info;
use oxigraph::model::{BlankNode, NamedNode, NamedOrBlankNode, Quad, Term};
use quince::codec::format_quad;
use quince::consts::CONFIG_FILE;
use quince::{DynamicFileStore, StoreConfig, StoreDiff, Strictness};
use std::env::current_dir;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Debug, Parser)]
#[command(name = "quince")]
#[command(about = "File-system-backed RDF quad store")]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Store directory, defaults to the current directory
    #[clap(long, short, global = true)]
    store: Option<PathBuf>,
    /// Verbose mode - sets the RUST_LOG level to info, defaults to warning level
    #[clap(long, short, action, default_value = "false", global = true)]
    verbose: bool,
    /// Debug mode - sets the RUST_LOG level to debug, defaults to warning level
    #[clap(long, action, default_value = "false", global = true)]
    debug: bool,
    /// Number of shards held in memory before the cache is flushed
    #[clap(long, global = true)]
    cache_threshold: Option<usize>,
    /// Number of lines a shard may hold before it is split
    #[clap(long, global = true)]
    split_threshold: Option<usize>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a new store
    Init {
        /// Overwrite the store configuration if it already exists
        #[clap(long, default_value = "false")]
        overwrite: bool,
    },
    /// Prints the version of the quince binary
    Version,
    /// Import an RDF file into the store
    Import {
        /// File to import; the format is guessed from the extension
        file: PathBuf,
        /// Graph for statements that do not name one
        #[clap(long, short)]
        graph: Option<String>,
        /// Skip unparsable statements instead of failing
        #[clap(long, action, default_value = "false")]
        lenient: bool,
    },
    /// Print every quad with the given subject
    Subject {
        /// IRI, or blank node written as _:id
        node: String,
    },
    /// Print every quad with the given object
    Object {
        /// IRI, or blank node written as _:id
        node: String,
    },
    /// Remove every quad in a graph
    DropGraph {
        /// Graph IRI
        graph: String,
    },
    /// Replay a unified diff of a store directory
    ApplyDiff {
        /// Output of `git diff` run in another copy of the store
        file: PathBuf,
        /// Print the changes as a SPARQL update instead of applying them
        #[clap(long, action, default_value = "false")]
        sparql: bool,
    },
    /// Count subjects, objects and quads
    Stats {
        /// Output JSON instead of text
        #[clap(long, action, default_value = "false")]
        json: bool,
    },
}

impl ToString for Commands {
    fn to_string(&self) -> String {
        match self {
            Commands::Init { .. } => "Init".to_string(),
            Commands::Version => "Version".to_string(),
            Commands::Import { .. } => "Import".to_string(),
            Commands::Subject { .. } => "Subject".to_string(),
            Commands::Object { .. } => "Object".to_string(),
            Commands::DropGraph { .. } => "DropGraph".to_string(),
            Commands::ApplyDiff { .. } => "ApplyDiff".to_string(),
            Commands::Stats { .. } => "Stats".to_string(),
        }
    }
}

fn parse_resource(node: &str) -> Result<NamedOrBlankNode> {
    if let Some(id) = node.strip_prefix("_:") {
        return Ok(BlankNode::new(id)?.into());
    }
    let iri = node.trim_start_matches('<').trim_end_matches('>');
    Ok(NamedNode::new(iri)
        .map_err(|e| anyhow!("Invalid IRI {}: {}", node, e))?
        .into())
}

fn parse_graph(graph: &str) -> Result<NamedNode> {
    let iri = graph.trim_start_matches('<').trim_end_matches('>');
    NamedNode::new(iri).map_err(|e| anyhow!("Invalid graph IRI {}: {}", graph, e))
}

fn print_quads(quads: &[Quad]) -> Result<()> {
    for quad in quads {
        println!("{}", format_quad(quad.as_ref())?);
    }
    Ok(())
}

fn store_config(cmd: &Cli) -> Result<StoreConfig> {
    let root = match &cmd.store {
        Some(dir) => dir.clone(),
        None => current_dir()?,
    };
    let saved = if root.is_dir() {
        StoreConfig::load_or_default(&root)?
    } else {
        StoreConfig::new(root.clone())
    };
    let config = StoreConfig::builder()
        .root(root)
        .cache_threshold(cmd.cache_threshold.unwrap_or(saved.cache_threshold))
        .split_threshold(cmd.split_threshold.unwrap_or(saved.split_threshold))
        .build()?;
    Ok(config)
}

pub fn run() -> Result<()> {
    let cmd = Cli::parse();
    execute(cmd)
}

pub fn run_from_args<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cmd = Cli::try_parse_from(args).map_err(Error::from)?;
    execute(cmd)
}

fn execute(cmd: Cli) -> Result<()> {
    // CLI flags for verbosity take precedence. If nothing is set, we default to "warn".
    if cmd.debug {
        std::env::set_var("RUST_LOG", "debug");
    } else if cmd.verbose {
        std::env::set_var("RUST_LOG", "info");
    } else if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "warn");
    }
    let _ = env_logger::try_init();

    if let Commands::Version = &cmd.command {
        println!("quince {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = store_config(&cmd)?;
    if cmd.verbose || cmd.debug {
        config.print();
    }
    info!("Running command: {}", cmd.command.to_string());

    match cmd.command {
        Commands::Init { overwrite } => {
            if config.config_path().exists() && !overwrite {
                return Err(anyhow!(
                    "A store already exists at {}. Use --overwrite to replace its {}",
                    config.root.display(),
                    CONFIG_FILE
                ));
            }
            let root = config.root.clone();
            DynamicFileStore::init(config)?.close()?;
            println!("Initialized store at {}", root.display());
        }
        Commands::Version => {}
        Commands::Import {
            file,
            graph,
            lenient,
        } => {
            let graph = graph.as_deref().map(parse_graph).transpose()?;
            let mut store = DynamicFileStore::open(config)?;
            let timer = Instant::now();
            let summary = store.import_file(
                &file,
                graph.as_ref().map(NamedNode::as_ref),
                Strictness::from(!lenient),
            )?;
            store.close()?;
            println!(
                "Imported {} statements ({} already present, {} skipped) in {}ms",
                summary.added,
                summary.duplicates,
                summary.skipped,
                timer.elapsed().as_millis()
            );
        }
        Commands::Subject { node } => {
            let resource = parse_resource(&node)?;
            let mut store = DynamicFileStore::open(config)?;
            let term = Term::from(resource);
            print_quads(&store.get_for_subject(term.as_ref())?)?;
        }
        Commands::Object { node } => {
            let resource = parse_resource(&node)?;
            let mut store = DynamicFileStore::open(config)?;
            let term = Term::from(resource);
            print_quads(&store.get_for_object(term.as_ref())?)?;
        }
        Commands::DropGraph { graph } => {
            let graph = parse_graph(&graph)?;
            let mut store = DynamicFileStore::open(config)?;
            let removed = store.drop_graph(graph.as_ref())?;
            store.close()?;
            println!("Removed {} lines from graph {}", removed, graph);
        }
        Commands::ApplyDiff { file, sparql } => {
            let text = std::fs::read_to_string(&file)?;
            let diff = StoreDiff::from_unified_diff(&text)?;
            if sparql {
                print!("{}", diff.as_sparql_update());
                return Ok(());
            }
            let mut store = DynamicFileStore::open(config)?;
            diff.apply(&mut store)?;
            store.close()?;
            println!(
                "Applied diff: {} deleted, {} inserted",
                diff.deleted.len(),
                diff.inserted.len()
            );
        }
        Commands::Stats { json } => {
            let mut store = DynamicFileStore::open(config)?;
            let mut quads = 0;
            let subjects = store.enumerate_subjects(&mut |group: &[Quad]| {
                quads += group.len();
                true
            })?;
            let objects = store.enumerate_objects(&mut |_: &[Quad]| true)?;
            let directories = store.directory_map().len();
            if json {
                let stats = serde_json::json!({
                    "subjects": subjects,
                    "objects": objects,
                    "quads": quads,
                    "directories": directories,
                });
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Subjects: {}", subjects);
                println!("Objects: {}", objects);
                println!("Quads: {}", quads);
                println!("Split directories: {}", directories);
            }
        }
    }
    Ok(())
}
