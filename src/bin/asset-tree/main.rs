//! asset-tree CLI tool
//!
//! Command-line interface for building and editing asset trees with asset-tree-core.
//!
//! ## Commands
//!
//! - `parse <csv>`: Load a tree CSV and print the rows it resolves to
//! - `build <name> <csv>`: Create a tree from a CSV, or merge the CSV into an existing tree
//! - `insert`, `move`, `remove`: Modify an existing tree
//! - `visualize <tree>`: Print a tree
//! - `push <tree>`: Push a tree
//! - `lookup <csv>`: Export a grouped key/value table as lookup-string calculations
//! - `templates`: List templates, or apply one to a metadata CSV
//!
//! The remote server is an in-memory store persisted to the `remote_snapshot` file named in
//! the configuration (or `--snapshot`). Without one, changes last for a single command.

use asset_tree_core::{
    codec::{CsvLoader, DuplicateResolver, DuplicateStrategy, LookupTableBuilder, RawTable},
    commands::{Op, OpResult, TreeOperation},
    config::{set_provider, AssetTreeConfig, ConfigProvider, TomlConfigProvider},
    manager::TreeManager,
    remote::MemoryRemote,
    status::Status,
    templates::TEMPLATES,
    tree::Matcher,
};
use clap::{Parser, Subcommand};
use std::{collections::BTreeMap, fs, io, path::PathBuf, sync::Arc};

#[derive(Parser)]
#[command(name = "asset-tree")]
#[command(author, version, about = "A tool for building and pushing asset trees", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "asset_tree.toml")]
    config: PathBuf,

    /// Remote snapshot file, overriding the configured one
    #[arg(long)]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a tree CSV and print the rows it resolves to
    Parse {
        csv: PathBuf,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Create a tree from a CSV, or merge the CSV into the existing tree of that name
    Build { name: String, csv: PathBuf },

    /// Insert the items of a CSV beneath every asset the parent matcher selects
    Insert {
        tree: String,
        csv: PathBuf,

        /// `@root`, `id:<id>`, `depth:<n>`, a path containing `>>`, or a name with `*`/`?`
        #[arg(long, default_value = "@root")]
        parent: Matcher,

        /// Leave the change local instead of pushing it
        #[arg(long)]
        no_push: bool,
    },

    /// Move the item a matcher selects beneath another asset
    Move {
        tree: String,
        source: Matcher,
        destination: Matcher,

        #[arg(long)]
        no_push: bool,
    },

    /// Remove every item a matcher selects, with its descendants
    Remove {
        tree: String,
        matcher: Matcher,

        #[arg(long)]
        no_push: bool,
    },

    /// Print a tree
    Visualize { tree: String },

    /// Push a tree
    Push { tree: String },

    /// Export a grouped key/value table as lookup-string calculations
    Lookup {
        csv: PathBuf,

        #[arg(long)]
        group: String,

        #[arg(long)]
        key: String,

        #[arg(long)]
        value: String,

        /// `<group>=<tree path>` placement for a group's lookup; may be repeated
        #[arg(long = "parent-path")]
        parent_paths: Vec<String>,

        /// How to resolve rows sharing a group and key: keep-first, keep-last or remove-all
        #[arg(long = "on-duplicates")]
        on_duplicates: Option<DuplicateStrategy>,

        /// CSV row number (the header is row 1) to keep among duplicates; may be repeated
        #[arg(long = "keep-row", conflicts_with = "on_duplicates")]
        keep_rows: Vec<usize>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List templates, or apply one to a metadata CSV
    Templates {
        #[command(subcommand)]
        action: Option<TemplateCommands>,
    },
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// List the registered templates
    List,

    /// Apply a template to a metadata CSV (`Name`, `Build Path`, `Build Asset` columns)
    Apply {
        tree: String,
        template: String,
        metadata: PathBuf,
    },
}

fn open_remote(config: &AssetTreeConfig) -> Result<MemoryRemote, Box<dyn std::error::Error>> {
    match config.remote_snapshot.as_ref() {
        Some(snapshot) => Ok(MemoryRemote::open(snapshot)?),
        None => {
            tracing::warn!("No remote snapshot configured; changes will not be kept");
            Ok(MemoryRemote::new())
        }
    }
}

fn print_result(result: &OpResult) -> Result<(), Box<dyn std::error::Error>> {
    match result {
        OpResult::Tree(report) => {
            println!("{}", report.message);
            print!("{}", report.status);
            if let Some(push) = report.push.as_ref() {
                println!("{}", serde_json::to_string_pretty(push)?);
            }
            if !report.is_ok() {
                std::process::exit(1);
            }
        }
        OpResult::Templates(names) => {
            for name in names {
                println!("{name}");
            }
        }
        OpResult::Visualization(text) => println!("{text}"),
        OpResult::Push(outcome) => {
            println!("{}", serde_json::to_string_pretty(outcome)?);
            if outcome.is_failed() {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let provider = Arc::new(TomlConfigProvider::new(cli.config.clone()));
    let mut config = provider.get_config()?;
    set_provider(provider)?;
    if let Some(snapshot) = cli.snapshot {
        config.remote_snapshot = Some(snapshot);
    }
    if let Some(dir) = config.template_dir.as_ref() {
        let names = TEMPLATES.register_dir(dir)?;
        tracing::debug!("Registered templates {:?} from {:?}", names, dir);
    }

    let push = |no_push: bool| if no_push { Some(false) } else { None };
    let op = match cli.command {
        Commands::Parse { csv, verbose } => {
            let remote = open_remote(&config)?;
            let table = RawTable::from_path(&csv)?;
            let mut status = Status::new(config.error_mode);
            let nodes = CsvLoader::new(&remote)
                .with_workbook(config.workbook.clone())
                .load(&table, &mut status)?;
            for node in nodes.iter() {
                match (verbose, node.item_type) {
                    (true, Some(t)) => println!("{} [{t}]", node.full_path()),
                    _ => println!("{}", node.full_path()),
                }
            }
            print!("{status}");
            return Ok(());
        }
        Commands::Lookup {
            csv,
            group,
            key,
            value,
            parent_paths,
            on_duplicates,
            keep_rows,
            output,
        } => {
            let table = RawTable::from_path(&csv)?;
            let resolver = DuplicateResolver::new(group.as_str(), key.as_str());
            let strategy = match on_duplicates {
                Some(strategy) => Some(strategy),
                None if !keep_rows.is_empty() => Some(DuplicateStrategy::UserSpecific(
                    keep_rows.iter().filter(|&&r| r >= 2).map(|r| r - 2).collect(),
                )),
                None => None,
            };
            let table = match strategy {
                Some(strategy) => resolver.resolve(&table, &strategy)?,
                None => {
                    for duplicate in resolver.find(&table)? {
                        eprintln!("Warning: duplicate {duplicate}");
                    }
                    table
                }
            };
            let lookups = LookupTableBuilder::new(group, key, value).build(&table)?;
            let mut placements = BTreeMap::new();
            for entry in parent_paths {
                let Some((group, path)) = entry.split_once('=') else {
                    eprintln!("Error: --parent-path must look like '<group>=<tree path>'");
                    std::process::exit(2);
                };
                placements.insert(group.trim().to_string(), path.trim().to_string());
            }
            let rows = LookupTableBuilder::to_rows(&lookups, &placements)?;
            match output {
                Some(path) => LookupTableBuilder::write_csv(&rows, fs::File::create(path)?)?,
                None => LookupTableBuilder::write_csv(&rows, io::stdout())?,
            }
            return Ok(());
        }
        Commands::Build { name, csv } => Op::BuildTree {
            name,
            csv: fs::read_to_string(csv)?,
        },
        Commands::Insert {
            tree,
            csv,
            parent,
            no_push,
        } => Op::ModifyTree {
            operation: TreeOperation::Insert {
                tree,
                csv: fs::read_to_string(csv)?,
                parent,
            },
            push: push(no_push),
        },
        Commands::Move {
            tree,
            source,
            destination,
            no_push,
        } => Op::ModifyTree {
            operation: TreeOperation::Move {
                tree,
                source,
                destination,
            },
            push: push(no_push),
        },
        Commands::Remove {
            tree,
            matcher,
            no_push,
        } => Op::ModifyTree {
            operation: TreeOperation::Remove { tree, matcher },
            push: push(no_push),
        },
        Commands::Visualize { tree } => Op::Visualize { tree },
        Commands::Push { tree } => Op::Push { tree },
        Commands::Templates { action } => match action.unwrap_or(TemplateCommands::List) {
            TemplateCommands::List => Op::ListTemplates,
            TemplateCommands::Apply {
                tree,
                template,
                metadata,
            } => Op::ApplyTemplate {
                tree,
                template,
                metadata_csv: fs::read_to_string(metadata)?,
            },
        },
    };

    let remote = open_remote(&config)?;
    let mut manager = TreeManager::new(remote, config);
    let result = manager.execute(op)?;
    print_result(&result)
}
