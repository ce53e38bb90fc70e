mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pattern_expert::config::{ExpertConfig, DEFAULT_CONFIG_FILE};

#[derive(Parser)]
#[command(name = "expert")]
#[command(about = "Domain expert assistant backed by a curated pattern store", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(long, short, global = true, help = "Config file", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[arg(long, short, global = true, help = "Override the configured domain")]
    domain: Option<String>,
    #[arg(long, short, global = true, help = "Debug logging on stderr")]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    // ===== Setup =====
    /// Write a default config and create the domain's data directory
    Init {
        #[arg(long, help = "Overwrite an existing config")]
        force: bool,
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    // ===== Querying =====
    /// Answer a query through routing, aggregation and enrichment
    Ask {
        query: String,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Search patterns directly
    Search {
        query: String,
        #[arg(long, short, help = "Limit results")]
        limit: Option<usize>,
        #[arg(long, help = "Restrict to a category, type or tag")]
        category: Option<String>,
        #[arg(long, help = "Only return exact matches")]
        exact: bool,
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    // ===== Pattern management =====
    /// Add a pattern
    Add {
        #[arg(long, help = "Read the pattern from a JSON file")]
        file: Option<PathBuf>,
        #[arg(long, help = "Pattern name")]
        name: Option<String>,
        #[arg(long, help = "Pattern solution")]
        solution: Option<String>,
        #[arg(long, help = "Explicit pattern id")]
        id: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        problem: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long = "tag", help = "Tag (repeatable)")]
        tags: Vec<String>,
        #[arg(long, help = "Query this pattern was written for")]
        origin_query: Option<String>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Update pattern fields from a JSON object
    Update {
        id: String,
        #[arg(help = r#"Fields to set, e.g. '{"solution": "..."}'"#)]
        fields: String,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Delete a pattern and its embedding
    Delete {
        id: String,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Rate a pattern 1-5
    Feedback {
        id: String,
        #[arg(long, short, help = "Rating from 1 to 5")]
        rating: u8,
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    // ===== Semantic index =====
    /// Build the embedding index
    Index {
        #[arg(long, help = "Show index status only")]
        status: bool,
        #[arg(long, help = "Force rebuild index")]
        rebuild: bool,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Show domain and index status
    Status {
        #[arg(long, help = "JSON output")]
        json: bool,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<ExpertConfig> {
    let mut config = ExpertConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(domain) = &cli.domain {
        config.domain = domain.clone();
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Commands::Init { force, json } = cli.command {
        return commands::init::run(&cli.config, cli.domain.as_deref(), force, json);
    }

    let config = load_config(&cli)?;
    let runtime = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Ask { query, json } => runtime.block_on(commands::ask::run(&config, &query, json)),
        Commands::Search {
            query,
            limit,
            category,
            exact,
            json,
        } => runtime.block_on(commands::search::run(
            &config,
            &query,
            limit,
            category.as_deref(),
            exact,
            json,
        )),
        Commands::Add {
            file,
            name,
            solution,
            id,
            description,
            problem,
            category,
            tags,
            origin_query,
            json,
        } => {
            let input = commands::add::AddInput {
                file,
                name,
                solution,
                id,
                description,
                problem,
                category,
                tags,
                origin_query,
            };
            commands::add::run(&config, input, json)
        }
        Commands::Update { id, fields, json } => commands::update::run(&config, &id, &fields, json),
        Commands::Delete { id, json } => commands::delete::run(&config, &id, json),
        Commands::Feedback { id, rating, json } => {
            commands::feedback::run(&config, &id, rating, json)
        }
        Commands::Index {
            status,
            rebuild,
            json,
        } => runtime.block_on(commands::index::run(&config, status, rebuild, json)),
        Commands::Status { json } => commands::status::run(&config, json),
    }
}
