//! kg-agent CLI: ask questions of a knowledge graph.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use kg_agent::agent::llm;
use kg_agent::agent::{AgentOptions, Executor, KgAgent};
use kg_agent::config::{AgentConfig, Provider};
use kg_agent::error::KgError;
use kg_agent::graph::GraphStore;
use kg_agent::paths::AgentPaths;

#[derive(Parser)]
#[command(name = "kg-agent", version, about = "Natural language questions over an RDF knowledge graph")]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/kg-agent/config.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ontology file (Turtle or N-Triples).
    #[arg(long, global = true)]
    ontology: Option<PathBuf>,

    /// Data file loaded on top of the ontology.
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Single graph file holding both schema and data.
    #[arg(long, global = true, conflicts_with = "ontology")]
    graph: Option<PathBuf>,

    /// Directory for post-augmentation snapshots.
    #[arg(long, global = true)]
    snapshot_dir: Option<PathBuf>,

    /// Language model provider (gemini or ollama).
    #[arg(long, global = true)]
    provider: Option<Provider>,

    /// Language model name.
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question through the full pipeline.
    Ask {
        /// The question.
        question: String,

        /// Print the full response as JSON.
        #[arg(long)]
        json: bool,

        /// Print pipeline counters after answering.
        #[arg(long)]
        stats: bool,

        /// Skip augmentation on empty results.
        #[arg(long)]
        no_augment: bool,
    },

    /// Show the SPARQL query generated for a question, without running it.
    Translate {
        /// The question.
        question: String,
    },

    /// Run a SPARQL query directly and print normalized rows.
    Sparql {
        /// SPARQL SELECT or ASK query; known prefixes may be left undeclared.
        query: String,
    },

    /// Print the schema as it is presented to the model.
    Schema,

    /// Write the current graph as N-Triples to stdout.
    Dump,

    /// Create the XDG directories and write the effective config as the global config.
    Init {
        /// Replace an existing global config file.
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let paths = match AgentPaths::resolve() {
        Ok(paths) => Some(paths),
        Err(e) => {
            tracing::warn!(error = %e, "no XDG directories, global config and default snapshots disabled");
            None
        }
    };
    let mut config = AgentConfig::resolve(cli.config.as_deref(), paths.as_ref())?;
    apply_cli_overrides(&mut config, &cli);

    match cli.command {
        Commands::Init { force } => {
            let paths = AgentPaths::resolve().map_err(KgError::from)?;
            let (path, written) = config.install(&paths, force)?;
            if written {
                println!("Wrote {}", path.display());
            } else {
                println!("{} already exists (use --force to replace it)", path.display());
            }
            println!("Snapshots: {}", paths.snapshot_dir().display());
        }

        Commands::Ask {
            question,
            json,
            stats,
            no_augment,
        } => {
            if no_augment {
                config.augmentation.enabled = false;
            }
            let agent = build_agent(&config, paths.as_ref())?;
            let response = agent.answer(&question);

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&response).into_diagnostic()?
                );
            } else {
                if let Some(query) = &response.sparql_query {
                    println!("SPARQL:\n{query}\n");
                }
                if let Some(facts) = &response.generated_facts {
                    let verdict = match response.augmentation_applied {
                        Some(true) => "merged",
                        _ => "rejected",
                    };
                    println!("Generated facts ({verdict}):\n{facts}\n");
                }
                if let Some(error) = &response.query_error {
                    println!("Query error: {error}\n");
                }
                println!("{}", response.agent_response);
            }

            if stats {
                let snapshot = agent.stats();
                eprintln!(
                    "{}",
                    serde_json::to_string_pretty(&snapshot).into_diagnostic()?
                );
            }
        }

        Commands::Translate { question } => {
            let agent = build_agent(&config, paths.as_ref())?;
            match agent.translate(&question) {
                Some(query) if !query.is_blank() => {
                    println!("{}", query.text);
                    if let Some(scope) = query.scope {
                        eprintln!("scope: {scope}");
                    }
                }
                Some(_) => miette::bail!("the model declined to form a query"),
                None => miette::bail!("the model returned no usable query"),
            }
        }

        Commands::Sparql { query } => {
            let store = config.graph.open()?;
            let results = Executor::new().try_execute(&query, &store)?;
            if results.is_empty() {
                println!("No results.");
            } else {
                for (i, row) in results.rows().iter().enumerate() {
                    let cells: Vec<String> =
                        row.iter().map(|(var, value)| format!("{var}={value}")).collect();
                    println!("  {}. {}", i + 1, cells.join("  "));
                }
                println!("{} row(s)", results.len());
            }
        }

        Commands::Schema => {
            let store = config.graph.open()?;
            let description = store.schema().describe(store.prefixes());
            print!("{}", description.prologue);
            println!("\nClasses ({}):", description.classes.len());
            for class in &description.classes {
                println!("  {class}");
            }
            println!("\nProperties ({}):", description.properties.len());
            for property in &description.properties {
                println!("  {property}");
            }
        }

        Commands::Dump => {
            let store = config.graph.open()?;
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            let written = store.write_ntriples(&mut out).into_diagnostic()?;
            tracing::info!(triples = written, "graph dumped");
        }
    }

    Ok(())
}

fn apply_cli_overrides(config: &mut AgentConfig, cli: &Cli) {
    if let Some(path) = &cli.ontology {
        config.graph.ontology = Some(path.clone());
    }
    if let Some(path) = &cli.data {
        config.graph.data = Some(path.clone());
    }
    if let Some(path) = &cli.graph {
        config.graph.ontology = None;
        config.graph.combined = Some(path.clone());
    }
    if let Some(dir) = &cli.snapshot_dir {
        config.graph.snapshot_dir = Some(dir.clone());
    }
    if let Some(provider) = cli.provider {
        config.llm.set_provider(provider);
    }
    if let Some(model) = &cli.model {
        config.llm.model = model.clone();
    }
}

fn build_agent(config: &AgentConfig, paths: Option<&AgentPaths>) -> Result<KgAgent> {
    let store: GraphStore = config.graph.open()?;
    let generator = llm::from_config(&config.llm)?;
    Ok(KgAgent::new(
        Arc::new(store),
        generator,
        AgentOptions::from_config(config, paths),
    ))
}
