use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use switchyard_core::config::AppConfig;
use switchyard_core::types::{EntityBag, StepStatus, UserId};

use switchyard_agent::{Orchestrator, PlanBuilder};
use switchyard_memory::{
    CachedEmbedder, EventFilters, EventRecord, FileFilters, FileRecord, HttpEmbeddingProvider,
    HybridRetriever, Indexer, MessageFilters, MessageRecord, ResourceFilters, SqliteCorpus,
};
use switchyard_services::ServiceSet;

#[derive(Parser)]
#[command(
    name = "switchyard",
    version,
    about = "Plan and run multi-service requests over mail, calendar, and storage"
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "switchyard.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an execution plan and print it as JSON
    Plan {
        /// Comma-separated step names, in order
        #[arg(long, value_delimiter = ',', required = true)]
        steps: Vec<String>,
        /// Entity bag as a JSON object
        #[arg(long)]
        entities: Option<String>,
    },
    /// Build and execute a plan for a user, printing step outcomes
    Run {
        #[arg(long)]
        user: String,
        /// Service access token
        #[arg(long, env = "SWITCHYARD_ACCESS_TOKEN", hide_env_values = true)]
        token: String,
        #[arg(long, value_delimiter = ',', required = true)]
        steps: Vec<String>,
        #[arg(long)]
        entities: Option<String>,
    },
    /// Query the cached corpus with hybrid retrieval
    Search {
        #[arg(long)]
        user: String,
        #[arg(long, value_enum)]
        kind: Kind,
        /// Filters for the chosen kind as a JSON object
        #[arg(long)]
        filters: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        /// Query text
        #[arg(trailing_var_arg = true)]
        query: Vec<String>,
    },
    /// Embed records from a JSON file into the cached corpus
    Ingest {
        #[arg(long)]
        user: String,
        #[arg(long, value_enum)]
        kind: Kind,
        /// JSON array of records
        file: PathBuf,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Messages,
    Events,
    Files,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("switchyard=info,warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "switchyard", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Plan { steps, entities } => {
            let entities = parse_entities(entities.as_deref())?;
            let plan = PlanBuilder::from_config(&config.planner).build(&steps, &entities)?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Commands::Run {
            user,
            token,
            steps,
            entities,
        } => {
            let user = parse_user(&user)?;
            let entities = parse_entities(entities.as_deref())?;
            let plan = PlanBuilder::from_config(&config.planner).build(&steps, &entities)?;

            let (_, retriever) = open_retrieval(&config)?;
            let services = ServiceSet::for_user(&config, user, &token, Arc::new(retriever))?;
            let mut orchestrator = Orchestrator::from_config(&config.orchestrator);
            for executor in services.executors() {
                orchestrator.register(executor);
            }

            let outcomes = orchestrator.execute(&plan).await;
            let failed = outcomes
                .iter()
                .filter(|o| o.status == StepStatus::Failed)
                .count();
            if failed > 0 {
                warn!(failed, total = outcomes.len(), "Some steps failed");
            }
            println!("{}", serde_json::to_string_pretty(&outcomes)?);
        }
        Commands::Search {
            user,
            kind,
            filters,
            limit,
            query,
        } => {
            let user = parse_user(&user)?;
            let filters = parse_filters(kind, filters.as_deref())?;
            let limit = limit.unwrap_or(match kind {
                Kind::Events => config.retrieval.event_limit,
                _ => config.retrieval.default_limit,
            });

            let (_, retriever) = open_retrieval(&config)?;
            let results = retriever
                .search(&user, &query.join(" "), &filters, limit)
                .await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Commands::Ingest { user, kind, file } => {
            let user = parse_user(&user)?;
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;

            let (store, embedder) = open_corpus(&config)?;
            let indexer = Indexer::new(store, embedder);
            let count = match kind {
                Kind::Messages => {
                    let records: Vec<MessageRecord> = serde_json::from_str(&content)?;
                    indexer.index_messages(&user, &records).await?
                }
                Kind::Events => {
                    let records: Vec<EventRecord> = serde_json::from_str(&content)?;
                    indexer.index_events(&user, &records).await?
                }
                Kind::Files => {
                    let records: Vec<FileRecord> = serde_json::from_str(&content)?;
                    indexer.index_files(&user, &records).await?
                }
            };
            println!("Indexed {} records", count);
        }
        Commands::Completions { .. } => unreachable!("handled before config load"),
    }

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        info!(path = %path.display(), "Loading config");
        Ok(AppConfig::load(path)?)
    } else {
        info!(path = %path.display(), "No config file found, using defaults");
        Ok(AppConfig::default())
    }
}

fn parse_user(raw: &str) -> anyhow::Result<UserId> {
    UserId::parse(raw).ok_or_else(|| anyhow::anyhow!("invalid user id: {}", raw))
}

fn parse_entities(raw: Option<&str>) -> anyhow::Result<EntityBag> {
    match raw {
        None => Ok(EntityBag::new()),
        Some(json) => serde_json::from_str(json).context("--entities must be a JSON object"),
    }
}

fn parse_filters(kind: Kind, raw: Option<&str>) -> anyhow::Result<ResourceFilters> {
    let raw = raw.unwrap_or("{}");
    let filters = match kind {
        Kind::Messages => ResourceFilters::Messages(serde_json::from_str::<MessageFilters>(raw)?),
        Kind::Events => ResourceFilters::Events(serde_json::from_str::<EventFilters>(raw)?),
        Kind::Files => ResourceFilters::Files(serde_json::from_str::<FileFilters>(raw)?),
    };
    Ok(filters)
}

fn open_corpus(config: &AppConfig) -> anyhow::Result<(Arc<SqliteCorpus>, Arc<CachedEmbedder>)> {
    let embedding = config
        .embedding
        .as_ref()
        .context("an [embedding] section is required for retrieval")?;
    let store = Arc::new(SqliteCorpus::open(&config.database_path())?);
    let embedder = Arc::new(CachedEmbedder::new(
        Arc::new(HttpEmbeddingProvider::from_config(embedding)),
        Duration::from_secs(embedding.cache_ttl_secs),
    ));
    Ok((store, embedder))
}

fn open_retrieval(config: &AppConfig) -> anyhow::Result<(Arc<SqliteCorpus>, HybridRetriever)> {
    let (store, embedder) = open_corpus(config)?;
    let retriever = HybridRetriever::new(store.clone(), embedder)
        .with_attendee_match(config.retrieval.attendee_match);
    Ok((store, retriever))
}
