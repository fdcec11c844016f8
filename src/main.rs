use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessera::cli::{Cli, Commands, ConfigAction};
use tessera::config::Config;
use tessera::corpus::{ChunkStore, Corpus};
use tessera::embedding::{BatchProcessor, EmbeddingProvider, FastEmbedProvider};
use tessera::error::{Result, TesseraError};
use tessera::rerank::{FastEmbedReranker, KeywordBooster, ModelKind, ModelRegistry, RerankerEnsemble};
use tessera::retrieval::{DenseSource, LateInteractionSource, SparseSource};
use tessera::search::{SearchPipeline, SearchRequest, SearchResponse};
use tessera::strategy::{Overrides, Strategy, StrategyController};

/// Arguments of the `search` subcommand
struct SearchArgs {
    query: String,
    corpus: PathBuf,
    top_k: Option<usize>,
    strategy: Option<String>,
    overrides: Overrides,
    json: bool,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Handle commands
    match cli.command {
        Commands::Search {
            query,
            corpus,
            top_k,
            strategy,
            enable_source,
            disable_source,
            enable_model,
            disable_model,
            json,
        } => {
            let args = SearchArgs {
                query,
                corpus,
                top_k,
                strategy,
                overrides: build_overrides(enable_source, disable_source, enable_model, disable_model),
                json,
            };
            cmd_search(cli.config, args)?;
        }
        Commands::Strategies => {
            cmd_strategies(cli.config)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "tessera=debug" } else { "tessera=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn build_overrides(
    enable_source: Vec<String>,
    disable_source: Vec<String>,
    enable_model: Vec<String>,
    disable_model: Vec<String>,
) -> Overrides {
    let mut overrides = Overrides::default();
    overrides.sources.extend(enable_source.into_iter().map(|s| (s, true)));
    overrides.sources.extend(disable_source.into_iter().map(|s| (s, false)));
    overrides.models.extend(enable_model.into_iter().map(|m| (m, true)));
    overrides.models.extend(disable_model.into_iter().map(|m| (m, false)));
    overrides
}

fn cmd_search(config_path: Option<PathBuf>, args: SearchArgs) -> Result<()> {
    let config = Config::load_or_default(config_path.as_deref())?;
    let controller = StrategyController::from_config(&config)?;

    // Resolve before loading anything so configuration errors surface immediately
    let strategy_name = args
        .strategy
        .clone()
        .unwrap_or_else(|| controller.default_name().to_string());
    let strategy = controller.resolve(&strategy_name)?.with_overrides(&args.overrides)?;

    let corpus = Corpus::load_jsonl(&args.corpus)?;
    if corpus.is_empty() {
        tracing::warn!("Corpus {} has no chunks", args.corpus.display());
    }

    let provider: Arc<dyn EmbeddingProvider> =
        Arc::new(FastEmbedProvider::new(&config.embedding.model).map_err(anyhow::Error::from)?);

    let processor = BatchProcessor::new(
        Arc::clone(&provider),
        config.embedding.batch_size,
        config.indexing.clone(),
        config.sparse.clone(),
        config.late_interaction.clone(),
    );
    let snapshot = processor.process(&corpus)?;

    let registry = load_models(&config, &strategy);

    let pipeline = SearchPipeline::new(
        Arc::new(corpus),
        controller,
        RerankerEnsemble::new(registry),
        config.search.clone(),
    )
    .with_source(Arc::new(DenseSource::new(Arc::clone(&provider), snapshot.vectors)))
    .with_source(Arc::new(SparseSource::new(snapshot.lexical)))
    .with_source(Arc::new(LateInteractionSource::new(
        Arc::clone(&provider),
        snapshot.tokens,
        config.late_interaction.aggregation,
    )));

    let request = SearchRequest::new(
        args.query,
        args.top_k.unwrap_or(config.search.default_top_k),
    )
    .with_strategy(strategy_name)
    .with_overrides(args.overrides);

    let rt = tokio::runtime::Runtime::new().map_err(|e| TesseraError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })?;
    let response = rt.block_on(pipeline.search(&request))?;

    if args.json {
        let json = serde_json::to_string_pretty(&response).map_err(|e| TesseraError::Json {
            source: e,
            context: "Failed to serialize search response".to_string(),
        })?;
        println!("{}", json);
    } else {
        print_response(&response);
    }

    Ok(())
}

/// Load only the rerankers the strategy enables; failures leave the slot empty
fn load_models(config: &Config, strategy: &Strategy) -> ModelRegistry {
    let mut registry = ModelRegistry::new();

    for &kind in strategy.models.keys() {
        let checkpoint = match kind {
            ModelKind::KeywordBooster => {
                let booster = &config.keyword_booster;
                registry = registry.with_model(Arc::new(KeywordBooster::new(
                    &booster.terms,
                    booster.phrase_boost,
                    booster.overlap_weight,
                )));
                continue;
            }
            ModelKind::Lightweight => &config.rerankers.lightweight,
            ModelKind::CrossEncoder => &config.rerankers.cross_encoder,
            ModelKind::HighCapacity => &config.rerankers.high_capacity,
        };

        match FastEmbedReranker::new(kind, checkpoint) {
            Ok(model) => registry = registry.with_model(Arc::new(model)),
            Err(e) => tracing::warn!("Could not load {} reranker: {}", kind, e),
        }
    }

    registry
}

fn print_response(response: &SearchResponse) {
    println!(
        "Strategy: {}  |  {} results  |  {:.1}ms (candidates {:.1}, fusion {:.1}, rerank {:.1})",
        response.strategy_used,
        response.results.len(),
        response.latency.total_ms,
        response.latency.candidates_ms,
        response.latency.fusion_ms,
        response.latency.rerank_ms,
    );

    if response.all_sources_failed {
        println!("✗ Every candidate source failed");
    }
    if response.is_degraded() {
        println!("⚠ Degraded: {}", response.degraded_components.join(", "));
    }
    println!();

    for hit in &response.results {
        println!("{:>2}. [{:.4}] {} ({})", hit.rank, hit.score, hit.chunk_id, hit.document_id);

        let sources: Vec<String> = hit
            .per_source_ranks
            .iter()
            .map(|(source, rank)| format!("{}#{}", source, rank))
            .collect();
        let models: Vec<String> = hit
            .per_model_scores
            .iter()
            .map(|(model, score)| format!("{}={:.3}", model, score))
            .collect();
        println!("    sources: {}  models: {}", sources.join(" "), models.join(" "));

        let preview: String = hit.text.chars().take(160).collect();
        println!("    {}", preview.replace('\n', " "));
    }
}

fn cmd_strategies(config_path: Option<PathBuf>) -> Result<()> {
    let config = Config::load_or_default(config_path.as_deref())?;
    let controller = StrategyController::from_config(&config)?;

    for strategy in controller.strategies() {
        let marker = if strategy.name == controller.default_name() { "*" } else { " " };
        println!("{} {:<10} {}", marker, strategy.name, strategy.description);

        let sources: Vec<String> = strategy
            .sources
            .iter()
            .map(|(kind, weight)| format!("{}={:.2}", kind, weight))
            .collect();
        let models: Vec<String> = strategy
            .models
            .iter()
            .map(|(kind, weight)| format!("{}={:.2}", kind, weight))
            .collect();

        println!("    sources: {}", sources.join(", "));
        println!("    models:  {}", models.join(", "));
        println!(
            "    M={}  source timeout={}ms  model timeout={}ms",
            strategy.candidate_multiplier,
            strategy.timeouts.source.as_millis(),
            strategy.timeouts.model.as_millis()
        );
    }

    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = Config::load_or_default(config_path.as_deref())?;
            let rendered = toml::to_string_pretty(&config)?;
            println!("{}", rendered);
        }
        ConfigAction::Validate { file } => {
            let path = resolve_path(file.or(config_path))?;
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
            println!("  Strategies: {}", StrategyController::from_config(&config)?.names().join(", "));
        }
        ConfigAction::Init { force } => {
            let path = resolve_path(config_path)?;
            init_config(&path, force)?;
        }
    }

    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!("Configuration file already exists at: {}", path.display());
        println!("Use --force to overwrite");
        return Ok(());
    }

    Config::default().save(path)?;
    println!("✓ Configuration initialized at: {}", path.display());
    Ok(())
}

fn resolve_path(path: Option<PathBuf>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path),
        None => Config::default_path(),
    }
}
