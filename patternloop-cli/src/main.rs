// patternloop-cli/src/main.rs
// ============================================================================
// Module: PatternLoop CLI Entry Point
// Description: Command dispatcher for the six operational batch commands
//              (crawling, ingestion, and pipeline-contract/state auditing).
// Purpose: Provide a safe, localized CLI for running the PatternLoop
//          pipeline against a SQLite-backed store.
// Dependencies: clap, csv, patternloop-config, patternloop-core,
//               patternloop-rules, patternloop-store-sqlite, serde,
//               serde_json, thiserror, time.
// ============================================================================

//! ## Overview
//! The PatternLoop CLI is a thin batch-command layer: every command opens
//! the configured store (directly, not through the in-memory `RunLedger`),
//! does its work, and exits. All user-facing strings are routed through the
//! i18n catalog to prepare for future localization.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use patternloop_cli::t;
use patternloop_config::PatternLoopConfig;
use patternloop_core::EvidenceEvent;
use patternloop_core::EvidenceSnapshotId;
use patternloop_core::EvidenceStatus;
use patternloop_core::PatternLibraryId;
use patternloop_core::PatternNodeId;
use patternloop_core::RunType;
use patternloop_core::core::DEFAULT_HASH_ALGORITHM;
use patternloop_core::core::hash_bytes;
use patternloop_core::run;
use patternloop_rules::Comparator;
use patternloop_rules::CurationPredicate;
use patternloop_rules::CurationRule;
use patternloop_rules::RequirementError;
use patternloop_rules::RuleAction;
use patternloop_store_sqlite::AnalysisStatus;
use patternloop_store_sqlite::OutlierItem;
use patternloop_store_sqlite::OutlierStatus;
use patternloop_store_sqlite::OutlierTier;
use patternloop_store_sqlite::PatternLibrary;
use patternloop_store_sqlite::PatternLoopStore;
use patternloop_store_sqlite::PatternNode;
use patternloop_store_sqlite::SqliteStoreError;
use patternloop_store_sqlite::TemporalPhase;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(
    name = "patternloop",
    disable_help_subcommand = true,
    disable_version_flag = true,
    arg_required_else_help = true
)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Optional config file path (defaults to `patternloop.toml` or an env override).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands (spec §6).
#[derive(Subcommand, Debug)]
enum Commands {
    /// Crawl a configured source for new outlier candidates.
    RunCrawler(RunCrawlerArgs),
    /// Ingest a batch of crawled outlier candidates from a CSV file.
    IngestOutlierCsv(IngestOutlierCsvArgs),
    /// Ingest a batch of crystallized pattern-library revisions.
    IngestPatternLibrary(IngestPatternLibraryArgs),
    /// Audit curation rules against the feature extractor's known keyspace.
    AuditPipelineContracts(AuditPipelineContractsArgs),
    /// Audit persisted runs and evidence events for invariant violations.
    AuditPipelineState(AuditPipelineStateArgs),
    /// Report genealogy-depth and Evidence Loop progress for pattern nodes.
    TrackDepthExperiment(TrackDepthExperimentArgs),
}

/// Arguments for `run_crawler`.
#[derive(Args, Debug)]
struct RunCrawlerArgs {
    /// Source to crawl: `"mock"`, or the name of an enabled `crawler.sources` entry.
    #[arg(long)]
    source: String,
    /// Page size for this crawl; defaults to `crawler.default_limit`.
    #[arg(long)]
    limit: Option<u32>,
}

/// Arguments for `ingest_outlier_csv`.
#[derive(Args, Debug)]
struct IngestOutlierCsvArgs {
    /// Path to the CSV file of crawled candidates.
    #[arg(long, value_name = "PATH")]
    csv: PathBuf,
    /// Name of the source this batch was crawled from.
    #[arg(long)]
    source_name: String,
}

/// Arguments for `ingest_pattern_library`.
#[derive(Args, Debug)]
struct IngestPatternLibraryArgs {
    /// Path to a JSON array of pattern-library revisions.
    #[arg(long, value_name = "PATH")]
    input: PathBuf,
    /// Report what would be ingested without writing anything.
    #[arg(long, action = ArgAction::SetTrue)]
    dry_run: bool,
}

/// Arguments for `audit_pipeline_contracts`.
#[derive(Args, Debug)]
struct AuditPipelineContractsArgs {
    /// Additionally validate curation rules persisted in the store.
    #[arg(long, action = ArgAction::SetTrue)]
    with_db: bool,
    /// Exit non-zero if any issue is found.
    #[arg(long, action = ArgAction::SetTrue)]
    fail_on_issue: bool,
}

/// Arguments for `audit_pipeline_state`.
#[derive(Args, Debug)]
struct AuditPipelineStateArgs {
    /// Maximum number of runs/events/items to scan.
    #[arg(long)]
    limit: Option<u32>,
    /// Exit non-zero if any issue is found.
    #[arg(long, action = ArgAction::SetTrue)]
    fail_on_issue: bool,
}

/// Arguments for `track_depth_experiment`.
#[derive(Args, Debug)]
struct TrackDepthExperimentArgs {
    /// Report on a single pattern node.
    #[arg(long, value_name = "ID", conflicts_with = "all")]
    parent_id: Option<String>,
    /// Report on every tracked pattern node.
    #[arg(long, action = ArgAction::SetTrue)]
    all: bool,
    /// Only report on nodes created within this many days.
    #[arg(long, default_value_t = 14)]
    days: i64,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for localized error messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a localized message.
    const fn new(message: String) -> Self {
        Self { message }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Wraps a store error behind the generic `store.open_failed` catalog key.
fn store_err(err: SqliteStoreError) -> CliError {
    CliError::new(t!("store.open_failed", error = err))
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&t!("main.version", version = version))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let config = PatternLoopConfig::load(cli.config.as_deref())
        .map_err(|err| CliError::new(t!("config.load_failed", error = err)))?;

    match cli.command {
        Commands::RunCrawler(args) => command_run_crawler(&args, &config),
        Commands::IngestOutlierCsv(args) => command_ingest_outlier_csv(&args, &config),
        Commands::IngestPatternLibrary(args) => command_ingest_pattern_library(&args, &config),
        Commands::AuditPipelineContracts(args) => command_audit_pipeline_contracts(&args, &config),
        Commands::AuditPipelineState(args) => command_audit_pipeline_state(&args, &config),
        Commands::TrackDepthExperiment(args) => command_track_depth_experiment(&args, &config),
    }
}

/// Opens the configured `SQLite` store.
fn open_store(config: &PatternLoopConfig) -> CliResult<PatternLoopStore> {
    PatternLoopStore::new(config.sqlite_store_config()).map_err(store_err)
}

// ============================================================================
// SECTION: Scoring Helpers
// ============================================================================

/// S-tier `outlier_score` threshold (SPEC_FULL.md §9's resolved convention).
const S_TIER_THRESHOLD: f64 = 500.0;
/// A-tier `outlier_score` threshold.
const A_TIER_THRESHOLD: f64 = 200.0;
/// B-tier `outlier_score` threshold.
const B_TIER_THRESHOLD: f64 = 50.0;

/// Computes `outlier_score = view_count_multiplier * engagement_modifier`,
/// per the crawler-side convention SPEC_FULL.md §9 resolves as canonical.
#[allow(
    clippy::cast_precision_loss,
    reason = "view/like/share counts are small enough that f64 precision loss is immaterial here"
)]
fn compute_outlier_score(views: u64, likes: u64, shares: u64, growth_rate: f64) -> f64 {
    let view_count_multiplier = views as f64 / 1000.0;
    let engagement_modifier =
        1.0 + (likes + shares) as f64 / views.max(1) as f64 + growth_rate.max(0.0);
    view_count_multiplier * engagement_modifier
}

/// Maps an `outlier_score` to its tier bucket.
fn tier_for_score(score: f64) -> OutlierTier {
    if score >= S_TIER_THRESHOLD {
        OutlierTier::S
    } else if score >= A_TIER_THRESHOLD {
        OutlierTier::A
    } else if score >= B_TIER_THRESHOLD {
        OutlierTier::B
    } else {
        OutlierTier::C
    }
}

/// Parses a tier label from CSV input.
fn parse_outlier_tier(raw: &str) -> CliResult<OutlierTier> {
    match raw.to_ascii_uppercase().as_str() {
        "S" => Ok(OutlierTier::S),
        "A" => Ok(OutlierTier::A),
        "B" => Ok(OutlierTier::B),
        "C" => Ok(OutlierTier::C),
        _ => Err(CliError::new(t!("ingest_csv.tier_invalid", tier = raw))),
    }
}

/// Canonicalizes a crawled video URL: drops the fragment, drops
/// tracking-only query params (`utm_*`, `fbclid`, `ref`), and keeps only
/// the whitelisted `v`/`id`/`list` params, per spec.md §6.
fn canonicalize_video_url(raw: &str) -> String {
    let without_fragment = raw.split_once('#').map_or(raw, |(base, _)| base);
    let (base, query) = match without_fragment.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (without_fragment, None),
    };

    let Some(query) = query else {
        return base.to_string();
    };

    let kept: Vec<String> = query
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let lower_key = key.to_ascii_lowercase();
            if lower_key.starts_with("utm_") || lower_key == "fbclid" || lower_key == "ref" {
                return None;
            }
            matches!(lower_key.as_str(), "v" | "id" | "list")
                .then(|| format!("{lower_key}={value}"))
        })
        .collect();

    if kept.is_empty() {
        base.to_string()
    } else {
        format!("{base}?{}", kept.join("&"))
    }
}

// ============================================================================
// SECTION: run_crawler
// ============================================================================

/// Executes `run_crawler`.
fn command_run_crawler(args: &RunCrawlerArgs, config: &PatternLoopConfig) -> CliResult<ExitCode> {
    let limit = args.limit.unwrap_or(config.crawler.default_limit);
    if limit > config.crawler.max_limit {
        return Err(CliError::new(t!(
            "crawler.limit.exceeds_max",
            limit = limit,
            max_limit = config.crawler.max_limit
        )));
    }
    if args.source != "mock"
        && !config
            .crawler
            .sources
            .iter()
            .any(|source| source.name == args.source && source.enabled)
    {
        return Err(CliError::new(t!(
            "crawler.source.unknown",
            source = args.source
        )));
    }

    let store = open_store(config)?;
    let inputs = serde_json::json!({"source": args.source, "limit": limit});
    let key = run::idempotency_key(&inputs).map_err(|err| CliError::new(err.to_string()))?;

    if let Some(existing) = store
        .find_completed(RunType::Crawler, &key)
        .map_err(store_err)?
    {
        let items_seen = existing
            .result_summary
            .as_ref()
            .and_then(|summary| summary.get("inserted"))
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0);
        write_stdout_line(&t!(
            "crawler.run.skipped",
            run_id = existing.run_id.as_str(),
            items_seen = items_seen
        ))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let started_at = OffsetDateTime::now_utc();
    let run_id = patternloop_core::RunId::new(run::generate_human_id(
        RunType::Crawler.as_id_token(),
        started_at,
        &key[..key.len().min(8)],
    ));
    let running = patternloop_core::Run {
        run_id: run_id.clone(),
        run_type: RunType::Crawler,
        status: patternloop_core::RunStatus::Running,
        idempotency_key: key,
        inputs_json: inputs,
        result_summary: None,
        error_message: None,
        error_traceback: None,
        started_at: Some(started_at),
        ended_at: None,
        duration_ms: None,
        parent_run_id: None,
        triggered_by: "cli".to_string(),
    };
    store.save_run(&running).map_err(store_err)?;

    let candidates = mock_candidates(&args.source, limit, started_at);
    let mut inserted = 0u32;
    let mut duplicates = 0u32;
    for candidate in &candidates {
        let already_present = store
            .list_outlier_items(u32::MAX)
            .map_err(store_err)?
            .iter()
            .any(|item| {
                item.platform == candidate.platform && item.external_id == candidate.external_id
            });
        store.upsert_outlier_item(candidate).map_err(store_err)?;
        if already_present {
            duplicates += 1;
        } else {
            inserted += 1;
        }
    }

    let ended_at = OffsetDateTime::now_utc();
    let completed = patternloop_core::Run {
        status: patternloop_core::RunStatus::Completed,
        ended_at: Some(ended_at),
        duration_ms: Some(duration_ms(started_at, ended_at)?),
        result_summary: Some(serde_json::json!({"inserted": inserted, "duplicates": duplicates})),
        ..running
    };
    store.save_run(&completed).map_err(store_err)?;

    write_stdout_line(&t!(
        "crawler.run.completed",
        run_id = completed.run_id.as_str(),
        inserted = inserted,
        duplicates = duplicates
    ))
    .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Generates deterministic mock candidates for a crawl run. Reproducible
/// for identical `(source, limit)` so idempotent replay finds nothing new.
fn mock_candidates(source: &str, limit: u32, now: OffsetDateTime) -> Vec<OutlierItem> {
    (0..limit)
        .map(|index| {
            let external_id = format!("{source}-{index:06}");
            let views = 1_000_u64 + u64::from(index) * 437;
            let likes = views / 10;
            let shares = views / 50;
            let growth_rate = 0.1 + f64::from(index % 7) * 0.05;
            let outlier_score = compute_outlier_score(views, likes, shares, growth_rate);
            OutlierItem {
                outlier_item_id: patternloop_core::OutlierItemId::new(format!(
                    "oi_{source}_{index:06}"
                )),
                platform: source.to_ascii_lowercase(),
                external_id: external_id.clone(),
                video_url: canonicalize_video_url(&format!(
                    "https://{source}.example.com/v/{external_id}?utm_source=crawl&v={external_id}"
                )),
                views,
                likes,
                shares,
                comments_top_n: Vec::new(),
                growth_rate,
                outlier_score,
                outlier_tier: tier_for_score(outlier_score),
                analysis_status: AnalysisStatus::Pending,
                status: OutlierStatus::Pending,
                promoted_to_node_id: None,
                created_at: now,
            }
        })
        .collect()
}

// ============================================================================
// SECTION: ingest_outlier_csv
// ============================================================================

/// One row of a crawled-candidate CSV batch. Columns beyond these are
/// ignored: the CSV's `CrawlItem` shape is the external interface, the
/// store's `OutlierItem` is the narrower internal projection.
#[derive(Debug, Deserialize)]
struct CrawlItemCsvRow {
    /// Platform-native identifier.
    external_id: String,
    /// Source platform name.
    platform: String,
    /// Raw video URL, canonicalized on ingest.
    video_url: String,
    /// Raw view count at crawl time.
    view_count: u64,
    /// Raw like count at crawl time.
    like_count: u64,
    /// Raw share count at crawl time.
    share_count: u64,
    /// Views-per-hour-since-publish growth rate.
    growth_rate: f64,
    /// Pre-computed outlier score, when the source already provides one.
    #[serde(default)]
    outlier_score: Option<f64>,
    /// Pre-computed tier label (`S`/`A`/`B`/`C`), when provided.
    #[serde(default)]
    outlier_tier: Option<String>,
}

/// Executes `ingest_outlier_csv`.
fn command_ingest_outlier_csv(
    args: &IngestOutlierCsvArgs,
    config: &PatternLoopConfig,
) -> CliResult<ExitCode> {
    let store = open_store(config)?;

    let bytes = fs::read(&args.csv).map_err(|err| {
        CliError::new(t!(
            "ingest_csv.read_failed",
            path = args.csv.display(),
            error = err
        ))
    })?;
    let content_hash = hash_bytes(DEFAULT_HASH_ALGORITHM, &bytes);
    let inputs = serde_json::json!({
        "csv_content_hash": content_hash.value,
        "source_name": args.source_name,
    });
    let key = run::idempotency_key(&inputs).map_err(|err| CliError::new(err.to_string()))?;

    if let Some(existing) = store
        .find_completed(RunType::SourcePack, &key)
        .map_err(store_err)?
    {
        let rows_seen = existing
            .result_summary
            .as_ref()
            .and_then(|summary| summary.get("upserted"))
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0);
        write_stdout_line(&t!(
            "ingest_csv.run.skipped",
            run_id = existing.run_id.as_str(),
            rows_seen = rows_seen
        ))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let started_at = OffsetDateTime::now_utc();
    let run_id = patternloop_core::RunId::new(run::generate_human_id(
        RunType::SourcePack.as_id_token(),
        started_at,
        &key[..key.len().min(8)],
    ));
    let running = patternloop_core::Run {
        run_id,
        run_type: RunType::SourcePack,
        status: patternloop_core::RunStatus::Running,
        idempotency_key: key,
        inputs_json: inputs,
        result_summary: None,
        error_message: None,
        error_traceback: None,
        started_at: Some(started_at),
        ended_at: None,
        duration_ms: None,
        parent_run_id: None,
        triggered_by: "cli".to_string(),
    };
    store.save_run(&running).map_err(store_err)?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(&args.csv)
        .map_err(|err| {
            CliError::new(t!(
                "ingest_csv.read_failed",
                path = args.csv.display(),
                error = err
            ))
        })?;

    let mut upserted = 0u32;
    for (row_index, record) in reader.deserialize::<CrawlItemCsvRow>().enumerate() {
        let row = record.map_err(|err| {
            CliError::new(t!(
                "ingest_csv.row_invalid",
                row = row_index + 1,
                path = args.csv.display(),
                error = err
            ))
        })?;
        let item = build_outlier_item_from_csv_row(row, started_at)?;
        store.upsert_outlier_item(&item).map_err(store_err)?;
        upserted += 1;
    }

    let ended_at = OffsetDateTime::now_utc();
    let completed = patternloop_core::Run {
        status: patternloop_core::RunStatus::Completed,
        ended_at: Some(ended_at),
        duration_ms: Some(duration_ms(started_at, ended_at)?),
        result_summary: Some(serde_json::json!({"upserted": upserted})),
        ..running
    };
    store.save_run(&completed).map_err(store_err)?;

    write_stdout_line(&t!(
        "ingest_csv.run.completed",
        run_id = completed.run_id.as_str(),
        upserted = upserted
    ))
    .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Converts one parsed CSV row into a persistable [`OutlierItem`].
fn build_outlier_item_from_csv_row(
    row: CrawlItemCsvRow,
    created_at: OffsetDateTime,
) -> CliResult<OutlierItem> {
    let platform = row.platform.to_ascii_lowercase();
    let video_url = canonicalize_video_url(&row.video_url);
    let outlier_score = row.outlier_score.unwrap_or_else(|| {
        compute_outlier_score(
            row.view_count,
            row.like_count,
            row.share_count,
            row.growth_rate,
        )
    });
    let outlier_tier = match row.outlier_tier.as_deref() {
        Some(tier) => parse_outlier_tier(tier)?,
        None => tier_for_score(outlier_score),
    };

    Ok(OutlierItem {
        outlier_item_id: patternloop_core::OutlierItemId::new(format!(
            "oi_{platform}_{}",
            row.external_id
        )),
        platform,
        external_id: row.external_id,
        video_url,
        views: row.view_count,
        likes: row.like_count,
        shares: row.share_count,
        comments_top_n: Vec::new(),
        growth_rate: row.growth_rate,
        outlier_score,
        outlier_tier,
        analysis_status: AnalysisStatus::Pending,
        status: OutlierStatus::Pending,
        promoted_to_node_id: None,
        created_at,
    })
}

// ============================================================================
// SECTION: ingest_pattern_library
// ============================================================================

/// One entry of a pattern-library ingestion batch, the input-file shape
/// (`PatternLibrary` minus the server-stamped `created_at`).
#[derive(Debug, Deserialize)]
struct PatternLibraryInputEntry {
    /// Revision identifier.
    pattern_id: String,
    /// The cluster this revision crystallizes.
    cluster_id: String,
    /// Temporal phase this revision applies to.
    temporal_phase: TemporalPhase,
    /// Rules a mutation must not violate.
    invariant_rules: Vec<String>,
    /// Strategy label guiding future mutation generation.
    mutation_strategy: String,
    /// Monotonically increasing revision number.
    revision: u32,
    /// The revision this one supersedes, if any.
    #[serde(default)]
    previous_revision_id: Option<String>,
    /// Confidence in this revision's guidance.
    confidence_score: f64,
    /// Sample count backing this revision.
    sample_count: u32,
}

/// Executes `ingest_pattern_library`.
fn command_ingest_pattern_library(
    args: &IngestPatternLibraryArgs,
    config: &PatternLoopConfig,
) -> CliResult<ExitCode> {
    let bytes = fs::read(&args.input).map_err(|err| {
        CliError::new(t!(
            "ingest_pattern_library.read_failed",
            path = args.input.display(),
            error = err
        ))
    })?;
    let entries: Vec<PatternLibraryInputEntry> = serde_json::from_slice(&bytes).map_err(|err| {
        CliError::new(t!(
            "ingest_pattern_library.parse_failed",
            path = args.input.display(),
            error = err
        ))
    })?;

    let store = if args.dry_run {
        None
    } else {
        Some(open_store(config)?)
    };
    let now = OffsetDateTime::now_utc();

    for entry in entries {
        if args.dry_run {
            write_stdout_line(&t!(
                "ingest_pattern_library.dry_run",
                pattern_id = entry.pattern_id,
                cluster_id = entry.cluster_id,
                revision = entry.revision
            ))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            continue;
        }

        let pattern_id = entry.pattern_id.clone();
        let pattern = PatternLibrary {
            pattern_id: PatternLibraryId::new(entry.pattern_id),
            cluster_id: patternloop_core::ClusterId::new(entry.cluster_id),
            temporal_phase: entry.temporal_phase,
            invariant_rules: entry.invariant_rules,
            mutation_strategy: entry.mutation_strategy,
            revision: entry.revision,
            previous_revision_id: entry.previous_revision_id.map(PatternLibraryId::new),
            confidence_score: entry.confidence_score,
            sample_count: entry.sample_count,
            created_at: now,
        };
        #[allow(
            clippy::unwrap_used,
            reason = "store is always Some when not dry_run, checked above"
        )]
        store
            .as_ref()
            .unwrap()
            .save_entity("pattern_library", &pattern_id, &pattern)
            .map_err(store_err)?;
        write_stdout_line(&t!(
            "ingest_pattern_library.ok",
            pattern_id = pattern_id,
            revision = entry.revision
        ))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }

    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: audit_pipeline_contracts
// ============================================================================

/// Feature keys the curation feature extractor declares it produces. Kept
/// compiled-in since spec.md §6 names no external rules-file flag for this
/// command; matches the fixture keyspace `patternloop-rules` tests against.
const KNOWN_FEATURE_KEYS: &[&str] = &[
    "view_velocity",
    "has_hook",
    "comment_count",
    "pattern_type",
    "outlier_score",
    "growth_rate",
    "platform",
    "engagement_rate",
    "genealogy_depth",
    "sample_count",
    "confidence_score",
];

/// The compiled-in default curation rule set, always validated.
fn default_curation_rules() -> Vec<CurationRule> {
    vec![
        CurationRule {
            rule_id: "promote_high_velocity_hook".to_string(),
            conditions: vec![
                CurationPredicate {
                    feature_key: "view_velocity".to_string(),
                    comparator: Comparator::GreaterThan,
                    expected: serde_json::json!(100.0),
                },
                CurationPredicate {
                    feature_key: "has_hook".to_string(),
                    comparator: Comparator::Equals,
                    expected: serde_json::json!(true),
                },
            ],
            action: RuleAction::Promote,
            priority: 10,
        },
        CurationRule {
            rule_id: "reject_low_engagement".to_string(),
            conditions: vec![CurationPredicate {
                feature_key: "engagement_rate".to_string(),
                comparator: Comparator::LessThan,
                expected: serde_json::json!(0.01),
            }],
            action: RuleAction::Reject,
            priority: 5,
        },
    ]
}

/// Executes `audit_pipeline_contracts`.
fn command_audit_pipeline_contracts(
    args: &AuditPipelineContractsArgs,
    config: &PatternLoopConfig,
) -> CliResult<ExitCode> {
    let known_keys: Vec<String> = KNOWN_FEATURE_KEYS
        .iter()
        .map(|key| (*key).to_string())
        .collect();
    let mut rules = default_curation_rules();

    if args.with_db {
        let store = open_store(config)?;
        for entity_id in store
            .list_entity_ids("curation_rule", 1000)
            .map_err(store_err)?
        {
            let rule: CurationRule = store
                .load_entity("curation_rule", &entity_id)
                .map_err(store_err)?;
            rules.push(rule);
        }
    }

    let mut issues = Vec::new();
    for rule in &rules {
        if let Err(RequirementError::UnknownFeatureKey(key)) = rule.validate_keyspace(&known_keys) {
            issues.push(t!(
                "audit_contracts.rule_key_mismatch",
                rule_id = rule.rule_id,
                key = key
            ));
        }
    }

    for issue in &issues {
        write_stdout_line(issue).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    if issues.is_empty() {
        write_stdout_line(&t!(
            "audit_contracts.ok",
            rule_count = rules.len(),
            key_count = known_keys.len()
        ))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    } else {
        write_stdout_line(&t!(
            "audit_contracts.issues_found",
            issue_count = issues.len(),
            rule_count = rules.len()
        ))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }

    if !issues.is_empty() && args.fail_on_issue {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: audit_pipeline_state
// ============================================================================

/// Default scan cap when `--limit` is not given.
const DEFAULT_AUDIT_LIMIT: u32 = 1000;

/// Executes `audit_pipeline_state`.
fn command_audit_pipeline_state(
    args: &AuditPipelineStateArgs,
    config: &PatternLoopConfig,
) -> CliResult<ExitCode> {
    let store = open_store(config)?;
    let limit = args.limit.unwrap_or(DEFAULT_AUDIT_LIMIT);

    let runs = store.list_runs(limit).map_err(store_err)?;
    let events = store.list_evidence_events(limit).map_err(store_err)?;
    let outlier_items = store.list_outlier_items(limit).map_err(store_err)?;

    let mut issues = Vec::new();

    let mut completed_counts: HashMap<(RunType, String), u32> = HashMap::new();
    for run in &runs {
        if run.status == patternloop_core::RunStatus::Completed {
            *completed_counts
                .entry((run.run_type, run.idempotency_key.clone()))
                .or_insert(0) += 1;
        }
    }
    for ((run_type, idempotency_key), count) in &completed_counts {
        if *count > 1 {
            issues.push(t!(
                "audit_state.idempotency_violation",
                run_type = run_type.as_id_token(),
                idempotency_key = idempotency_key
            ));
        }
    }

    for event in &events {
        if let Some(detail) = transition_history_issue(event) {
            issues.push(t!(
                "audit_state.illegal_transition_history",
                event_id = event.evidence_event_id.as_str(),
                detail = detail
            ));
        }
    }

    for item in &outlier_items {
        if item.status == OutlierStatus::Promoted && item.promoted_to_node_id.is_none() {
            issues.push(t!(
                "audit_state.promoted_without_node",
                outlier_item_id = item.outlier_item_id.as_str()
            ));
        }
    }

    for issue in &issues {
        write_stdout_line(issue).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    if issues.is_empty() {
        write_stdout_line(&t!(
            "audit_state.ok",
            run_count = runs.len(),
            event_count = events.len()
        ))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    } else {
        write_stdout_line(&t!(
            "audit_state.issues_found",
            issue_count = issues.len(),
            run_count = runs.len(),
            event_count = events.len()
        ))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }

    if !issues.is_empty() && args.fail_on_issue {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Returns a description of the first timestamp-consistency violation
/// found against the §4.4 DAG, or `None` if `event`'s stamped timestamps
/// are a consistent prefix for its current status.
fn transition_history_issue(event: &EvidenceEvent) -> Option<String> {
    if event.status == EvidenceStatus::Failed {
        return failed_history_issue(event);
    }

    let stage_index = match event.status {
        EvidenceStatus::Queued => 0,
        EvidenceStatus::Running => 1,
        EvidenceStatus::EvidenceReady => 2,
        EvidenceStatus::Decided => 3,
        EvidenceStatus::Executed => 4,
        EvidenceStatus::Measured => 5,
        EvidenceStatus::Failed => unreachable!("handled above"),
    };

    let timestamps: [(&str, bool); 5] = [
        ("started_at", event.started_at.is_some()),
        ("evidence_ready_at", event.evidence_ready_at.is_some()),
        ("decided_at", event.decided_at.is_some()),
        ("executed_at", event.executed_at.is_some()),
        ("measured_at", event.measured_at.is_some()),
    ];

    timestamps
        .iter()
        .enumerate()
        .find_map(|(position, (label, present))| {
            timestamp_presence_issue(label, *present, position < stage_index)
        })
}

/// Describes the `FAILED`-specific consistency check: an error message
/// must be present, and the set timestamps must form a contiguous prefix
/// (failure can occur from any non-terminal stage).
fn failed_history_issue(event: &EvidenceEvent) -> Option<String> {
    if event.error_message.is_none() {
        return Some("failed event missing error_message".to_string());
    }

    let timestamps = [
        event.started_at.is_some(),
        event.evidence_ready_at.is_some(),
        event.decided_at.is_some(),
        event.executed_at.is_some(),
        event.measured_at.is_some(),
    ];
    let mut seen_gap = false;
    for present in timestamps {
        if !present {
            seen_gap = true;
        } else if seen_gap {
            return Some("timestamps are not a contiguous prefix".to_string());
        }
    }
    None
}

/// Checks one timestamp field against whether it is `required` to be set.
fn timestamp_presence_issue(label: &str, present: bool, required: bool) -> Option<String> {
    if required && !present {
        Some(format!("expected {label} timestamp to be set"))
    } else if !required && present {
        Some(format!(
            "unexpected {label} timestamp set before reaching that stage"
        ))
    } else {
        None
    }
}

// ============================================================================
// SECTION: track_depth_experiment
// ============================================================================

/// The genealogy-depth baseline recorded by the previous
/// `track_depth_experiment` run for one pattern node.
#[derive(Debug, Serialize, Deserialize)]
struct DepthBaseline {
    /// The node's `genealogy_depth` as of the previous check.
    genealogy_depth: u32,
    /// When that check was made.
    checked_at: OffsetDateTime,
}

/// Executes `track_depth_experiment`.
fn command_track_depth_experiment(
    args: &TrackDepthExperimentArgs,
    config: &PatternLoopConfig,
) -> CliResult<ExitCode> {
    if args.parent_id.is_none() && !args.all {
        return Err(CliError::new(
            "either --parent-id or --all must be given".to_string(),
        ));
    }

    let store = open_store(config)?;

    let parent_ids: Vec<String> = if let Some(parent_id) = &args.parent_id {
        vec![parent_id.clone()]
    } else {
        store
            .list_entity_ids("pattern_node", u32::MAX)
            .map_err(store_err)?
    };

    if parent_ids.is_empty() {
        write_stdout_line(&t!("track_depth.no_parents"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let now = OffsetDateTime::now_utc();
    let window = time::Duration::days(args.days.max(0));

    for parent_id in parent_ids {
        report_depth_for_parent(&store, &parent_id, now, window)?;
    }

    Ok(ExitCode::SUCCESS)
}

/// Loads, reports on, and re-baselines one pattern node's genealogy depth
/// and Evidence Loop progress.
fn report_depth_for_parent(
    store: &PatternLoopStore,
    parent_id: &str,
    now: OffsetDateTime,
    window: time::Duration,
) -> CliResult<()> {
    let node: Option<PatternNode> =
        match store.load_entity::<PatternNode>("pattern_node", parent_id) {
            Ok(node) => Some(node),
            Err(SqliteStoreError::NotFound(_)) => None,
            Err(err) => return Err(store_err(err)),
        };
    let Some(node) = node else {
        write_stdout_line(&t!("track_depth.node_not_found", parent_id = parent_id))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(());
    };

    if now - node.created_at > window {
        return Ok(());
    }

    let baseline: Option<DepthBaseline> =
        match store.load_entity::<DepthBaseline>("depth_baseline", parent_id) {
            Ok(baseline) => Some(baseline),
            Err(SqliteStoreError::NotFound(_)) => None,
            Err(err) => return Err(store_err(err)),
        };

    let depth_increased = baseline
        .as_ref()
        .is_some_and(|baseline| node.genealogy_depth > baseline.genealogy_depth);
    if baseline.is_none() {
        write_stdout_line(&t!(
            "track_depth.no_baseline",
            parent_id = parent_id,
            depth = node.genealogy_depth
        ))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }

    let parent_node_id = PatternNodeId::new(parent_id.to_string());
    let latest_event = store
        .get_latest_event_for_parent(&parent_node_id)
        .map_err(store_err)?;
    let (status_label, confidence) = latest_event_summary(store, latest_event.as_ref())?;

    write_stdout_line(&t!(
        "track_depth.report",
        parent_id = parent_id,
        status = status_label,
        depth = node.genealogy_depth,
        depth_increased = depth_increased,
        confidence = confidence.map_or_else(|| "n/a".to_string(), |value| value.to_string())
    ))
    .map_err(|err| CliError::new(output_error("stdout", &err)))?;

    store
        .save_entity(
            "depth_baseline",
            parent_id,
            &DepthBaseline {
                genealogy_depth: node.genealogy_depth,
                checked_at: now,
            },
        )
        .map_err(store_err)?;
    Ok(())
}

/// Resolves the status label and latest confidence for a parent node's
/// most recent evidence event, if any.
fn latest_event_summary(
    store: &PatternLoopStore,
    latest_event: Option<&EvidenceEvent>,
) -> CliResult<(&'static str, Option<f64>)> {
    let Some(event) = latest_event else {
        return Ok(("no_evidence_event", None));
    };

    let confidence = match &event.evidence_snapshot_id {
        Some(snapshot_id) => load_snapshot_confidence(store, snapshot_id)?,
        None => None,
    };
    Ok((evidence_status_label(event.status), confidence))
}

/// Loads an evidence snapshot's confidence value, if it still exists.
fn load_snapshot_confidence(
    store: &PatternLoopStore,
    snapshot_id: &EvidenceSnapshotId,
) -> CliResult<Option<f64>> {
    store
        .load_evidence_snapshot(snapshot_id)
        .map_err(store_err)
        .map(|snapshot| snapshot.map(|s| s.confidence))
}

/// Returns the snake_case wire label for an [`EvidenceStatus`].
const fn evidence_status_label(status: EvidenceStatus) -> &'static str {
    match status {
        EvidenceStatus::Queued => "queued",
        EvidenceStatus::Running => "running",
        EvidenceStatus::EvidenceReady => "evidence_ready",
        EvidenceStatus::Decided => "decided",
        EvidenceStatus::Executed => "executed",
        EvidenceStatus::Measured => "measured",
        EvidenceStatus::Failed => "failed",
    }
}

// ============================================================================
// SECTION: Shared Helpers
// ============================================================================

/// Computes a millisecond duration between two timestamps, for `Run::duration_ms`.
fn duration_ms(started_at: OffsetDateTime, ended_at: OffsetDateTime) -> CliResult<i64> {
    i64::try_from((ended_at - started_at).whole_milliseconds())
        .map_err(|_| CliError::new(t!("time.duration_overflow")))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    use std::io::Write;
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    use std::io::Write;
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats a localized output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    let stream_label = match stream {
        "stdout" => t!("output.stream.stdout"),
        "stderr" => t!("output.stream.stderr"),
        _ => t!("output.stream.unknown"),
    };
    t!("output.write_failed", stream = stream_label, error = error)
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "test-only assertions are permitted"
)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_video_url_drops_tracking_params_and_fragment() {
        let url = "https://example.com/v/123?utm_source=x&v=123&fbclid=abc#t=10s";
        assert_eq!(
            canonicalize_video_url(url),
            "https://example.com/v/123?v=123"
        );
    }

    #[test]
    fn canonicalize_video_url_passes_through_bare_urls() {
        let url = "https://example.com/v/123";
        assert_eq!(canonicalize_video_url(url), "https://example.com/v/123");
    }

    #[test]
    fn outlier_score_reaches_s_tier_for_viral_growth() {
        let score = compute_outlier_score(2_000_000, 300_000, 80_000, 0.8);
        assert!(score >= S_TIER_THRESHOLD);
        assert_eq!(tier_for_score(score), OutlierTier::S);
    }

    #[test]
    fn outlier_score_is_low_tier_for_small_counts() {
        let score = compute_outlier_score(10, 1, 0, 0.0);
        assert_eq!(tier_for_score(score), OutlierTier::C);
    }

    #[test]
    fn parse_outlier_tier_is_case_insensitive() {
        assert_eq!(parse_outlier_tier("s").unwrap(), OutlierTier::S);
        assert_eq!(parse_outlier_tier("B").unwrap(), OutlierTier::B);
        assert!(parse_outlier_tier("Z").is_err());
    }

    #[test]
    fn transition_history_issue_accepts_a_freshly_running_event() {
        let mut event = EvidenceEvent::new(
            patternloop_core::EvidenceEventId::new("e1"),
            PatternNodeId::new("n1"),
        );
        event
            .mark_running(OffsetDateTime::now_utc())
            .expect("queued -> running");
        assert!(transition_history_issue(&event).is_none());
    }

    #[test]
    fn transition_history_issue_flags_a_missing_started_at() {
        let event = EvidenceEvent {
            evidence_event_id: patternloop_core::EvidenceEventId::new("e1"),
            status: EvidenceStatus::Running,
            parent_node_id: PatternNodeId::new("n1"),
            evidence_snapshot_id: None,
            decision_object_id: None,
            started_at: None,
            evidence_ready_at: None,
            decided_at: None,
            executed_at: None,
            measured_at: None,
            error_message: None,
        };
        assert!(transition_history_issue(&event).is_some());
    }

    #[test]
    fn transition_history_issue_requires_error_message_on_failed() {
        let event = EvidenceEvent {
            evidence_event_id: patternloop_core::EvidenceEventId::new("e1"),
            status: EvidenceStatus::Failed,
            parent_node_id: PatternNodeId::new("n1"),
            evidence_snapshot_id: None,
            decision_object_id: None,
            started_at: Some(OffsetDateTime::now_utc()),
            evidence_ready_at: None,
            decided_at: None,
            executed_at: None,
            measured_at: None,
            error_message: None,
        };
        assert!(transition_history_issue(&event).is_some());
    }
}
