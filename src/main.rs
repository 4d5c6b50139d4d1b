//! themelens - theme induction explorer for interview data
//!
//! A CLI tool that filters interview responses by demographics, induces
//! descriptive themes with an LLM, and reports theme prevalence overall
//! and by region.
//!
//! Exit codes:
//!   0 - Success (including runs that end in an informational empty state)
//!   1 - Configuration, availability or runtime error

mod analysis;
mod cli;
mod config;
mod dataset;
mod error;
mod induction;
mod models;
mod report;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, EngineKind};
use dataset::DemographicFilter;
use indicatif::{ProgressBar, ProgressStyle};
use induction::{ConceptInducer, InductionOutput, InductionRequest, LlmInducer, ReplayInducer};
use models::{Document, Notice, Report, ReportMetadata, SliceStats};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Pick up OPENAI_API_KEY and friends from a local .env, if present
    let _ = dotenvy::dotenv();

    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("themelens v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args) {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            if let Some(kind) = e.downcast_ref::<error::ExplorerError>() {
                if kind.is_configuration() {
                    eprintln!(
                        "   Check the dataset columns, the --questions selection and {}.",
                        config::CONFIG_FILE_NAME
                    );
                }
            }
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .themelens.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE_NAME);
    println!("   Edit it to customize the dataset, engine, and threshold.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete workflow. Returns the exit code.
fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    // Step 1: Load the dataset
    println!("📥 Loading dataset: {}", config.dataset.path.display());
    let records = dataset::load_dataset(&config.dataset.path)?;

    if args.list_regions {
        return handle_list_regions(&records);
    }

    // Step 2: Slice by demographics
    let filter = DemographicFilter {
        regions: args.region.clone(),
        ages: args.age.clone(),
        incomes: args.income.clone(),
        diets: args.diet.clone(),
    };
    if filter.is_unrestricted() {
        debug!("No demographic filter, using all rows");
    }
    let slice = filter.apply(&records);

    // Step 3: Assemble documents (validates the question selection)
    let selection = dataset::parse_selection(&config.dataset.questions)?;
    let documents = dataset::build_documents(&slice, &selection)?;
    let stats = dataset::slice_stats(&slice, documents.len());

    println!(
        "👥 Participants in slice: {} • Rows: {}",
        stats.participants, stats.rows
    );
    println!("📝 Text rows to induce on: {}", stats.documents);

    if args.dry_run {
        return handle_dry_run(&documents);
    }

    let seed = args.effective_seed();
    let request = InductionRequest {
        documents,
        seed: seed.clone(),
        max_concepts: config.analysis.max_concepts,
    };

    let output = if request.documents.is_empty() {
        warn!("{}", Notice::NoDocuments);
        InductionOutput::default()
    } else {
        // Step 4: Induce concepts
        let inducer = build_inducer(&config)?;

        println!("\n🔬 Running induction with {}...", inducer.name());
        let spinner = start_spinner(args.quiet);
        let result = induction::run_blocking(inducer.as_ref(), &request);
        spinner.finish_and_clear();
        let output = result?;

        info!(
            "Induction returned {} concepts and {} score records",
            output.concepts.len(),
            output.scores.len()
        );
        output
    };

    if let Some(ref path) = args.export_scores {
        output.write_json(path)?;
        println!("💾 Score table exported to: {}", path.display());
    }

    // Step 5: Aggregate and report
    println!("\n📊 Generating report...");
    let analysis = analysis::analyze(&output, &request.documents, config.analysis.threshold);
    for notice in &analysis.notices {
        warn!("{}", notice);
    }

    let metadata = ReportMetadata {
        dataset: config.dataset.path.display().to_string(),
        analysis_date: Utc::now(),
        engine: engine_label(&config),
        seed,
        max_concepts: config.analysis.max_concepts,
        threshold: config.analysis.threshold,
        questions: selection.iter().map(|q| q.to_string()).collect(),
        regions: args.region.clone(),
        slice: stats,
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };

    let report = Report {
        metadata,
        concepts: analysis.concepts,
        docs_per_concept: analysis.docs_per_concept,
        regional: analysis.regional,
        notices: analysis.notices,
    };

    let rendered = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    let output_path = Path::new(&config.general.output);
    std::fs::write(output_path, &rendered)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    print_summary(&report, &request.documents, stats);
    println!(
        "\n✅ Done! Report saved to: {}",
        output_path.display()
    );

    Ok(0)
}

/// Handle --list-regions: print the distinct regions and exit.
fn handle_list_regions(records: &[models::ParticipantRecord]) -> Result<i32> {
    let regions = dataset::distinct_regions(records);

    if regions.is_empty() {
        println!("   No regions recorded in the dataset.");
    } else {
        println!("\n🗺️  Regions in dataset:\n");
        for region in regions {
            println!("     {}", region);
        }
    }

    Ok(0)
}

/// Handle --dry-run: print what would be induced on and exit.
fn handle_dry_run(documents: &[Document]) -> Result<i32> {
    println!("\n🔍 Dry run: documents assembled (no engine call)...\n");

    if documents.is_empty() {
        println!("   {}", Notice::NoDocuments);
    } else {
        for doc in documents {
            let preview: String = doc.text.chars().take(80).collect();
            println!(
                "     📄 {} [{}] {}",
                doc.doc_id,
                doc.region().unwrap_or("no region"),
                preview
            );
        }
        println!("\n   Total: {} documents", documents.len());
    }

    println!("\n✅ Dry run complete. No engine calls were made.");
    Ok(0)
}

/// Construct the configured inducer.
fn build_inducer(config: &Config) -> Result<Box<dyn ConceptInducer>> {
    match config.engine.kind {
        EngineKind::Llm => Ok(Box::new(LlmInducer::new(config.engine.llm_config())?)),
        EngineKind::Replay => Ok(Box::new(ReplayInducer::new(
            config.engine.replay_path.clone(),
        ))),
    }
}

fn engine_label(config: &Config) -> String {
    match config.engine.kind {
        EngineKind::Llm => config.engine.model.clone(),
        EngineKind::Replay => match config.engine.replay_path {
            Some(ref path) => format!("replay:{}", path.display()),
            None => "replay".to_string(),
        },
    }
}

/// Spinner shown while the blocking induction runs.
fn start_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.set_message("Inducing themes…");
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn print_summary(report: &Report, documents: &[Document], stats: SliceStats) {
    println!("\n📊 Theme Summary:");
    println!("   Documents: {} (participants: {})", documents.len(), stats.participants);
    println!("   Themes: {}", report.concepts.len());
    for concept in &report.concepts {
        println!(
            "   - {}: {} docs ({:.1}%)",
            concept.concept,
            concept.n_matches,
            concept.prevalence * 100.0
        );
    }
    for notice in &report.notices {
        println!("   ℹ️  {}", notice);
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
