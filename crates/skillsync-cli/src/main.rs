//! Command-line shell for the skillsync ingestion pipeline.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

use skillsync::db::document_repo::DocumentKind;
use skillsync::db::{default_database_path, employee_repo, skill_repo};
use skillsync::reconciler::Dispatcher;
use skillsync::{
    load_config, Config, Database, DocumentIntake, EnrichmentOutcome, EnrichmentPhase,
    EnrichmentPipeline, EnrichmentPool, HttpExtractionClient, PipelineConfig, StagingScanner,
};

#[derive(Parser)]
#[command(name = "skillsync", version, about = "Turns employee documents into skill records")]
struct Cli {
    /// Config file (JSON or YAML). Built-in defaults are used when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import every structured file in the staging directory
    Scan {
        /// Keep running and re-scan when staging files change
        #[arg(short, long)]
        watch: bool,
    },

    /// Run enrichment for one employee now
    Enrich {
        /// Employee business id, e.g. BIZ2025-0001
        business_id: String,
    },

    /// Store a document for an employee and enrich them in the background
    Add {
        business_id: String,
        file: PathBuf,

        /// Record the document as a certificate for this skill
        #[arg(long)]
        certificate: Option<String>,

        /// Certificate type, e.g. "professional" (requires --certificate)
        #[arg(long, requires = "certificate")]
        cert_type: Option<String>,

        /// Document type label for non-certificate documents
        #[arg(long, conflicts_with = "certificate")]
        doc_type: Option<String>,
    },

    /// Create or upgrade the database schema
    Migrate,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json)?;

    let config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    let db = open_database(&config)?;
    let pipeline_config = Arc::new(PipelineConfig::from_config(&config));

    match cli.command {
        Commands::Migrate => {
            let (categories, skills, associations) = db.with_conn(skill_repo::table_counts)?;
            info!(
                "Schema up to date ({} categories, {} skills, {} associations)",
                categories, skills, associations
            );
        }
        Commands::Scan { watch } => scan(&config, &pipeline_config, db, watch)?,
        Commands::Enrich { business_id } => {
            let employee = find_employee(&db, &business_id)?;
            let pipeline = build_pipeline(&config, pipeline_config, db)?;
            let outcome = pipeline.run(&skillsync::EnrichmentRequest::new(
                employee.id,
                employee.business_id,
            ))?;
            report_outcome(&business_id, &outcome);
        }
        Commands::Add {
            business_id,
            file,
            certificate,
            cert_type,
            doc_type,
        } => {
            let employee = find_employee(&db, &business_id)?;
            let kind = match certificate {
                Some(skill) => DocumentKind::Certificate {
                    skill: Some(skill),
                    cert_type,
                    issuing_organization: None,
                    validity_months: None,
                },
                None => DocumentKind::General { doc_type },
            };
            add_document(&config, pipeline_config, db, employee.id, &file, kind)?;
        }
    }

    Ok(())
}

fn init_logging(json: bool) -> anyhow::Result<()> {
    tracing_log::LogTracer::init().context("Failed to install log bridge")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
    } else {
        tracing::subscriber::set_global_default(registry.with(fmt::layer().with_target(false)))
    };
    installed.context("Failed to install tracing subscriber")
}

fn open_database(config: &Config) -> anyhow::Result<Database> {
    let path = match &config.database_path {
        Some(path) => PathBuf::from(path),
        None => default_database_path().context("Could not determine a data directory")?,
    };
    Ok(Database::open(&path)?)
}

fn find_employee(db: &Database, business_id: &str) -> anyhow::Result<employee_repo::EmployeeRow> {
    match db.with_conn(|conn| employee_repo::find_by_business_id(conn, business_id))? {
        Some(employee) => Ok(employee),
        None => bail!("No employee with business id {}", business_id),
    }
}

fn build_pipeline(
    config: &Config,
    pipeline_config: Arc<PipelineConfig>,
    db: Database,
) -> anyhow::Result<EnrichmentPipeline> {
    let client = HttpExtractionClient::from_config(&config.extraction)
        .context("Extraction client is not configured")?;
    Ok(EnrichmentPipeline::new(pipeline_config, db, Arc::new(client)))
}

fn report_outcome(business_id: &str, outcome: &EnrichmentOutcome) {
    match outcome {
        EnrichmentOutcome::Quarantined { .. } => warn!("{}: {}", business_id, outcome),
        _ => info!("{}: {}", business_id, outcome),
    }
}

fn shutdown_flag() -> anyhow::Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        info!("Received Ctrl-C, shutting down...");
        flag.store(true, Ordering::Relaxed);
    })
    .context("Failed to install Ctrl-C handler")?;
    Ok(shutdown)
}

fn scan(
    config: &Config,
    pipeline_config: &PipelineConfig,
    db: Database,
    watch: bool,
) -> anyhow::Result<()> {
    let dispatcher = Dispatcher::new(
        db,
        &pipeline_config.processed_directory,
        pipeline_config.association_mode,
    );
    let mut scanner = StagingScanner::new(
        &pipeline_config.staging_directory,
        pipeline_config.quarantine_directory(),
        pipeline_config.staging_ledger_path(),
        dispatcher,
    )?
    .with_pattern(&config.scanner.pattern)?
    .with_debug_copies(pipeline_config.debug_copies);

    let print = |bulk: &skillsync::worker::BulkReport| {
        info!(
            "{} archived, {} quarantined, {} unchanged",
            bulk.archived, bulk.quarantined, bulk.skipped
        );
        if let Some(report) = &bulk.quarantine_report {
            warn!("Quarantine report written to {}", report.display());
        }
    };

    if watch {
        let shutdown = shutdown_flag()?;
        scanner.watch(
            Duration::from_secs(config.scanner.poll_interval_secs),
            shutdown,
            print,
        )?;
    } else {
        let bulk = scanner.scan()?;
        print(&bulk);
    }
    Ok(())
}

fn add_document(
    config: &Config,
    pipeline_config: Arc<PipelineConfig>,
    db: Database,
    employee_id: i64,
    file: &Path,
    kind: DocumentKind,
) -> anyhow::Result<()> {
    let content =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("Document path has no file name")?;

    let intake = DocumentIntake::new(Arc::clone(&pipeline_config), db.clone());
    let accepted = intake.accept(employee_id, &filename, &content, kind)?;
    info!("Stored {}", accepted.stored_at.display());

    let pipeline = build_pipeline(config, pipeline_config, db)?;
    let pool = EnrichmentPool::new(
        Arc::new(pipeline),
        config.workers.count,
        config.workers.queue_capacity,
    )?;
    let mut events = pool.subscribe();
    pool.submit(accepted.request)?;
    pool.wait();

    while let Ok(event) = events.try_recv() {
        match event.phase {
            EnrichmentPhase::Failed => warn!(
                "{}: {}",
                event.business_id,
                event.error.as_deref().unwrap_or(&event.message)
            ),
            EnrichmentPhase::Completed => info!("{}: {}", event.business_id, event.message),
            _ => {}
        }
    }
    Ok(())
}
