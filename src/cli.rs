use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use elector_print::certificate::{GenerateTemporaryCertificateRequest, TemporaryCertificateGenerator};
use elector_print::config::Config;
use elector_print::ero::StaticEroDirectory;
use elector_print::ledger::FjallStore;
use elector_print::messaging::{LoggingProducer, MessageProducer};
use elector_print::observability::Metrics;
use elector_print::pipeline::{BatchJob, Scheduler, TickOutcome};
use elector_print::render::TemplateRenderer;
use elector_print::server::{self, AnyError, StatusState};
use elector_print::storage::{RetryPolicy, StorageClient};
use elector_print::validation::{DateValidator, SystemClock};

#[derive(Parser, Debug)]
#[command(name = "elector-print")]
#[command(about = "Elector document print batch service", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $ELECTOR_PRINT_CONFIG or config/elector-print.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the scheduled batch job and the status server until shut down
    Run,
    /// Run a single batch tick and exit
    Tick,
    /// Generate one temporary certificate PDF
    Certificate(CertificateArgs),
    /// Validate the configuration and print the effective values
    CheckConfig,
}

#[derive(clap::Args, Debug)]
pub struct CertificateArgs {
    #[arg(long)]
    pub gss_code: Option<String>,
    #[arg(long)]
    pub source_reference: Option<String>,
    #[arg(long)]
    pub elector_name: Option<String>,
    /// First day the certificate is valid (YYYY-MM-DD)
    #[arg(long)]
    pub valid_on_date: Option<NaiveDate>,
    /// Directory the PDF is written to
    #[arg(long, default_value = ".")]
    pub output: PathBuf,
}

struct Runtime {
    config: Config,
    store: Arc<FjallStore>,
    metrics: Arc<Metrics>,
    producer: Arc<dyn MessageProducer>,
    job: Arc<BatchJob>,
}

fn runtime(config: Config) -> Result<Runtime, AnyError> {
    let store = Arc::new(FjallStore::open(&config.server.fjall_path)?);
    let retry = RetryPolicy {
        max_retries: config.delivery.max_retries,
        backoff: config.delivery.retry_backoff.as_duration(),
    };
    let storage = Arc::new(StorageClient::from_config(&config.storage, retry)?);
    let metrics = Arc::new(Metrics::new());
    let producer: Arc<dyn MessageProducer> = Arc::new(LoggingProducer::new());
    let job = Arc::new(BatchJob::from_config(
        &config,
        store.clone(),
        storage,
        producer.clone(),
        Arc::new(SystemClock),
        metrics.clone(),
    ));

    Ok(Runtime {
        config,
        store,
        metrics,
        producer,
        job,
    })
}

fn stopped(mut rx: watch::Receiver<bool>) -> impl Future<Output = ()> + Send + 'static {
    async move {
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

pub async fn execute(cli: Cli) -> Result<(), AnyError> {
    let config = Config::load_with(cli.config)?;

    match cli.command {
        Commands::Run => run(config).await,
        Commands::Tick => tick(config).await,
        Commands::Certificate(args) => certificate(config, args).await,
        Commands::CheckConfig => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn run(config: Config) -> Result<(), AnyError> {
    let schedule = config.schedule()?;
    let runtime = runtime(config)?;

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        server::shutdown_signal().await;
        let _ = tx.send(true);
    });

    let status = StatusState {
        store: runtime.store.as_ref().clone(),
        metrics: runtime.metrics.clone(),
        producer: runtime.producer.clone(),
    };
    let server = tokio::spawn(server::serve(
        runtime.config.server.bind_addr,
        status,
        stopped(rx.clone()),
    ));

    Scheduler::new(runtime.job.clone(), schedule)
        .run(stopped(rx))
        .await;
    runtime.job.drain().await;

    server.await??;
    runtime.store.persist()?;
    Ok(())
}

async fn tick(config: Config) -> Result<(), AnyError> {
    let runtime = runtime(config)?;
    let outcome = runtime.job.tick().await;
    runtime.job.drain().await;
    runtime.store.persist()?;

    match outcome? {
        TickOutcome::LockHeld => info!("Job lock held by another instance; nothing done"),
        TickOutcome::Completed { dispatched } => {
            for result in &dispatched {
                info!(
                    batch_id = %result.batch_id,
                    archive = %result.archive_key,
                    requests = result.request_count,
                    "Dispatched"
                );
            }
            info!(batches = dispatched.len(), "Tick finished");
        }
    }
    Ok(())
}

async fn certificate(config: Config, args: CertificateArgs) -> Result<(), AnyError> {
    let validator = DateValidator::new(Arc::new(SystemClock), config.certificate.max_advance_days);
    let request = GenerateTemporaryCertificateRequest {
        gss_code: args.gss_code,
        source_reference: args.source_reference,
        elector_name: args.elector_name,
        valid_on_date: args.valid_on_date,
    };
    let dto = request.validate(&validator)?;

    let generator = TemporaryCertificateGenerator::new(
        Arc::new(StaticEroDirectory::new(&config.offices)),
        TemplateRenderer::new(&config.certificate.template_dir),
        validator,
        config.certificate.temporary_certificate_template.clone(),
    );
    let generated = generator.generate(&dto).await?;

    std::fs::create_dir_all(&args.output)?;
    let path = args.output.join(&generated.file_name);
    std::fs::write(&path, &generated.pdf)?;

    info!(
        path = %path.display(),
        certificate_number = %generated.certificate_number,
        "Certificate written"
    );
    Ok(())
}
