//! CLI entrypoint for ims-rater
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use rater_application::{
    AuditLogger, CalculateRaterInput, CalculateRaterUseCase, CalculationContext, NoAuditLogger,
    ProcessSubmissionUseCase, ProgressNotifier, RaterWorkbook, ResolvePremiumInput,
    ResolvePremiumUseCase,
};
use rater_domain::{PolicyTerm, PremiumMapping, SubmissionForm, SubmissionId, SubmissionStatus, build_mapping};
use rater_infrastructure::{
    CalculationRegistry, ConfigLoader, FileConfig, HttpSoapTransport, ImsClient, ImsSoapGateway,
    JsonFileStore, JsonlAuditLogger, OoxmlRaterWorkbook, TokenCache,
};
use rater_presentation::{
    Cli, Command, ConsoleFormatter, JsonFormatter, OutputFormat, OutputFormatter,
    ProgressReporter, SimpleProgress,
};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Handle --show-config before anything else
    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_ref());
        let config = load_config(&cli)?;
        println!();
        println!("{}", toml::to_string_pretty(&config.redacted())?);
        return Ok(ExitCode::SUCCESS);
    }

    let config = load_config(&cli)?;
    config.validate()?;

    let log_file = cli.log_file.clone().or_else(|| config.logging.file.clone());
    let _guard = init_tracing(cli.verbose, log_file.as_deref())?;

    info!("Starting ims-rater");

    let Some(command) = cli.command.clone() else {
        eprintln!("No command given; see --help");
        return Ok(ExitCode::from(2));
    };

    let formatter: Box<dyn OutputFormatter> = match cli.output {
        OutputFormat::Text => Box::new(ConsoleFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    };

    match command {
        Command::Process { submission_id } => {
            process(&cli, &config, formatter.as_ref(), &submission_id).await
        }
        Command::Populate {
            template,
            applicant,
            out,
            sheet,
        } => {
            let sheet = sheet.unwrap_or_else(|| config.rater.sheet.clone());
            populate(formatter.as_ref(), &template, &applicant, &out, &sheet).await
        }
        Command::Calculate { method, input, out } => {
            let use_case = CalculateRaterUseCase::new(
                Arc::new(OoxmlRaterWorkbook::new()),
                Arc::new(CalculationRegistry::from_config(&config.calculation)),
            );
            let bytes = read(&input).await?;
            let prepared = use_case
                .execute(CalculateRaterInput {
                    template: &bytes,
                    method: method.into(),
                    context: CalculationContext {
                        sheet: config.rater.sheet.clone(),
                        ..Default::default()
                    },
                })
                .await;
            write(&out, &prepared.workbook).await?;
            println!("{}", formatter.rater(&prepared.outcome, &prepared.warnings, &out));
            Ok(if prepared.outcome.calculated {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Premium { template, mappings } => {
            let mappings = mappings
                .iter()
                .map(|m| m.parse::<PremiumMapping>())
                .collect::<Result<Vec<_>, _>>()?;
            let bytes = read(&template).await?;
            // Template scan only: no supplementary remote lookups
            let resolver =
                ResolvePremiumUseCase::new(gateway(&config)?, Arc::new(OoxmlRaterWorkbook::new()))
                    .with_queries(Vec::new());
            let resolution = resolver
                .execute(ResolvePremiumInput {
                    calculated_template: Some(&bytes),
                    premium_mappings: &mappings,
                    ..Default::default()
                })
                .await;
            println!("{}", formatter.premium(&resolution));
            Ok(if resolution.is_resolved() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn load_config(cli: &Cli) -> Result<FileConfig> {
    if cli.no_config {
        return Ok(ConfigLoader::load_defaults());
    }
    ConfigLoader::load(cli.config.as_ref()).context("Failed to load configuration")
}

/// Console diagnostics on stderr, plus an optional plain-text log file.
///
/// The returned guard flushes the file writer when dropped.
fn init_tracing(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            std::fs::create_dir_all(directory)
                .with_context(|| format!("Cannot create log directory {}", directory.display()))?;
            let file_name = path
                .file_name()
                .context("Log file path has no file name")?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}

// === Dependency Injection ===

fn gateway(config: &FileConfig) -> Result<Arc<ImsSoapGateway>> {
    let transport = HttpSoapTransport::new(config.ims.timeout())?;
    let tokens = Arc::new(TokenCache::new(config.ims.token_ttl()));
    let client = ImsClient::new(config.ims.to_connection(), Arc::new(transport), tokens);
    Ok(Arc::new(ImsSoapGateway::new(client)))
}

fn audit_logger(config: &FileConfig) -> Arc<dyn AuditLogger> {
    match &config.logging.audit_file {
        Some(path) => match JsonlAuditLogger::new(path) {
            Some(logger) => Arc::new(logger),
            None => {
                warn!("Audit log {} could not be opened; audit events are dropped", path.display());
                Arc::new(NoAuditLogger)
            }
        },
        None => Arc::new(NoAuditLogger),
    }
}

async fn process(
    cli: &Cli,
    config: &FileConfig,
    formatter: &dyn OutputFormatter,
    submission_id: &str,
) -> Result<ExitCode> {
    config.validate_for_processing()?;
    let id = SubmissionId::parse(submission_id)?;

    let use_case = ProcessSubmissionUseCase::new(
        gateway(config)?,
        Arc::new(JsonFileStore::new(&config.store.directory)),
        Arc::new(OoxmlRaterWorkbook::new()),
        Arc::new(CalculationRegistry::from_config(&config.calculation)),
    )
    .with_audit_logger(audit_logger(config))
    .with_params(config.processing_params());

    // Spinners would interleave with JSON on the same terminal
    let progress: Box<dyn ProgressNotifier> = if cli.quiet {
        Box::new(rater_application::NoProgress)
    } else if cli.output == OutputFormat::Json {
        Box::new(SimpleProgress)
    } else {
        Box::new(ProgressReporter::new())
    };

    let submission = use_case
        .execute_with_progress(&id, progress.as_ref())
        .await
        .with_context(|| format!("Submission {id} could not be processed"))?;

    println!("{}", formatter.submission(&submission));
    Ok(match submission.status {
        SubmissionStatus::Failed => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}

async fn populate(
    formatter: &dyn OutputFormatter,
    template: &Path,
    applicant: &Path,
    out: &Path,
    sheet: &str,
) -> Result<ExitCode> {
    let form: SubmissionForm = serde_json::from_slice(&read(applicant).await?)
        .with_context(|| format!("{} is not a submission form", applicant.display()))?;
    let term = PolicyTerm::annual(Utc::now().date_naive());
    let mapping = build_mapping(
        &form.applicant,
        &form.custom,
        Some(term.effective),
        Some(term.expiration),
    );

    let bytes = read(template).await?;
    let populated = OoxmlRaterWorkbook::new().try_populate(&bytes, &mapping, sheet)?;
    write(out, &populated).await?;

    println!("{}", formatter.populated(&mapping, out));
    Ok(ExitCode::SUCCESS)
}

async fn read(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Cannot read {}", path.display()))
}

async fn write(path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Cannot write {}", path.display()))
}
