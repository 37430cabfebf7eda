//! Veritas application binary - composition root.
//!
//! `veritas serve` runs the gateway in front of the answering engine.
//! Every other command drives a [`Session`] against a running gateway.

mod chat;
mod cli;

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use veritas_core::config::VeritasConfig;
use veritas_core::FileUpload;
use veritas_gateway::GatewayState;
use veritas_session::confirmation::is_affirmative;
use veritas_session::{AskOutcome, GatewayClient, Job, Session};

use cli::{CliArgs, Command};

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

/// Read each path into an upload, tagging PDFs with their MIME type.
pub(crate) async fn read_uploads(paths: &[PathBuf]) -> AppResult<Vec<FileUpload>> {
    let mut uploads = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "Failed to read file");
            e
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let mut upload = FileUpload::new(file_name, bytes);
        if is_pdf(path) {
            upload = upload.with_content_type("application/pdf");
        }
        uploads.push(upload);
    }
    Ok(uploads)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

pub(crate) fn print_job(job: Option<Job>) {
    match job {
        Some(job) => println!("{}", job.message),
        None => println!("Nothing to do."),
    }
}

pub(crate) fn print_answer(outcome: Option<AskOutcome>, session: &Session<GatewayClient>) {
    match outcome {
        Some(AskOutcome::Answered { answer }) => {
            println!("{}", answer);
            let evidence = session.evidence();
            if !evidence.is_empty() {
                println!();
                println!("Evidence:");
                for (i, snippet) in evidence.snippets().iter().enumerate() {
                    println!("  [{}] {}", i + 1, snippet);
                }
            }
        }
        Some(AskOutcome::Failed) => {
            if let Some(turn) = session.history().last() {
                println!("{}", turn.content);
            }
        }
        None => println!("Nothing to ask."),
    }
}

async fn run_serve(
    config: VeritasConfig,
    host: Option<String>,
    port: Option<u16>,
    engine_url: Option<String>,
) -> AppResult<()> {
    let mut gateway = config.gateway;
    if let Some(host) = host {
        gateway.host = host;
    }
    gateway.port = cli::resolve_port(port, gateway.port);
    gateway.engine_url = cli::resolve_engine_url(engine_url, &gateway.engine_url);

    let state = GatewayState::new(gateway)?;
    veritas_gateway::start_server(state).await?;
    Ok(())
}

async fn run_reset(session: &Session<GatewayClient>, yes: bool) -> AppResult<()> {
    let request = session.request_reset();
    let approved = if yes {
        true
    } else {
        use std::io::Write;
        print!("{} [y/N] ", request.prompt());
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        is_affirmative(&answer)
    };

    match request.answer(approved) {
        Some(confirmed) => println!("{}", session.reset(confirmed).await?.message),
        None => println!("Reset cancelled."),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let loaded = VeritasConfig::load(&config_file);
    let config_level = loaded
        .as_ref()
        .map(|c| c.general.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_tracing(&args.resolve_log_level(&config_level));

    tracing::info!("Starting Veritas v{}", env!("CARGO_PKG_VERSION"));

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %config_file.display(), error = %e, "Using default configuration");
            VeritasConfig::default()
        }
    };

    let gateway_url = args.resolve_gateway_url(&config.client.gateway_url);

    match args.command {
        Command::Serve {
            host,
            port,
            engine_url,
        } => run_serve(config, host, port, engine_url).await,
        command => {
            tracing::debug!(gateway_url = %gateway_url, "Session client configured");
            let session = Session::new(GatewayClient::new(gateway_url)?);
            run_session_command(&session, command).await
        }
    }
}

async fn run_session_command(session: &Session<GatewayClient>, command: Command) -> AppResult<()> {
    match command {
        Command::Serve { .. } => {}
        Command::IngestUrl { url } => print_job(session.ingest_url(&url).await?),
        Command::IngestFiles { paths } => {
            let uploads = read_uploads(&paths).await?;
            print_job(session.ingest_files(&uploads).await?);
        }
        Command::Ask { query } => {
            let outcome = session.ask(&query).await?;
            print_answer(outcome, session);
        }
        Command::Reset { yes } => run_reset(session, yes).await?,
        Command::Chat => chat::run(session).await?,
    }

    Ok(())
}
