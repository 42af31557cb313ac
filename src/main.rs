//! MedScan - command-line client for the medical image analysis API.
//!
//! This binary wires the session store, gateway and controllers together
//! and dispatches the subcommands.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use medscan_client::{
    analysis::{preview, read_capped, Panel, Preview},
    config::{AnalyzeArgs, Cli, Command, HistoryArgs, LoginArgs, RegisterArgs, ShowArgs},
    AnalysisController, AttemptOutcome, AuthController, FileCredentialStorage, HistoryService,
    HistorySummary, HttpTransport, PredictionRecord, RehydrateOutcome, RequestGateway,
    ResultReport, SessionStore, UploadCandidate, UploadValidator, WorkflowState,
};

/// File name reported for images read from stdin.
const STDIN_NAME: &str = "stdin";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if let Err(e) = cli.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let app = match App::connect(&cli).await {
        Ok(app) => app,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Login(args) => app.login(args).await,
        Command::Register(args) => app.register(args).await,
        Command::Logout => app.logout().await,
        Command::Whoami => app.whoami().await,
        Command::Analyze(args) => app.analyze(args).await,
        Command::History(args) => app.history(args).await,
        Command::Show(args) => app.show(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "medscan_client=debug,medscan=debug"
    } else {
        "medscan_client=info,medscan=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Application
// =============================================================================

struct App {
    base_url: Url,
    auth: AuthController<HttpTransport>,
    analysis: AnalysisController<HttpTransport>,
    history: HistoryService<HttpTransport>,
}

impl App {
    async fn connect(cli: &Cli) -> Result<Self, String> {
        let transport = HttpTransport::new(&cli.api_url, cli.timeout())
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;
        let base_url = transport.base_url().clone();

        debug!(
            api_url = %base_url,
            credential_file = %cli.credential_path().display(),
            "Client configured"
        );

        let storage = Arc::new(FileCredentialStorage::new(cli.credential_dir()));
        let session = Arc::new(SessionStore::open(storage).await);
        let gateway = Arc::new(RequestGateway::new(transport, session));

        Ok(Self {
            base_url,
            auth: AuthController::new(gateway.clone()),
            analysis: AnalysisController::new(gateway.clone()),
            history: HistoryService::new(gateway),
        })
    }

    /// Restore the persisted session, failing if there is none.
    async fn require_session(&self) -> Result<(), String> {
        match self.auth.rehydrate().await {
            RehydrateOutcome::Restored(identity) => {
                debug!(username = %identity.username, "Session restored");
                Ok(())
            }
            RehydrateOutcome::NoSession => {
                Err("Not logged in. Run `medscan login` first.".to_string())
            }
            outcome @ RehydrateOutcome::Expired { .. } => Err(outcome
                .notice()
                .unwrap_or_default()
                .to_string()),
        }
    }

    /// Resolve a served image reference against the API base URL.
    fn resolve(&self, reference: &str) -> String {
        self.base_url
            .join(reference.trim_start_matches('/'))
            .map(|url| url.to_string())
            .unwrap_or_else(|_| reference.to_string())
    }

    // =========================================================================
    // Account Commands
    // =========================================================================

    async fn login(&self, args: LoginArgs) -> Result<(), String> {
        let identity = self
            .auth
            .login(&args.email, &args.password)
            .await
            .map_err(|e| format!("Login failed: {}", e))?;

        println!("Logged in as {} <{}>", identity.username, identity.email);
        Ok(())
    }

    async fn register(&self, args: RegisterArgs) -> Result<(), String> {
        let identity = self
            .auth
            .register(&args.email, &args.username, &args.password)
            .await
            .map_err(|e| format!("Registration failed: {}", e))?;

        println!(
            "Registered and logged in as {} <{}>",
            identity.username, identity.email
        );
        Ok(())
    }

    async fn logout(&self) -> Result<(), String> {
        self.auth.logout().await;
        println!("Logged out");
        Ok(())
    }

    async fn whoami(&self) -> Result<(), String> {
        self.require_session().await?;

        let identity = self
            .auth
            .current_identity()
            .ok_or_else(|| "Not logged in".to_string())?;
        println!("{} <{}> (id {})", identity.username, identity.email, identity.id);
        Ok(())
    }

    // =========================================================================
    // Analyze Command
    // =========================================================================

    async fn analyze(&self, args: AnalyzeArgs) -> Result<(), String> {
        self.require_session().await?;

        let candidate = load_candidate(args).await?;

        match self.analysis.select_file(candidate).await {
            AttemptOutcome::Completed(WorkflowState::Succeeded(result)) => {
                self.print_report(&ResultReport::from_result(&result));
                Ok(())
            }
            AttemptOutcome::Completed(WorkflowState::Failed(reason)) => {
                debug!("Analysis failed: {}", reason);
                Err(reason.user_message())
            }
            AttemptOutcome::Completed(state) => {
                Err(format!("Analysis ended in unexpected state '{}'", state.name()))
            }
            AttemptOutcome::Superseded => Err("Analysis was superseded".to_string()),
        }
    }

    fn print_report(&self, report: &ResultReport) {
        println!("Prediction:  {}", report.label);
        println!("Confidence:  {}", report.confidence_label());
        println!("Heatmap:     {}", self.panel_text(&report.heatmap, "Heatmap"));
        println!(
            "Segmentation: {}",
            self.panel_text(&report.segmentation, "Segmentation")
        );
        println!();
        println!("{}", report.summary);
    }

    fn panel_text(&self, panel: &Panel, what: &str) -> String {
        match panel.uri() {
            Some(uri) => self.resolve(uri),
            None => panel.placeholder(what).unwrap_or_default(),
        }
    }

    // =========================================================================
    // History Commands
    // =========================================================================

    async fn history(&self, args: HistoryArgs) -> Result<(), String> {
        self.require_session().await?;

        let records = self
            .history
            .history()
            .await
            .map_err(|e| format!("Failed to fetch history: {}", e))?;

        let summary = HistorySummary::from_records(&records);
        println!(
            "Total analyses: {}  Normal: {}  Abnormal: {}",
            summary.total, summary.normal, summary.abnormal
        );

        if records.is_empty() {
            println!("(no predictions yet)");
            return Ok(());
        }

        println!();
        for record in records.iter().take(args.limit) {
            println!("{}", record_line(record));
        }
        if records.len() > args.limit {
            println!("... {} more", records.len() - args.limit);
        }
        Ok(())
    }

    async fn show(&self, args: ShowArgs) -> Result<(), String> {
        self.require_session().await?;

        let record = self
            .history
            .prediction(args.id)
            .await
            .map_err(|e| format!("Failed to fetch prediction {}: {}", args.id, e))?;

        println!("{}", record_line(&record));
        if let Some(heatmap) = &record.heatmap_ref {
            println!("  Heatmap:      {}", self.resolve(heatmap));
        }
        if let Some(segmentation) = &record.segmentation_ref {
            println!("  Segmentation: {}", self.resolve(segmentation));
        }
        Ok(())
    }
}

/// Build the upload candidate from a path or stdin.
///
/// Accepted files are loaded once, for the preview and the upload. A file
/// the validator rejects is passed on unread so the workflow reports why.
async fn load_candidate(args: AnalyzeArgs) -> Result<UploadCandidate, String> {
    let validator = UploadValidator::default();

    if args.reads_stdin() {
        // Oversized input stops one byte past the limit and is rejected as
        // too large by the workflow.
        let contents = read_capped(tokio::io::stdin(), validator.max_bytes())
            .await
            .map_err(|e| format!("Failed to read stdin: {}", e))?;

        let header = preview(&contents);
        let mime = args
            .mime
            .or_else(|| header.as_ref().map(|p| p.mime_type.to_string()))
            .unwrap_or_else(|| "application/octet-stream".to_string());
        log_preview(STDIN_NAME, header);
        return Ok(UploadCandidate::from_bytes(STDIN_NAME, mime, contents));
    }

    let candidate = UploadCandidate::from_path(&args.file, args.mime)
        .await
        .map_err(|e| e.to_string())?;

    if validator.validate(&candidate).is_err() {
        return Ok(candidate);
    }

    match candidate.contents(validator.max_bytes()).await {
        Ok(contents) => {
            log_preview(&candidate.file_name, preview(&contents));
            Ok(UploadCandidate::from_bytes(
                candidate.file_name,
                candidate.declared_mime,
                contents,
            ))
        }
        Err(e) => {
            debug!("Preview skipped: {}", e);
            Ok(candidate)
        }
    }
}

fn log_preview(file: &str, header: Option<Preview>) {
    match header {
        Some(p) => info!(
            file,
            format = p.mime_type,
            width = p.width,
            height = p.height,
            "Submitting image"
        ),
        None => warn!(file, "Could not read image header"),
    }
}

fn record_line(record: &PredictionRecord) -> String {
    format!(
        "#{:<5} {}  {:<12} {:>3}%",
        record.id,
        record.created_at.format("%Y-%m-%d %H:%M"),
        record.prediction_label,
        medscan_client::analysis::confidence_percent(record.confidence)
    )
}
