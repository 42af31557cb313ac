//! Command-line configuration for the MedScan client.
//!
//! Global options apply to every subcommand and can be set through the
//! environment:
//!
//! - `MEDSCAN_API_URL` - Base URL of the analysis API (default: http://localhost:8000)
//! - `MEDSCAN_CREDENTIAL_DIR` - Directory holding the persisted credential
//!   (default: `<data dir>/medscan`)
//! - `MEDSCAN_TIMEOUT_SECS` - Per-request timeout in seconds (default: 30)
//! - `MEDSCAN_PASSWORD` - Password for `login` and `register`
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use medscan_client::config::Cli;
//!
//! let cli = Cli::parse();
//! cli.validate()?;
//! println!("API: {}", cli.api_url);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use url::Url;

use crate::session::CREDENTIAL_KEY;

// =============================================================================
// Default Values
// =============================================================================

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of history entries printed.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Application directory name under the platform data directory.
const APP_DIR: &str = "medscan";

/// Path argument standing for stdin.
pub const STDIN_MARKER: &str = "-";

// =============================================================================
// CLI Arguments
// =============================================================================

/// MedScan - command-line client for the medical image analysis API.
///
/// Log in, submit chest X-ray images for analysis and browse past
/// predictions.
#[derive(Parser, Debug, Clone)]
#[command(name = "medscan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Base URL of the analysis API.
    #[arg(long, global = true, default_value = DEFAULT_API_URL, env = "MEDSCAN_API_URL")]
    pub api_url: String,

    /// Directory holding the persisted credential.
    #[arg(long, global = true, env = "MEDSCAN_CREDENTIAL_DIR")]
    pub credential_dir: Option<PathBuf>,

    /// Per-request timeout in seconds.
    #[arg(long, global = true, default_value_t = DEFAULT_TIMEOUT_SECS, env = "MEDSCAN_TIMEOUT_SECS")]
    pub timeout_secs: u64,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Log in and persist the session.
    Login(LoginArgs),

    /// Create an account, then log in with it.
    Register(RegisterArgs),

    /// Forget the persisted session.
    Logout,

    /// Show the logged-in user.
    Whoami,

    /// Submit an image for analysis.
    Analyze(AnalyzeArgs),

    /// List past predictions with summary counts.
    History(HistoryArgs),

    /// Show a single past prediction.
    Show(ShowArgs),
}

#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    /// Account email.
    #[arg(long)]
    pub email: String,

    /// Account password.
    #[arg(long, env = "MEDSCAN_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Args, Debug, Clone)]
pub struct RegisterArgs {
    /// Account email, also used to log in.
    #[arg(long)]
    pub email: String,

    /// Display name.
    #[arg(long)]
    pub username: String,

    /// Account password.
    #[arg(long, env = "MEDSCAN_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Image file to analyze, or `-` to read it from stdin.
    pub file: PathBuf,

    /// Declared MIME type. Guessed from the extension (or, for stdin, the
    /// image header) when omitted.
    #[arg(long)]
    pub mime: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    /// Maximum number of entries to print.
    #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
    pub limit: usize,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Prediction id.
    pub id: i64,
}

impl Cli {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        let url = Url::parse(&self.api_url)
            .map_err(|e| format!("Invalid API URL '{}': {}", self.api_url, e))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(format!(
                "API URL must use http or https, got '{}'",
                url.scheme()
            ));
        }

        if self.timeout_secs == 0 {
            return Err("timeout_secs must be greater than 0".to_string());
        }

        match &self.command {
            Command::Login(args) => check_email(&args.email)?,
            Command::Register(args) => {
                check_email(&args.email)?;
                if args.username.trim().is_empty() {
                    return Err("username must not be empty".to_string());
                }
            }
            _ => {}
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Credential directory, falling back to the platform data directory,
    /// then to the current directory.
    pub fn credential_dir(&self) -> PathBuf {
        self.credential_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join(APP_DIR)))
            .unwrap_or_else(|| PathBuf::from(format!(".{}", APP_DIR)))
    }

    /// Full path of the persisted credential file.
    pub fn credential_path(&self) -> PathBuf {
        self.credential_dir().join(CREDENTIAL_KEY)
    }
}

impl AnalyzeArgs {
    /// True when the image is piped in rather than named.
    pub fn reads_stdin(&self) -> bool {
        self.file.as_os_str() == STDIN_MARKER
    }
}

fn check_email(email: &str) -> Result<(), String> {
    let trimmed = email.trim();
    match trimmed.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(format!("'{}' is not a valid email address", email)),
    }
}

// =============================================================================
// Tests
// =============================================================================
