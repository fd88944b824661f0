#![forbid(unsafe_code)]

use std::env;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use guide_core::model::{
    AssessmentId, GuideSettingsDraft, MODULE_COUNT, ModuleId, ProgressState, RegistrationDraft,
    SectionId, is_known_module, known_module_ids, module_title,
};
use serde_json::Value;
use services::{AppServices, Clock, GuideConfig, ProgressOrigin, ProgressStore};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "pm-guide",
    version,
    about = "Track progress through the PM Guide learning modules",
    long_about = None
)]
struct Cli {
    /// Persistence mode: `local` (demo auth, records in SQLite) or `remote` (REST API).
    #[arg(long, global = true)]
    mode: Option<String>,

    /// Base URL of the PM Guide API (remote mode).
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// SQLite database for saved sessions and local progress.
    #[arg(long, global = true)]
    db: Option<String>,

    /// HTTP request timeout in seconds.
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Continue without signing in and skip the sign-in prompt.
    #[arg(long, global = true)]
    browse: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the signed-in user and overall progress.
    Status,
    /// List the learning modules and whether each is complete.
    Modules,
    /// Mark a section of a module complete.
    Toggle {
        section: String,
        module: String,
        /// Mark the section incomplete instead.
        #[arg(long)]
        undo: bool,
    },
    /// Record an assessment score.
    Assess {
        id: String,
        score: f64,
        /// Answers as a JSON document.
        #[arg(long, default_value = "{}")]
        answers: String,
    },
    /// Sign in with email and password.
    Login { email: String, password: String },
    /// Create an account and sign in.
    Register {
        name: String,
        email: String,
        password: String,
    },
    /// Forget the saved session.
    Logout,
}

impl Cli {
    fn overrides(&self) -> GuideSettingsDraft {
        GuideSettingsDraft {
            mode: self.mode.clone(),
            api_base_url: self.api_url.clone(),
            database_url: self.db.clone().map(normalize_sqlite_url),
            http_timeout_secs: self.timeout,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PM_GUIDE_LOG")
        .unwrap_or_else(|_| EnvFilter::new("pm_guide=info,services=info,storage=warn,warn"));

    let format = env::var("PM_GUIDE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") || raw.starts_with("sqlite:file:") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

// sqlx does not create missing database files on its own.
fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let Some(path) = db_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(format!("invalid database URL: {db_url}").into());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

fn print_progress(
    progress: &ProgressStore,
    browsing: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = progress.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!(
        "Overall progress: {:.2}% ({} of {} modules)",
        snapshot.total_progress,
        snapshot.completed_module_count(),
        MODULE_COUNT
    );
    match progress.origin() {
        ProgressOrigin::Fallback => println!("(saved progress could not be loaded)"),
        ProgressOrigin::Ephemeral if !progress.is_signed_in() => {
            if browsing {
                println!("(browsing without an account; progress is not saved)");
            } else {
                println!("Sign in with `pm-guide login <email> <password>` to save progress, or pass --browse.");
            }
        }
        _ => {}
    }
    if !snapshot.assessment_scores.is_empty() {
        println!("Assessments:");
        for result in &snapshot.assessment_scores {
            println!("  {:<24} {:.1}", result.assessment_id, result.score);
        }
    }
    Ok(())
}

fn print_modules(snapshot: &ProgressState) {
    for id in known_module_ids() {
        let done = snapshot.is_module_completed(&id);
        let title = module_title(&id).unwrap_or_default();
        println!("[{}] {:<16} {title}", if done { "x" } else { " " }, id.as_str());
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    let settings = GuideConfig::from_env()?
        .with_overrides(cli.overrides())
        .into_settings()?;
    debug!(mode = %settings.mode(), db = settings.database_url(), "settings resolved");

    prepare_sqlite_file(settings.database_url())?;
    let app = AppServices::new_sqlite(settings, Clock::system()).await?;
    if cli.browse {
        app.auth().enable_browse_mode().await?;
    }
    let session = app.start().await?;
    let progress = app.progress();
    let browsing = app.auth().browse_mode().await?;

    match cli.command {
        Commands::Status => {
            match &session {
                Some(session) => println!(
                    "Signed in as {} <{}> ({} mode)",
                    session.identity.name,
                    session.identity.email,
                    app.settings().mode()
                ),
                None => println!("Not signed in ({} mode)", app.settings().mode()),
            }
            print_progress(&progress, browsing, cli.json)?;
        }
        Commands::Modules => {
            if cli.json {
                print_progress(&progress, browsing, true)?;
            } else {
                print_modules(&progress.snapshot());
            }
        }
        Commands::Toggle {
            section,
            module,
            undo,
        } => {
            let section = SectionId::new(section)?;
            let module = ModuleId::new(module)?;
            if !is_known_module(&module) {
                warn!(%module, "module is not part of the course and does not count toward overall progress");
            }
            progress.toggle_section(&section, &module, !undo).await?;
            info!(%section, %module, completed = !undo, "section updated");
            print_progress(&progress, browsing, cli.json)?;
        }
        Commands::Assess { id, score, answers } => {
            let id = AssessmentId::new(id)?;
            let answers: Value = serde_json::from_str(&answers)?;
            progress.submit_assessment(&id, answers, score).await?;
            print_progress(&progress, browsing, cli.json)?;
        }
        Commands::Login { email, password } => {
            let session = app.login(&email, &password).await?;
            println!("Signed in as {}", session.identity.name);
            print_progress(&progress, browsing, cli.json)?;
        }
        Commands::Register {
            name,
            email,
            password,
        } => {
            let session = app
                .register(RegistrationDraft {
                    name,
                    email,
                    password,
                })
                .await?;
            println!("Registered and signed in as {}", session.identity.name);
        }
        Commands::Logout => {
            app.logout().await?;
            println!("Signed out");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browse_is_a_global_flag() {
        let cli = Cli::try_parse_from(["pm-guide", "status", "--browse"]).unwrap();
        assert!(cli.browse);
        assert!(matches!(cli.command, Commands::Status));

        assert!(Cli::try_parse_from(["pm-guide", "browse"]).is_err());
    }

    #[test]
    fn flags_become_setting_overrides() {
        let cli = Cli::try_parse_from([
            "pm-guide",
            "--mode",
            "remote",
            "--timeout",
            "9",
            "toggle",
            "basics-1",
            "pm-basics",
            "--undo",
        ])
        .unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.mode.as_deref(), Some("remote"));
        assert_eq!(overrides.http_timeout_secs, Some(9));
        assert!(matches!(cli.command, Commands::Toggle { undo: true, .. }));
    }

    #[test]
    fn in_memory_url_passes_through() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
        assert!(normalize_sqlite_url("guide.db".into()).starts_with("sqlite:///"));
    }
}
