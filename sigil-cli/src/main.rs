//! Sigil CLI - Operator tooling for signed sessions
//!
//! Manages the configuration file, decodes cookie-backend identifiers and maintains the
//! SQLite session store

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use sigil_core::{
    init_logging, log_operation_error, log_operation_start, log_operation_success, performance,
    BackendKind, SigilConfig,
};
use sigil_session::{
    Clock, CookieBackend, RecordStore, SignatureError, SqliteRecordStore, SystemClock,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "sigil")]
#[command(about = "Inspect and maintain signed session stores")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Write a default configuration file
        #[arg(long)]
        init: bool,

        /// Validate current configuration
        #[arg(long)]
        validate: bool,
    },

    /// Verify a cookie-backend session value and print its contents
    Inspect {
        /// The cookie value (without the `name=` prefix)
        cookie: String,

        /// Override the configured max age in seconds
        #[arg(long)]
        max_age: Option<i64>,
    },

    /// Delete expired rows from the session store
    Sweep,

    /// Show session store statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_ref())?;
    config
        .apply_env()
        .context("Invalid environment override")?;

    let mut logging_config = config.logging.clone();
    if cli.verbose {
        logging_config.level = "debug".to_string();
    }
    init_logging(&logging_config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting sigil v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Config {
            show,
            init,
            validate,
        } => handle_config(show, init, validate, &config, cli.config.as_ref())?,
        Commands::Inspect { cookie, max_age } => handle_inspect(&cookie, max_age, &config)?,
        Commands::Sweep => handle_sweep(&config).await?,
        Commands::Stats => handle_stats(&config).await?,
    }

    Ok(())
}

fn load_config(config_path: Option<&PathBuf>) -> anyhow::Result<SigilConfig> {
    if let Some(path) = config_path {
        return SigilConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path));
    }

    let default_paths = [
        dirs::config_dir().map(|d| d.join("sigil").join("config.toml")),
        dirs::home_dir().map(|d| d.join(".sigil").join("config.toml")),
        Some(PathBuf::from("sigil.toml")),
    ];

    for path in default_paths.iter().flatten() {
        if path.exists() {
            return SigilConfig::from_file(path)
                .with_context(|| format!("Failed to load configuration from {:?}", path));
        }
    }

    Ok(SigilConfig::default())
}

fn default_config_path() -> anyhow::Result<PathBuf> {
    let base = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|d| d.join(".config")))
        .context("Could not determine a configuration directory")?;
    Ok(base.join("sigil").join("config.toml"))
}

fn handle_config(
    show: bool,
    init: bool,
    validate: bool,
    config: &SigilConfig,
    config_path: Option<&PathBuf>,
) -> anyhow::Result<()> {
    if init {
        let path = match config_path {
            Some(path) => path.clone(),
            None => default_config_path()?,
        };
        if path.exists() {
            bail!("Configuration already exists at {:?}", path);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        SigilConfig::default().save_to_file(&path)?;
        println!("✅ Configuration initialized at: {:?}", path);
        println!("📝 Replace session.secret_key before using it in production.");
    }

    if show {
        let mut shown = config.clone();
        shown.session.secret_key = "**********".to_string();
        println!("📋 Current configuration:");
        println!("{}", toml::to_string_pretty(&shown)?);
    }

    if validate {
        match config.validate() {
            Ok(()) => println!("✅ Configuration is valid"),
            Err(e) => {
                e.log();
                println!("❌ Configuration validation failed: {}", e);
                return Err(e.into());
            }
        }
    }

    Ok(())
}

fn handle_inspect(cookie: &str, max_age: Option<i64>, config: &SigilConfig) -> anyhow::Result<()> {
    let max_age = max_age.unwrap_or(config.session.max_age);
    log_operation_start!("inspect_cookie", max_age = max_age);

    if config.session.backend == BackendKind::Database {
        println!("ℹ️  Configured backend is 'database'; the value is checked as a cookie-backend session.");
    }

    let backend = CookieBackend::new(config.session.secret_key.as_str(), max_age);
    match backend.verify(cookie.trim()) {
        Ok(data) => {
            log_operation_success!("inspect_cookie", keys = data.len());
            println!("✅ Valid session ({} keys)", data.len());
            println!("{}", serde_json::to_string_pretty(&data)?);
            Ok(())
        }
        Err(e) => {
            log_operation_error!("inspect_cookie", e);
            match e {
                SignatureError::SignatureExpired { age, max_age } => {
                    println!("⌛ Session expired ({}s old, max age {}s)", age, max_age)
                }
                SignatureError::BadSignature(reason) => {
                    println!("❌ Invalid session: {}", reason)
                }
            }
            bail!("session value is invalid or expired")
        }
    }
}

/// Connect to the configured store, or `None` when the cookie backend keeps nothing server side
async fn open_store(config: &SigilConfig) -> anyhow::Result<Option<SqliteRecordStore>> {
    if config.session.backend != BackendKind::Database {
        println!("ℹ️  Configured backend is 'cookie'; nothing is stored server side.");
        return Ok(None);
    }

    let store = SqliteRecordStore::connect(&config.database.url)
        .await
        .with_context(|| format!("Failed to open session store {}", config.database.url))?;
    Ok(Some(store))
}

async fn handle_sweep(config: &SigilConfig) -> anyhow::Result<()> {
    let Some(store) = open_store(config).await? else {
        return Ok(());
    };
    log_operation_start!("sweep", url = %config.database.url);

    let now = SystemClock.now();
    let removed = performance::measure_async("purge_expired", store.purge_expired(now))
        .await
        .map_err(|e| {
            log_operation_error!("sweep", e);
            e
        })?;
    let remaining = store.count().await?;

    log_operation_success!("sweep", removed = removed, remaining = remaining);
    println!("🧹 Removed {} expired sessions, {} remaining", removed, remaining);
    Ok(())
}

async fn handle_stats(config: &SigilConfig) -> anyhow::Result<()> {
    let Some(store) = open_store(config).await? else {
        return Ok(());
    };
    let total = store.count().await?;

    println!("📊 Session store: {}", config.database.url);
    println!("   Stored sessions: {}", total);
    println!("   Max age:         {}s", config.session.max_age);
    println!("   Expired rows:    {:?}", config.session.expired_rows);
    Ok(())
}
