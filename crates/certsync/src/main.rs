//! certsync - Main entry point
//!
//! Renews a certificate with acme.sh and publishes it to the gateway's
//! certificate registry.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::DateTime;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, info_span, Instrument};

use certsync::{
    CertificateInspector, OpensslInspector, Orchestrator, ReconcileAction, RunOutcome,
    X509Inspector,
};
use certsync_common::RunId;
use certsync_config::{ConfigOverrides, RenewConfig};

/// certsync - Renew TLS certificates and publish them to a gateway registry
#[derive(Parser, Debug)]
#[command(name = "certsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    args: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Configuration file path (TOML)
    #[arg(long = "config", env = "CERTSYNC_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Path of acme.sh
    #[arg(short = 'a', long = "acme", global = true)]
    acme: Option<PathBuf>,

    /// Directory holding <domain>.cer and <domain>.key
    #[arg(short = 'p', long = "path", global = true)]
    path: Option<PathBuf>,

    /// Registry admin API host, e.g. http://127.0.0.1:9180
    #[arg(
        short = 'x',
        long = "control-host",
        alias = "control_host",
        env = "CERTSYNC_HOST",
        global = true
    )]
    host: Option<String>,

    /// Registry admin API token
    #[arg(
        short = 't',
        long = "token",
        env = "CERTSYNC_TOKEN",
        hide_env_values = true,
        global = true
    )]
    token: Option<String>,

    /// Domain to renew, e.g. *.example.com
    #[arg(short = 'd', long = "domain", env = "CERTSYNC_DOMAIN", global = true)]
    domain: Option<String>,

    /// acme.sh DNS API hook, e.g. dns_cf
    #[arg(short = 'c', long = "dns-channel", alias = "dns_channel", global = true)]
    dns_channel: Option<String>,

    /// Registry request timeout in seconds
    #[arg(long = "timeout", global = true)]
    timeout_secs: Option<u64>,

    /// Re-issue the certificate and create a registry entry if none matches
    #[arg(short = 'f', long = "force", global = true)]
    force: bool,

    /// Use the ACME staging CA with acme.sh debug output
    #[arg(long = "debug", global = true)]
    debug: bool,

    /// How to read the renewed certificate
    #[arg(long = "inspector", value_enum, default_value_t = InspectorKind::X509, global = true)]
    inspector: InspectorKind,

    /// Enable verbose logging (debug level)
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Commands {
    /// Renew with acme.sh and publish to the registry (default)
    Renew,
    /// Publish the certificate already on disk without running acme.sh
    Sync,
    /// Validate configuration and certificate files, then exit
    Check,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum InspectorKind {
    /// Parse the certificate in-process
    X509,
    /// Use the openssl command-line tool
    Openssl,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.args.verbose, cli.args.log_format);

    let config = load_config(&cli.args)?;
    let command = cli.command.unwrap_or(Commands::Renew);

    // `check` never contacts the registry
    let validation = match command {
        Commands::Check => config.ensure_valid_offline(),
        Commands::Renew | Commands::Sync => config.ensure_valid(),
    };
    validation.context("Configuration validation failed")?;

    // Steps are strictly sequential; a single-threaded runtime is enough
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let run_id = RunId::new();
    let span = info_span!("certsync", run_id = %run_id, domain = %config.domain);

    runtime.block_on(execute(command, &config, cli.args.inspector).instrument(span))
}

/// Initialize logging based on flags and `RUST_LOG`
fn init_logging(verbose: bool, format: LogFormat) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

/// Layer defaults, the optional config file and command-line values
fn load_config(args: &RunArgs) -> Result<RenewConfig> {
    let base = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            RenewConfig::from_file(path).context("Failed to load configuration file")?
        }
        None => RenewConfig::default(),
    };

    Ok(base.apply(ConfigOverrides {
        domain: args.domain.clone(),
        cert_path: args.path.clone(),
        acme_script: args.acme.clone(),
        dns_channel: args.dns_channel.clone(),
        host: args.host.clone(),
        token: args.token.clone(),
        timeout_secs: args.timeout_secs,
        force: args.force,
        debug: args.debug,
    }))
}

async fn execute(command: Commands, config: &RenewConfig, inspector: InspectorKind) -> Result<()> {
    let inspector: Box<dyn CertificateInspector> = match inspector {
        InspectorKind::X509 => Box::new(X509Inspector::new()),
        InspectorKind::Openssl => Box::new(OpensslInspector::new()),
    };
    let orchestrator = Orchestrator::new(config)?.with_inspector(inspector);

    match command {
        Commands::Renew => match orchestrator.renew().await? {
            RunOutcome::Synced(outcome) => {
                report_sync(&config.domain, outcome.action, &outcome.id);
            }
            RunOutcome::NotDue => {
                println!(
                    "certsync: certificate for {} is not due for renewal",
                    config.domain
                );
            }
        },
        Commands::Sync => {
            let outcome = orchestrator.sync().await?;
            report_sync(&config.domain, outcome.action, &outcome.id);
        }
        Commands::Check => {
            let bundle = orchestrator.check().await?;
            println!("certsync: certificate for {} is valid", config.domain);
            println!("  - names: {}", bundle.subject_names.join(", "));
            println!("  - not before: {}", format_timestamp(bundle.validity_start));
            println!("  - not after:  {}", format_timestamp(bundle.validity_end));
        }
    }

    Ok(())
}

fn report_sync(domain: &str, action: ReconcileAction, id: &certsync_common::SslId) {
    let verb = match action {
        ReconcileAction::Updated => "updated",
        ReconcileAction::Created => "created",
    };
    info!(id = %id, "Certificate published");
    println!("certsync: {} registry entry {} for {}", verb, id, domain);
}

fn format_timestamp(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}
