// # dyndns53
//
// Points one DNS record at this machine's current public IP, then exits.
//
// Run it from cron or a systemd timer; each invocation does at most one
// upsert and never retries.
//
// ## Configuration
//
// Every flag can also be set through the environment:
//
// | Flag                 | Environment               | Default                          |
// |----------------------|---------------------------|----------------------------------|
// | `--name`             | `DYNDNS_NAME`             | required, must end with `.`      |
// | `--type`             | `DYNDNS_TYPE`             | `A`                              |
// | `--ttl`              | `DYNDNS_TTL`              | `300`                            |
// | `--zone`             | `DYNDNS_ZONE`             | required for Route 53            |
// | `--provider`         | `DYNDNS_PROVIDER`         | `route53`                        |
// | `--profile`          | `DYNDNS_PROFILE`          | `dyndns53`                       |
// | `--credentials-file` | `DYNDNS_CREDENTIALS_FILE` | `~/.aws/credentials`             |
// | `--region`           | `DYNDNS_REGION`           | `us-east-1`                      |
// | `--cloudflare-token` | `DYNDNS_CLOUDFLARE_TOKEN` |                                  |
// | `--ip-url`           | `DYNDNS_IP_URL`           | `http://checkip.amazonaws.com/`  |
// | `--ip-timeout`       | `DYNDNS_IP_TIMEOUT`       | `10`                             |
// | `--cache-file`       | `DYNDNS_CACHE_FILE`       | none (compare against DNS)       |
// | `--cache-max-age`    | `DYNDNS_CACHE_MAX_AGE`    | none (entries never expire)      |
// | `--comment`          | `DYNDNS_COMMENT`          | `dyndns53`                       |
// | `--dry-run`          | `DYNDNS_DRY_RUN`          |                                  |
// | `--force`            | `DYNDNS_FORCE`            |                                  |
// | `--log-level`        | `DYNDNS_LOG_LEVEL`        | `info`                           |
//
// ## Example
//
// ```bash
// dyndns53 -n home.example.com. -z Z0123456789ABC
// ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, ValueEnum};
use dyndns_core::config::{
    DEFAULT_IP_URL, DEFAULT_PROFILE, DEFAULT_TTL, EngineConfig, IpSourceConfig, StateStoreConfig,
};
use dyndns_core::{DdnsConfig, DdnsEngine, ProviderConfig, ProviderRegistry, RecordSet, SyncOutcome};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

const PROG_NAME: &str = "dyndns53";

/// Exit codes for different termination scenarios
///
/// - 0: Record is current (updated or nothing to do)
/// - 1: Usage or configuration error
/// - 2: Runtime error (IP lookup, provider API, cache)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DyndnsExitCode {
    Success = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<DyndnsExitCode> for ExitCode {
    fn from(code: DyndnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProviderKind {
    Route53,
    Cloudflare,
}

/// Update a DNS record to this machine's public IP address
#[derive(Debug, Parser)]
#[command(name = PROG_NAME, version, about)]
struct Cli {
    /// Record set name (fully qualified, must end with a ".")
    #[arg(short, long, env = "DYNDNS_NAME", default_value = "")]
    name: String,

    /// Record set type: A or AAAA
    #[arg(short = 't', long = "type", env = "DYNDNS_TYPE", default_value = "A")]
    record_type: String,

    /// Record set TTL in seconds
    #[arg(long, env = "DYNDNS_TTL", default_value_t = DEFAULT_TTL, allow_hyphen_values = true)]
    ttl: i64,

    /// Hosted zone id
    #[arg(short, long, env = "DYNDNS_ZONE", default_value = "")]
    zone: String,

    /// DNS provider
    #[arg(long, env = "DYNDNS_PROVIDER", value_enum, default_value_t = ProviderKind::Route53)]
    provider: ProviderKind,

    /// Profile in the AWS shared credentials file
    #[arg(long, env = "DYNDNS_PROFILE", default_value = DEFAULT_PROFILE)]
    profile: String,

    /// AWS shared credentials file [default: ~/.aws/credentials]
    #[arg(long, env = "DYNDNS_CREDENTIALS_FILE")]
    credentials_file: Option<PathBuf>,

    /// AWS signing region [default: us-east-1]
    #[arg(long, env = "DYNDNS_REGION")]
    region: Option<String>,

    /// Cloudflare API token
    #[arg(long, env = "DYNDNS_CLOUDFLARE_TOKEN", hide_env_values = true)]
    cloudflare_token: Option<String>,

    /// URL returning the public IP as plain text
    #[arg(long, env = "DYNDNS_IP_URL", default_value = DEFAULT_IP_URL)]
    ip_url: String,

    /// Timeout for the IP lookup in seconds
    #[arg(long, env = "DYNDNS_IP_TIMEOUT", default_value_t = 10)]
    ip_timeout: u64,

    /// Cache file remembering the last IP written
    #[arg(long, env = "DYNDNS_CACHE_FILE")]
    cache_file: Option<PathBuf>,

    /// Ignore cache entries older than this many seconds
    #[arg(long, env = "DYNDNS_CACHE_MAX_AGE")]
    cache_max_age: Option<u64>,

    /// Comment attached to the change [default: dyndns53]
    #[arg(long, env = "DYNDNS_COMMENT")]
    comment: Option<String>,

    /// Log the change instead of sending it
    #[arg(long, env = "DYNDNS_DRY_RUN")]
    dry_run: bool,

    /// Upsert even if the record already holds the current IP
    #[arg(long, env = "DYNDNS_FORCE")]
    force: bool,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, env = "DYNDNS_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Cli {
    /// Turn the parsed flags into a validated configuration
    fn to_config(&self) -> dyndns_core::Result<DdnsConfig> {
        let record = RecordSet::from_parts(&self.name, &self.record_type, self.ttl, &self.zone)?;

        let provider = match self.provider {
            ProviderKind::Route53 => ProviderConfig::Route53 {
                profile: self.profile.clone(),
                credentials_file: self.credentials_file.clone(),
                region: self.region.clone(),
            },
            ProviderKind::Cloudflare => ProviderConfig::Cloudflare {
                api_token: self.cloudflare_token.clone().unwrap_or_default(),
            },
        };

        let state_store = match &self.cache_file {
            Some(path) => StateStoreConfig::File { path: path.clone() },
            None => StateStoreConfig::None,
        };

        let config = DdnsConfig {
            record,
            ip_source: IpSourceConfig::Http {
                url: self.ip_url.clone(),
                timeout_secs: self.ip_timeout,
            },
            provider,
            state_store,
            engine: EngineConfig {
                dry_run: self.dry_run,
                force: self.force,
                comment: self.comment.clone(),
                cache_max_age_secs: self.cache_max_age,
            },
        };

        config.validate()?;
        Ok(config)
    }
}

fn parse_log_level(level: &str) -> Option<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Exit code for a failed run
fn exit_code_for(err: &anyhow::Error) -> DyndnsExitCode {
    match err.downcast_ref::<dyndns_core::Error>() {
        Some(e) if e.is_usage_error() => DyndnsExitCode::ConfigError,
        _ => DyndnsExitCode::RuntimeError,
    }
}

fn main() -> ExitCode {
    // Bare invocation prints usage rather than complaining about --name.
    if std::env::args_os().len() <= 1 && std::env::var_os("DYNDNS_NAME").is_none() {
        eprintln!("{}", Cli::command().render_help());
        return DyndnsExitCode::ConfigError.into();
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                DyndnsExitCode::ConfigError.into()
            } else {
                DyndnsExitCode::Success.into()
            };
        }
    };

    let Some(log_level) = parse_log_level(&cli.log_level) else {
        eprintln!(
            "{}: invalid log level: {} (valid: trace, debug, info, warn, error)",
            PROG_NAME, cli.log_level
        );
        return DyndnsExitCode::ConfigError.into();
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DyndnsExitCode::ConfigError.into();
    }

    let config = match cli.to_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", PROG_NAME, e);
            return DyndnsExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DyndnsExitCode::RuntimeError.into();
        }
    };

    match rt.block_on(run(config)) {
        Ok(outcome) => {
            report(&outcome);
            DyndnsExitCode::Success.into()
        }
        Err(e) => {
            let code = exit_code_for(&e);
            if code == DyndnsExitCode::ConfigError {
                eprintln!("{}: {}", PROG_NAME, e.root_cause());
            } else {
                error!("{:#}", e);
            }
            code.into()
        }
    }
}

/// Wire up the components and run the engine once
async fn run(config: DdnsConfig) -> Result<SyncOutcome> {
    let registry = ProviderRegistry::new();
    dyndns_ip_http::register(&registry);

    #[cfg(feature = "route53")]
    dyndns_provider_route53::register(&registry);

    #[cfg(feature = "cloudflare")]
    dyndns_provider_cloudflare::register(&registry);

    debug!("Registered providers: {:?}", registry.list_providers());

    let ip_source = registry
        .create_ip_source(&config.ip_source, config.record.record_type.ip_version())
        .context("creating IP source")?;

    let provider = registry
        .create_provider(&config.provider)
        .await
        .with_context(|| format!("creating {} provider", config.provider.type_name()))?;

    let state_store = dyndns_core::state::open(&config.state_store)
        .await
        .context("opening cache")?;

    info!(
        "Syncing {} {} via {}",
        config.record.name,
        config.record.record_type,
        provider.provider_name()
    );

    let engine = DdnsEngine::new(
        ip_source,
        provider,
        Box::new(dyndns_core::SystemResolver::new()),
        state_store,
        config,
    )?;

    Ok(engine.run_once().await?)
}

/// Print the result of a run that changed (or would change) something
fn report(outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Unchanged { .. } => {}
        SyncOutcome::DryRun { ip } => println!("dry run: would set record to {}", ip),
        SyncOutcome::Updated { ip, outcome } => println!("{} ({})", ip, outcome),
    }
}
