//! zapgrid - Gracenote/zap2it TV listings to XMLTV.

/// Multi-lineup batch runs.
mod batch;
/// Application configuration (TOML).
mod config;
/// Unix socket delivery.
#[cfg(unix)]
mod deliver;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::instrument;
use tracing_subscriber::filter::EnvFilter;
#[cfg(not(feature = "otel"))]
use tracing_subscriber::fmt;
#[cfg(feature = "otel")]
use tracing_subscriber::layer::SubscriberExt;
#[cfg(feature = "otel")]
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{AppConfig, resolve_config_path};
use zapgrid_api::gracenote::{DEFAULT_USER_AGENT, ZapClient};
use zapgrid_epg::{EngineOptions, EntitySet, OutputEncoding};

/// CLI argument parser.
#[derive(Parser)]
#[command(about, version)]
struct Cli {
    /// Override config directory (reads `{dir}/config.toml`).
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Config file path (takes precedence over --dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Only log warnings and errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log debug detail.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Grab one lineup into an XMLTV document.
    Grab(GrabArgs),
    /// Grab every lineup listed in the config file.
    Batch,
}

/// Arguments for the `grab` subcommand.
#[derive(Args)]
#[allow(clippy::struct_excessive_bools)]
struct GrabArgs {
    /// Number of days to fetch.
    #[arg(short, long, default_value_t = 7)]
    days: u32,

    /// Days to skip before the first window (starts at midnight).
    #[arg(short = 'n', long, default_value_t = 0)]
    offset: u32,

    /// Align windows on the UTC clock.
    #[arg(long)]
    utc: bool,

    /// Fetch per-series details (descriptions, credits, ratings).
    #[arg(short = 'D', long)]
    details: bool,

    /// Account email.
    #[arg(short, long)]
    user: Option<String>,

    /// Account password.
    #[arg(short, long)]
    password: Option<String>,

    /// Lineup ID for anonymous access (`headend` or `headend:device`).
    #[arg(short = 'Y', long)]
    lineup_id: Option<String>,

    /// Postal/zip code for anonymous access.
    #[arg(short = 'Z', long)]
    zip: Option<String>,

    /// Output path; `-` writes to standard output.
    #[arg(short, long, default_value = "xmltv.xml")]
    output: String,

    /// Output encoding: `utf-8` or `iso-8859-1`.
    #[arg(long, default_value = "iso-8859-1")]
    encoding: OutputEncoding,

    /// Minutes added to every start/stop time.
    #[arg(short = 'm', long, default_value_t = 0, allow_negative_numbers = true)]
    time_shift: i64,

    /// Language code for text elements.
    #[arg(short, long, default_value = "en")]
    lang: String,

    /// Comma-separated XML entities to escape (`amp,quot,apos,lt,gt`).
    #[arg(short = 'E', long, default_value = "amp,quot,apos,lt,gt")]
    escapes: EntitySet,

    /// Encode characters outside printable ASCII as numeric references.
    #[arg(short = 'U', long)]
    numeric_entities: bool,

    /// Seconds to sleep before every request.
    #[arg(short = 'S', long, default_value_t = 0.0)]
    delay: f64,

    /// Attempts per request (1-20).
    #[arg(short, long, default_value_t = 3)]
    retries: u32,

    /// Proxy URL.
    #[arg(short = 'P', long)]
    proxy: Option<String>,

    /// Cache directory.
    #[arg(short, long, default_value = "cache")]
    cache: PathBuf,
}

impl GrabArgs {
    /// Converts flags into engine options.
    fn into_options(self) -> EngineOptions {
        EngineOptions {
            days: self.days,
            day_offset: self.offset,
            use_utc: self.utc,
            enrich: self.details,
            username: self.user,
            password: self.password,
            lineup_id: self.lineup_id,
            postal_code: self.zip,
            output: self.output,
            encoding: self.encoding,
            time_shift_minutes: self.time_shift,
            lang: self.lang,
            escapes: self.escapes,
            numeric_entities: self.numeric_entities,
            delay: self.delay,
            max_retries: self.retries,
            proxy: self.proxy,
            cache_dir: self.cache,
        }
    }
}

/// Builds a listings client for one run.
///
/// `USER_AGENT` in the environment replaces the default browser UA.
///
/// # Errors
///
/// Returns an error if the proxy URL is invalid or the client fails to build.
fn build_client(options: &EngineOptions) -> Result<ZapClient> {
    let user_agent =
        std::env::var("USER_AGENT").unwrap_or_else(|_| String::from(DEFAULT_USER_AGENT));
    let mut builder = ZapClient::builder()
        .user_agent(user_agent)
        .delay(options.delay_duration())
        .max_retries(options.max_retries);
    if let Some(proxy) = options.proxy.as_deref() {
        builder = builder.proxy(proxy);
    }
    builder.build().context("failed to build listings client")
}

/// Runs the `grab` subcommand.
///
/// # Errors
///
/// Returns an error if the client fails to build, the session cannot be
/// established, or the document cannot be written.
#[instrument(skip_all)]
async fn run_grab(args: GrabArgs) -> Result<()> {
    let options = args.into_options();
    let client = build_client(&options)?;
    zapgrid_epg::grab(&client, &options).await?;
    Ok(())
}

/// Runs the `batch` subcommand.
///
/// # Errors
///
/// Returns an error if the config has no lineups or any lineup failed.
#[instrument(skip_all)]
async fn run_batch(config: &AppConfig, path: &std::path::Path) -> Result<()> {
    let report = batch::run_batch(config, build_client)
        .await
        .with_context(|| format!("nothing to do in {}", path.display()))?;
    if report.failed > 0 {
        bail!("{} of {} lineups failed", report.failed, config.lineups.len());
    }
    Ok(())
}

/// Default log level from flags, falling back to the config verbosity.
const fn log_level(quiet: bool, verbose: bool, verbosity: u8) -> &'static str {
    if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        match verbosity {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

/// Installs the tracing subscriber; `RUST_LOG` overrides `level`.
fn init_tracing(level: &str) {
    #[cfg(not(feature = "otel"))]
    {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
            )
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    #[cfg(feature = "otel")]
    {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr);

        let otel_layer = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .and_then(|_| {
                let exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_http()
                    .build()
                    .ok()?;

                let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
                    .with_simple_exporter(exporter)
                    .build();

                let tracer = opentelemetry::trace::TracerProvider::tracer(
                    &tracer_provider,
                    env!("CARGO_PKG_NAME"),
                );
                opentelemetry::global::set_tracer_provider(tracer_provider);

                Some(tracing_opentelemetry::layer().with_tracer(tracer))
            });

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .init();
    }
}

/// Entry point.
///
/// # Errors
///
/// Returns an error if subcommand execution fails.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Grab(args) => {
            init_tracing(log_level(cli.quiet, cli.verbose, 1));
            run_grab(args).await
        }
        Commands::Batch => {
            let path = resolve_config_path(cli.config.as_deref(), cli.dir.as_deref())?;
            let config = AppConfig::load(&path)?;
            init_tracing(log_level(cli.quiet, cli.verbose, config.batch_verbosity()));
            tracing::info!(config = %path.display(), "Starting batch run");
            run_batch(&config, &path).await
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]

    use super::*;

    #[test]
    fn test_grab_flags_to_options() {
        // Arrange
        let cli = Cli::try_parse_from([
            "zapgrid", "grab", "-d", "2", "-Y", "USA-OTA10001", "-Z", "10001", "-o", "-",
            "--encoding", "utf-8", "-m", "-30", "-E", "amp,lt", "-S", "0.5", "-D",
        ])
        .unwrap();
        let Commands::Grab(args) = cli.command else {
            panic!("expected grab");
        };

        // Act
        let options = args.into_options();

        // Assert
        assert_eq!(options.days, 2);
        assert_eq!(options.lineup_id.as_deref(), Some("USA-OTA10001"));
        assert_eq!(options.output, "-");
        assert_eq!(options.encoding, OutputEncoding::Utf8);
        assert_eq!(options.time_shift_minutes, -30);
        assert!(options.escapes.amp && options.escapes.lt && !options.escapes.quot);
        assert!(options.enrich);
        assert_eq!(options.max_retries, 3);
    }

    #[test]
    fn test_grab_defaults_match_engine_defaults() {
        // Arrange
        let cli = Cli::try_parse_from(["zapgrid", "grab"]).unwrap();
        let Commands::Grab(args) = cli.command else {
            panic!("expected grab");
        };

        // Act
        let options = args.into_options();

        // Assert
        assert_eq!(options, EngineOptions::default());
    }

    #[test]
    fn test_unknown_entity_rejected() {
        // Arrange & Act
        let result = Cli::try_parse_from(["zapgrid", "grab", "-E", "amp,nbsp"]);

        // Assert
        assert!(result.is_err());
    }

    #[test]
    fn test_log_level() {
        // Arrange & Act & Assert
        assert_eq!(log_level(true, false, 2), "warn");
        assert_eq!(log_level(false, true, 0), "debug");
        assert_eq!(log_level(false, false, 0), "warn");
        assert_eq!(log_level(false, false, 1), "info");
        assert_eq!(log_level(false, false, 3), "debug");
    }

    #[test]
    fn test_build_client_rejects_bad_proxy() {
        // Arrange
        let options = EngineOptions {
            proxy: Some(String::from("not a url")),
            ..EngineOptions::default()
        };

        // Act
        let result = build_client(&options);

        // Assert
        assert!(result.is_err());
    }
}
