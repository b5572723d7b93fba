//! crl - CRL content API command-line client.

/// Application configuration (TOML).
mod config;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::instrument;
use tracing_subscriber::filter::EnvFilter;
#[cfg(not(feature = "otel"))]
use tracing_subscriber::fmt;
#[cfg(feature = "otel")]
use tracing_subscriber::layer::SubscriberExt;
#[cfg(feature = "otel")]
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{API_ROOT_ENV, AppConfig, resolve_config_path};
use crl_api::content::{
    CachedContentApi, ContentClient, LocalContentApi, QueryParams, get_cities, get_events_list,
    get_place_events, get_places,
};

/// CLI argument parser.
#[derive(Parser)]
#[command(about, version)]
struct Cli {
    /// Override config directory.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Write a config file with the given API root.
    Init(InitArgs),
    /// Content API queries.
    #[command(flatten)]
    Query(QueryCommand),
}

/// Subcommands that query the content API.
#[derive(Subcommand)]
enum QueryCommand {
    /// Fetch the events of a single place.
    PlaceEvents(PlaceEventsArgs),
    /// Fetch the city list.
    Cities(CitiesArgs),
    /// Fetch the place list.
    Places(ListArgs),
    /// Fetch the event list with normalized dates.
    Events(ListArgs),
}

/// Arguments for the `init` subcommand.
#[derive(clap::Args)]
struct InitArgs {
    /// API root URL (e.g. "https://api.example.org/v1/").
    #[arg(long, required = true)]
    api_root: String,

    /// Default Referer header.
    #[arg(long)]
    referer: Option<String>,

    /// Overwrite an existing config file.
    #[arg(long)]
    force: bool,
}

/// Arguments for the `place-events` subcommand.
#[derive(clap::Args)]
struct PlaceEventsArgs {
    /// Place ID or slug.
    #[arg(long, required = true)]
    place_id: String,
}

/// Arguments shared by the list subcommands.
#[derive(clap::Args)]
struct ListArgs {
    /// Query parameter passed through to the API (repeatable, e.g. "page=1").
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Referer header for the request. Falls back to `api.referer` from config.
    #[arg(long)]
    referer: Option<String>,
}

/// Arguments for the `cities` subcommand.
#[derive(clap::Args)]
struct CitiesArgs {
    /// Query parameters and referer.
    #[command(flatten)]
    list: ListArgs,

    /// Cache TTL in seconds for this response (0 = config default).
    #[arg(long, default_value_t = 0)]
    ttl: u64,
}

impl ListArgs {
    /// Converts the `--param` pairs into API query parameters.
    fn query_params(&self) -> QueryParams {
        self.params.iter().cloned().collect()
    }
}

/// Parses a `KEY=VALUE` pair.
fn parse_param(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{s}`"))?;
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in `{s}`"));
    }
    Ok((String::from(key), String::from(value)))
}

/// Builds a `ContentClient` from config. `env_root` (from `CRL_API_ROOT`)
/// overrides `api.root`.
///
/// # Errors
///
/// Returns an error if the API root is missing or invalid, or the client
/// fails to build.
#[instrument(skip_all)]
fn build_client(config: &AppConfig, env_root: Option<&str>) -> Result<ContentClient> {
    let api_root = config.api.resolve_root(env_root)?;

    let mut builder = ContentClient::builder()
        .api_root(api_root)
        .endpoints(config.api.endpoints.clone())
        .timeout(config.api.timeout())
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
    if let Some(ref referer) = config.api.referer {
        builder = builder.default_referer(referer);
    }
    for (name, value) in &config.api.headers {
        builder = builder.header(name, value);
    }

    builder.build().context("failed to build API client")
}

/// Returns the in-band error message of a response, if it is an error marker.
///
/// Recognizes `{"error": ...}` and the one-element `[{"error": ...}]` list.
fn in_band_error(body: &Value) -> Option<&str> {
    let marker = match body {
        Value::Object(_) => body,
        Value::Array(items) if items.len() == 1 => items.first()?,
        _ => return None,
    };
    let fields = marker.as_object()?;
    if fields.len() != 1 {
        return None;
    }
    fields.get("error").and_then(Value::as_str)
}

/// Runs one subcommand against `api` and logs the JSON result.
///
/// # Errors
///
/// Returns an error if the response is an in-band error marker, the cities
/// request fails outside the timeout/status cases, or JSON rendering fails.
#[instrument(skip_all)]
async fn run_command(api: &(impl LocalContentApi + Sync), command: &QueryCommand) -> Result<()> {
    let body = match command {
        QueryCommand::PlaceEvents(args) => get_place_events(api, &args.place_id).await,
        QueryCommand::Cities(args) => get_cities(
            api,
            &args.list.query_params(),
            args.list.referer.as_deref(),
            args.ttl,
        )
        .await
        .context("cities request failed")?,
        QueryCommand::Places(args) => {
            get_places(api, &args.query_params(), args.referer.as_deref()).await
        }
        QueryCommand::Events(args) => {
            get_events_list(api, &args.query_params(), args.referer.as_deref()).await
        }
    };

    if let Some(message) = in_band_error(&body) {
        bail!("API request failed: {message}");
    }

    let rendered = serde_json::to_string_pretty(&body).context("failed to render response")?;
    tracing::info!("{rendered}");
    Ok(())
}

/// Runs the `init` subcommand.
///
/// # Errors
///
/// Returns an error if the file exists without `--force`, the API root is
/// not a valid URL, or the file cannot be written.
#[instrument(skip_all)]
fn run_init(args: &InitArgs, config_path: &Path) -> Result<()> {
    if config_path.exists() && !args.force {
        bail!(
            "config already exists: {} (use --force to overwrite)",
            config_path.display()
        );
    }

    let mut config = AppConfig::default();
    config.api.root = Some(args.api_root.clone());
    config.api.referer.clone_from(&args.referer);
    config.api.resolve_root(None)?;

    config.save(config_path)?;
    tracing::info!("Wrote {}", config_path.display());
    Ok(())
}

/// Installs the global tracing subscriber.
///
/// With the `otel` feature, spans are also exported over OTLP/HTTP when
/// `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    #[cfg(not(feature = "otel"))]
    {
        fmt().with_env_filter(env_filter).with_target(false).init();
    }

    #[cfg(feature = "otel")]
    {
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);

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
/// Returns an error if config loading, client construction or the
/// subcommand fails.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let config_path =
        resolve_config_path(cli.dir.as_ref()).context("failed to resolve config path")?;
    let command = match cli.command {
        Commands::Init(args) => return run_init(&args, &config_path),
        Commands::Query(command) => command,
    };

    let config = AppConfig::load(&config_path).context("failed to load config")?;
    let env_root = std::env::var(API_ROOT_ENV).ok();
    let client = build_client(&config, env_root.as_deref())?;

    if config.cache.enabled {
        let api = CachedContentApi::new(client, &config.cache.settings());
        run_command(&api, &command).await
    } else {
        run_command(&client, &command).await
    }
}
