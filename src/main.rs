// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use zonemux::endpoint::Endpoint;
use zonemux::health::Liveness;
use zonemux::plan::Policy;
use zonemux::provider::factory::{register_builtin_providers, ProviderFactory};
use zonemux::provider::{Credentials, ProviderConfig};
use zonemux::reconciler::{ReconcileOutcome, Reconciler, ReconcilerConfig};

/// Reconcile DNS records against a desired-state file, once.
#[derive(Parser, Debug)]
#[command(name = "zonemux", version, about)]
struct Args {
    /// Desired-state file (YAML)
    #[arg(long, env = "ZONEMUX_CONFIG")]
    config: PathBuf,

    /// Credentials file (YAML string map); overrides `credentialsFile` of the config
    #[arg(long, env = "ZONEMUX_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// Plan and log changes without submitting them
    #[arg(long, env = "ZONEMUX_DRY_RUN")]
    dry_run: bool,
}

/// Contents of the desired-state file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunConfig {
    /// Registered provider name, e.g. `google`
    provider: String,

    /// Owner id; when unset records are managed without ownership
    #[serde(default)]
    owner_id: Option<String>,

    #[serde(default)]
    txt_prefix: String,

    #[serde(default)]
    policy: Policy,

    /// Relative paths are resolved against the config file's directory
    #[serde(default)]
    credentials_file: Option<PathBuf>,

    #[serde(default)]
    provider_config: ProviderConfig,

    #[serde(default)]
    endpoints: Vec<Endpoint>,

    #[serde(default)]
    liveness: Liveness,
}

impl RunConfig {
    fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        if let (Some(file), Some(dir)) = (config.credentials_file.as_mut(), path.parent()) {
            if file.is_relative() {
                *file = dir.join(&*file);
            }
        }
        Ok(config)
    }
}

fn load_credentials(path: Option<&Path>) -> Result<Credentials> {
    let Some(path) = path else {
        debug!("No credentials file given");
        return Ok(Credentials::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read credentials file {}", path.display()))?;
    let values: BTreeMap<String, String> = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse credentials file {}", path.display()))?;
    Ok(Credentials::from_string_map(values))
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    // Logs go to stderr; stdout carries the outcome
    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

/// Cancel `cancel` on SIGINT or SIGTERM.
async fn cancel_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT, cancelling reconcile pass"),
        () = terminate => info!("Received SIGTERM, cancelling reconcile pass"),
        () = cancel.cancelled() => return,
    }
    cancel.cancel();
}

fn main() -> Result<()> {
    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("zonemux")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    init_tracing();

    let config = RunConfig::load(&args.config)?;
    let credentials =
        load_credentials(args.credentials.as_deref().or(config.credentials_file.as_deref()))?;

    let mut provider_config = config.provider_config;
    provider_config.dry_run |= args.dry_run;

    info!(
        provider = %config.provider,
        owner = config.owner_id.as_deref().unwrap_or("<none>"),
        endpoints = config.endpoints.len(),
        dry_run = provider_config.dry_run,
        "Starting zonemux reconcile pass"
    );

    let mut factory = ProviderFactory::new();
    register_builtin_providers(&mut factory);
    let reconciler = Reconciler::from_factory(
        &factory,
        &config.provider,
        &credentials,
        provider_config,
        config.owner_id,
        &config.txt_prefix,
        ReconcilerConfig {
            policy: config.policy,
        },
    );

    let outcome = match reconciler {
        Ok(reconciler) => {
            let cancel = CancellationToken::new();
            let signals = tokio::spawn(cancel_on_signal(cancel.clone()));
            let outcome = reconciler
                .reconcile(config.endpoints, &config.liveness, &cancel)
                .await;
            cancel.cancel();
            let _ = signals.await;
            outcome
        }
        Err(e) => {
            error!(provider = %config.provider, error = %e, "Failed to set up reconcile pass");
            ReconcileOutcome::failed(&e, &config.endpoints)
        }
    };

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if !outcome.condition.is_ready() {
        anyhow::bail!(
            "Reconcile pass failed: {}",
            outcome.condition.message.unwrap_or_default()
        );
    }
    Ok(())
}
