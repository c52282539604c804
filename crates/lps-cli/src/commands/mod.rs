//! Subcommand bodies. Each returns the process exit code; only `main`
//! exits.

use std::sync::Arc;

use anyhow::{Context, Result};
use lps_config::{
    load_layered_yaml, report_unused_keys, resolve_secrets, ConfigMode, LoadedConfig,
    PublishConfig, ResolvedSecrets, UnusedKeyPolicy,
};
use lps_execution::{Ed25519Signer, RchainTokenTerms, Signer, TermBuilder};
use lps_ledger_http::{RnodeEndpoints, RnodeHttpGateway};
use lps_runtime::{CancellationToken, ConfigurationError, Reconciler};
use tracing::{error, info, warn};

fn load(paths: &[String]) -> Result<LoadedConfig> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    load_layered_yaml(&path_refs)
}

fn warn_unused_keys(
    mode: ConfigMode,
    loaded: &LoadedConfig,
    policy: UnusedKeyPolicy,
) -> Result<()> {
    let report = report_unused_keys(mode, &loaded.config_json, policy)?;
    if !report.is_clean() {
        warn!(
            mode = mode.as_str(),
            unused = ?report.unused_leaf_pointers,
            "config keys not read by this command"
        );
    }
    Ok(())
}

fn signer_from(secrets: &ResolvedSecrets) -> Result<Ed25519Signer> {
    let key = secrets
        .private_key
        .as_deref()
        .with_context(|| format!("env var '{}' is not set", secrets.private_key_var))?;
    Ed25519Signer::from_hex(key).with_context(|| {
        format!(
            "env var '{}' does not hold a hex ed25519 private key",
            secrets.private_key_var
        )
    })
}

fn terms(cfg: &PublishConfig) -> Arc<dyn TermBuilder> {
    Arc::new(RchainTokenTerms::new(cfg.registry_target()))
}

fn config_abort(e: ConfigurationError) -> anyhow::Error {
    error!(error = %e, "configuration error, nothing was written");
    anyhow::Error::new(e).context("configuration error")
}

pub fn config_hash(paths: &[String]) -> Result<i32> {
    let loaded = load(paths)?;
    println!("config_hash={}", loaded.config_hash);
    println!("{}", loaded.canonical_json);
    Ok(0)
}

pub fn identity(paths: &[String]) -> Result<i32> {
    let loaded = load(paths)?;
    let secrets = resolve_secrets(&loaded.config_json, true)?;
    let signer = signer_from(&secrets)?;
    println!("public_key={}", signer.owner_identity());
    println!("key_env={}", secrets.private_key_var);
    Ok(0)
}

pub async fn check(paths: &[String], strict: bool, json: bool) -> Result<i32> {
    let loaded = load(paths)?;
    warn_unused_keys(ConfigMode::Check, &loaded, UnusedKeyPolicy::Warn)?;
    let cfg = PublishConfig::from_loaded(&loaded)?;
    let items = cfg.items()?;
    let policy = cfg.run_policy();
    let strict = strict || policy.strict;

    // Never submits, so the validator is only a placeholder.
    let gateway = RnodeHttpGateway::new(RnodeEndpoints {
        read_only_url: cfg.ledger.read_only_url.clone(),
        validator_url: cfg
            .ledger
            .validator_url
            .clone()
            .unwrap_or_else(|| cfg.ledger.read_only_url.clone()),
        admin_url: None,
    });
    let reconciler = Reconciler::read_only(Arc::new(gateway), terms(&cfg), policy);

    info!(config_hash = %loaded.config_hash, items = items.len(), "check starting");
    let report = reconciler.check(&items).await.map_err(config_abort)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in report.lines() {
            println!("{line}");
        }
        println!("{} item(s) checked", report.len());
    }
    Ok(report.exit_code(strict))
}

pub async fn push(
    paths: &[String],
    strict: bool,
    json: bool,
    fail_on_unused_keys: bool,
) -> Result<i32> {
    let loaded = load(paths)?;
    let unused_policy = if fail_on_unused_keys {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    warn_unused_keys(ConfigMode::Push, &loaded, unused_policy)?;
    let cfg = PublishConfig::from_loaded(&loaded)?;
    let items = cfg.items()?;
    let policy = cfg.run_policy();
    let strict = strict || policy.strict;

    let secrets = resolve_secrets(&loaded.config_json, true)?;
    let signer = signer_from(&secrets)?;
    let owner = signer.owner_identity();
    let validator_url = cfg
        .ledger
        .validator_url
        .clone()
        .context("ledger.validator_url is required for push")?;

    let gateway = RnodeHttpGateway::new(RnodeEndpoints {
        read_only_url: cfg.ledger.read_only_url.clone(),
        validator_url,
        admin_url: cfg.ledger.admin_url.clone(),
    });

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, ending confirmation polling");
            on_interrupt.cancel();
        }
    });

    let reconciler = Reconciler::with_cancellation(
        Arc::new(gateway),
        terms(&cfg),
        Arc::new(signer),
        cfg.executor_config(),
        policy,
        cancel,
    );

    info!(
        config_hash = %loaded.config_hash,
        items = items.len(),
        %owner,
        "push starting"
    );
    let report = reconciler.reconcile(&items).await.map_err(config_abort)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in report.lines() {
            println!("{line}");
        }
        println!("{}", report.summary());
    }
    Ok(report.exit_code(strict))
}
