//! Assembles [`AppState`] from a validated [`Config`]: validate config,
//! initialize every subsystem in dependency order, log a line per step,
//! compute security-sensitive hashes once at startup.

use std::collections::HashMap;
use std::sync::Arc;

use cc_domain::config::ConfigSeverity;
use cc_domain::Config;
use cc_identity::{ApiKeyManager, IdentityPerimeter, InviteFlow, MagicLinkFlow};
use cc_jobs::{JobDispatcher, JobHandler};
use cc_memory::MemoryService;
use cc_pack::PackAssembler;
use cc_quota::QuotaLedger;
use cc_recall::RecallEngine;
use cc_store::Store;
use sha2::{Digest, Sha256};

use crate::rate_limit::RateLimiter;
use crate::state::AppState;

/// Builds every subsystem and wires them into one [`AppState`]. Bails out
/// before touching storage if the config itself does not validate —
/// "partial migrations abort startup" extends to partial config.
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if Config::has_errors(&issues) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    let store = Arc::new(
        if config.store.path == ":memory:" {
            Store::open_in_memory().await?
        } else {
            Store::open(&config.store.path, config.store.pool_size, config.store.busy_timeout_ms, &config.store.retry_backoffs_ms).await?
        },
    );
    tracing::info!(path = %config.store.path, pool_size = config.store.pool_size, "store ready");

    let identity = Arc::new(IdentityPerimeter::new(
        store.clone(),
        config.session.login_history_limit,
        config.session.login_history_retention_days,
    ));
    let invites = Arc::new(InviteFlow::new(store.clone(), config.session.invite_ttl_days, config.session.ttl_days));
    let magic_links = Arc::new(MagicLinkFlow::new(
        store.clone(),
        15,
        config.session.ttl_days,
        config.session.login_history_limit,
        config.session.login_history_retention_days,
    ));
    let api_keys = Arc::new(ApiKeyManager::new(store.clone()));
    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
    tracing::info!("identity perimeter, invites, magic links, api keys, rate limiter ready");

    let quota = Arc::new(QuotaLedger::new(store.clone(), config.quota.clone()));

    let mut handlers: HashMap<String, JobHandler> = HashMap::new();
    handlers.insert("reindex_project".to_string(), reindex_project_handler());
    let jobs = Arc::new(JobDispatcher::new(config.jobs.clone(), store.clone(), handlers));
    tracing::info!(workers = config.jobs.worker_count, "job dispatcher ready");

    let memory = Arc::new(MemoryService::new(store.clone(), quota.clone(), jobs.clone()));
    let recall = Arc::new(RecallEngine::new(store.clone(), quota.clone()));
    let pack = Arc::new(PackAssembler::new(config.pack.max_pack_bytes));
    tracing::info!("memory service, recall engine, pack assembler ready");

    let admin_token_hash = match std::env::var("CC_ADMIN_TOKEN") {
        Ok(token) if !token.is_empty() => {
            tracing::info!("admin bearer-token auth enabled");
            Some(Sha256::digest(token.as_bytes()).to_vec())
        }
        _ => {
            tracing::warn!("admin bearer-token auth DISABLED — set CC_ADMIN_TOKEN to enable");
            None
        }
    };

    Ok(AppState {
        config,
        store,
        identity,
        invites,
        magic_links,
        api_keys,
        rate_limiter,
        quota,
        memory,
        recall,
        pack,
        jobs,
        admin_token_hash,
    })
}

/// Placeholder reindex job: recomputes nothing yet (FTS indexing happens
/// synchronously via SQLite triggers) but gives the dispatcher a real,
/// registered task so `enqueue("reindex_project", ...)` never targets a
/// missing handler.
fn reindex_project_handler() -> JobHandler {
    Arc::new(|payload| {
        Box::pin(async move {
            tracing::debug!(?payload, "reindex_project: fts5 triggers keep the index current, no-op");
            Ok(())
        })
    })
}
