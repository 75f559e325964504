use std::sync::Arc;

use cc_domain::Config;
use cc_identity::{ApiKeyManager, IdentityPerimeter, InviteFlow, MagicLinkFlow};
use cc_jobs::JobDispatcher;
use cc_memory::MemoryService;
use cc_pack::PackAssembler;
use cc_quota::QuotaLedger;
use cc_recall::RecallEngine;
use cc_store::Store;

use crate::rate_limit::RateLimiter;

/// Shared application state passed to all API handlers, grouped by concern.
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub store: Arc<Store>,

    // ── Identity & access ─────────────────────────────────────────────
    pub identity: Arc<IdentityPerimeter>,
    pub invites: Arc<InviteFlow>,
    pub magic_links: Arc<MagicLinkFlow>,
    pub api_keys: Arc<ApiKeyManager>,
    pub rate_limiter: Arc<RateLimiter>,

    // ── Memory pipeline ────────────────────────────────────────────────
    pub quota: Arc<QuotaLedger>,
    pub memory: Arc<MemoryService>,
    pub recall: Arc<RecallEngine>,
    pub pack: Arc<PackAssembler>,
    pub jobs: Arc<JobDispatcher>,

    // ── Security (startup-computed) ───────────────────────────────────
    /// SHA-256 hash of the admin bearer token, read once at startup.
    /// `None` = dev mode (admin endpoints accessible without auth).
    pub admin_token_hash: Option<Vec<u8>>,
}
