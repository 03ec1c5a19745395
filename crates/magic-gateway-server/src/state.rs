// ABOUTME: Server state holding the secret store, token authority, and per-request collaborators
// ABOUTME: Built once at startup; only the token authority's atomic counters change afterwards
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 dravr.ai

use std::sync::Arc;

use magic_gateway::types::GatewayError;
use magic_gateway::{
    ContentSigner, GatewayConfig, KeyInjector, SecretStore, Substituter, TargetResolver,
    TokenAuthority,
};
use reqwest::redirect::Policy;
use tracing::info;

/// Shared server state handle
pub type SharedState = Arc<ServerState>;

/// Immutable collaborators shared by every handler
///
/// Every component reads the same store snapshot. The token authority
/// owns the only mutable state (version counter and revocation cutoff)
/// as atomics, so no locks are needed here.
pub struct ServerState {
    config: GatewayConfig,
    store: Arc<SecretStore>,
    authority: TokenAuthority,
    resolver: TargetResolver,
    substituter: Substituter,
    injector: KeyInjector,
    signer: Option<ContentSigner>,
    client: reqwest::Client,
}

impl ServerState {
    /// Wire every component to `store`
    ///
    /// # Errors
    ///
    /// Returns a config error for a malformed Ed25519 key and an internal
    /// error when the upstream HTTP client cannot be built.
    pub fn new(store: SecretStore, config: GatewayConfig) -> Result<Self, GatewayError> {
        let store = Arc::new(store);

        let signer = config
            .ed25519_private_key
            .as_deref()
            .map(ContentSigner::from_base64)
            .transpose()?;
        if signer.is_none() {
            info!("ED25519_PRIVATE_KEY not set, signing endpoints disabled");
        }

        // Redirects are relayed to the caller rather than followed
        let client = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| GatewayError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            authority: TokenAuthority::new(&store),
            resolver: TargetResolver::new(Arc::clone(&store)),
            substituter: Substituter::new(Arc::clone(&store)),
            injector: KeyInjector::new(Arc::clone(&store)),
            signer,
            client,
            config,
            store,
        })
    }

    /// Runtime configuration
    pub const fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Startup secret store snapshot
    pub fn store(&self) -> &SecretStore {
        &self.store
    }

    /// Token issuance and verification
    pub const fn authority(&self) -> &TokenAuthority {
        &self.authority
    }

    /// Backend target resolution
    pub const fn resolver(&self) -> &TargetResolver {
        &self.resolver
    }

    /// Reference substitution
    pub const fn substituter(&self) -> &Substituter {
        &self.substituter
    }

    /// Inline body credential injection
    pub const fn injector(&self) -> &KeyInjector {
        &self.injector
    }

    /// Ed25519 signer, when a key is configured
    pub const fn signer(&self) -> Option<&ContentSigner> {
        self.signer.as_ref()
    }

    /// Upstream HTTP client
    pub const fn client(&self) -> &reqwest::Client {
        &self.client
    }
}
