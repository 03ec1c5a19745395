// ABOUTME: Stateless API gateway core library: bearer tokens, secret substitution, target resolution
// ABOUTME: Re-exports the secret store, token authority, resolver, substituter, and injector
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 dravr.ai

//! # Magic Gateway Core
//!
//! Framework-free building blocks for an API gateway that mints stateless
//! bearer tokens and forwards requests to AI-provider backends with real
//! secrets substituted for symbolic references.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use magic_gateway::{SecretStore, TargetResolver, TokenAuthority};
//! use magic_gateway::types::CallerIdentity;
//!
//! # fn example() -> Result<(), magic_gateway::types::GatewayError> {
//! let store = Arc::new(SecretStore::from_env()?);
//! let authority = TokenAuthority::new(&store);
//! let issued = authority.issue(&CallerIdentity::default())?;
//! assert!(authority.verify(&issued.token).is_ok());
//!
//! let target = TargetResolver::new(Arc::clone(&store)).resolve("/openai/chat/completions", None)?;
//! println!("{}", target.url(None));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`types`]: error type, caller identity, service descriptors
//! - [`secrets`]: startup snapshot of configuration names and values
//! - [`config`]: listen address, debug mode, upstream timeout
//! - [`token`]: token issuance, verification, and global revocation
//! - [`substitution`]: reference replacement in bodies, headers, and queries
//! - [`resolver`]: backend target resolution
//! - [`injector`]: inline credential injection for special backends
//! - [`signing`]: Ed25519 detached signatures

/// Core types: errors, caller identity, service descriptors
pub mod types;

/// Gateway runtime configuration
pub mod config;
/// Inline body credential injection
pub mod injector;
/// Backend target resolution
pub mod resolver;
/// Startup secret store
pub mod secrets;
/// Ed25519 content signing
pub mod signing;
/// Configuration reference substitution
pub mod substitution;
/// Stateless token authority
pub mod token;

pub use config::GatewayConfig;
pub use injector::KeyInjector;
pub use resolver::{ResolvedTarget, Strategy, TargetResolver};
pub use secrets::SecretStore;
pub use signing::ContentSigner;
pub use substitution::Substituter;
pub use token::{Claims, IssuedToken, TokenAuthority, TokenRejection};
