// ABOUTME: Ed25519 detached signatures for AI-generated content metadata and payloads
// ABOUTME: Keys arrive as base64 64-byte keypairs (or 32-byte seeds); signatures leave as base64
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 dravr.ai

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::{Signer, SigningKey, KEYPAIR_LENGTH, SECRET_KEY_LENGTH};
use serde_json::{Map, Value};

use crate::types::GatewayError;

/// Detached Ed25519 signer
pub struct ContentSigner {
    key: SigningKey,
}

impl ContentSigner {
    /// Decode a base64 keypair or seed
    ///
    /// # Errors
    ///
    /// Returns a config error for invalid base64, a wrong length, or a
    /// keypair whose public half does not match its seed.
    pub fn from_base64(encoded: &str) -> Result<Self, GatewayError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| GatewayError::config(format!("Failed to decode Ed25519 key: {e}")))?;

        let key = match bytes.len() {
            KEYPAIR_LENGTH => {
                let mut keypair = [0u8; KEYPAIR_LENGTH];
                keypair.copy_from_slice(&bytes);
                SigningKey::from_keypair_bytes(&keypair)
                    .map_err(|e| GatewayError::config(format!("Invalid Ed25519 keypair: {e}")))?
            }
            SECRET_KEY_LENGTH => {
                let mut seed = [0u8; SECRET_KEY_LENGTH];
                seed.copy_from_slice(&bytes);
                SigningKey::from_bytes(&seed)
            }
            other => {
                return Err(GatewayError::config(format!(
                    "Invalid Ed25519 key length: expected {KEYPAIR_LENGTH} bytes, got {other}"
                )))
            }
        };

        Ok(Self { key })
    }

    /// Sign raw bytes, returning the base64 signature
    pub fn sign_bytes(&self, message: &[u8]) -> String {
        STANDARD.encode(self.key.sign(message).to_bytes())
    }

    /// Sign a metadata object over its compact, key-sorted JSON form
    pub fn sign_metadata(&self, metadata: &Value) -> Result<String, GatewayError> {
        let canonical = serde_json::to_vec(&canonicalize(metadata))
            .map_err(|e| GatewayError::internal(format!("Failed to serialise metadata: {e}")))?;
        Ok(self.sign_bytes(&canonical))
    }

    /// Base64 public key for verifiers
    pub fn public_key(&self) -> String {
        STANDARD.encode(self.key.verifying_key().to_bytes())
    }
}

impl std::fmt::Debug for ContentSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentSigner")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Rebuild objects with keys in lexicographic order
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            let sorted: Map<String, Value> = keys
                .into_iter()
                .map(|k| (k.clone(), canonicalize(&map[k])))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
