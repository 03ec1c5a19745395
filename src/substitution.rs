// ABOUTME: Replaces symbolic configuration-name references with secret store values
// ABOUTME: Applied to JSON bodies, header values, query parameters, and resolved base URLs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 dravr.ai

//! # Substitution Engine
//!
//! A string is rewritten by the first rule that applies:
//!
//! 1. the whole string is a configuration name: replaced by its value
//! 2. `env:NAME`: replaced by the value of `NAME`, or left as-is when unknown
//! 3. otherwise every `${NAME}`, `{$NAME}` and `$NAME` occurrence whose name
//!    resolves is interpolated; unknown references are left untouched
//!
//! Interpolation is a single left-to-right scan, so text produced by one
//! replacement is never scanned again.

use std::borrow::Cow;
use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};
use serde_json::Value;
use tracing::debug;
use url::form_urlencoded;

use crate::secrets::SecretStore;
use crate::token::has_bearer_prefix;

/// Prefix of an explicit environment reference
pub const ENV_PREFIX: &str = "env:";

/// `${NAME}`, `{$NAME}` or `$NAME`
static REFERENCE_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z0-9_]+)\}|\{\$([A-Za-z0-9_]+)\}|\$([A-Za-z0-9_]+)").ok()
});

/// Reference resolver over a shared secret store
#[derive(Debug, Clone)]
pub struct Substituter {
    store: Arc<SecretStore>,
}

impl Substituter {
    /// Create a substituter reading from `store`
    pub const fn new(store: Arc<SecretStore>) -> Self {
        Self { store }
    }

    /// Rewrite every string in a JSON tree in place, returning whether anything changed
    pub fn substitute_value(&self, value: &mut Value) -> bool {
        match value {
            Value::Object(map) => map
                .values_mut()
                .fold(false, |changed, v| self.substitute_value(v) | changed),
            Value::Array(items) => items
                .iter_mut()
                .fold(false, |changed, v| self.substitute_value(v) | changed),
            Value::String(s) => match self.substitute_str(s) {
                Cow::Owned(replaced) => {
                    *s = replaced;
                    true
                }
                Cow::Borrowed(_) => false,
            },
            Value::Null | Value::Bool(_) | Value::Number(_) => false,
        }
    }

    /// Apply the string rules to one scalar
    pub fn substitute_str<'a>(&self, input: &'a str) -> Cow<'a, str> {
        if let Some(value) = self.store.get(input) {
            debug!(name = input, "Substituted configuration name");
            return Cow::Owned(value.to_owned());
        }
        if let Some(name) = input.strip_prefix(ENV_PREFIX) {
            return self.store.get(name).map_or(Cow::Borrowed(input), |value| {
                debug!(name, "Substituted env: reference");
                Cow::Owned(value.to_owned())
            });
        }
        self.interpolate(input)
    }

    /// Interpolate `${NAME}`, `{$NAME}` and `$NAME` references
    pub fn interpolate<'a>(&self, input: &'a str) -> Cow<'a, str> {
        let Some(pattern) = REFERENCE_PATTERN.as_ref() else {
            return Cow::Borrowed(input);
        };
        let mut changed = false;
        let result = pattern.replace_all(input, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map_or("", |m| m.as_str());
            match self.store.get(name) {
                Some(value) => {
                    debug!(name, "Interpolated reference");
                    changed = true;
                    value.to_owned()
                }
                None => caps[0].to_owned(),
            }
        });
        if changed {
            Cow::Owned(result.into_owned())
        } else {
            Cow::Borrowed(input)
        }
    }

    /// Rewrite a single header value
    ///
    /// `Authorization: Bearer env:NAME` and `Authorization: Bearer NAME` are
    /// resolved first, then a value equal to a configuration name is replaced
    /// whole, then references are interpolated.
    pub fn substitute_header<'a>(&self, name: &str, value: &'a str) -> Cow<'a, str> {
        if name.eq_ignore_ascii_case("authorization") && has_bearer_prefix(value) {
            let token = value.get("Bearer ".len()..).unwrap_or_default();
            let reference = token.strip_prefix(ENV_PREFIX).unwrap_or(token);
            if let Some(secret) = self.store.get(reference) {
                debug!(reference, "Substituted bearer credential reference");
                return Cow::Owned(format!("Bearer {secret}"));
            }
        }
        if let Some(secret) = self.store.get(value) {
            debug!(header = name, "Substituted header holding a configuration name");
            return Cow::Owned(secret.to_owned());
        }
        self.interpolate(value)
    }

    /// Rewrite each query parameter value
    ///
    /// The raw query is returned untouched when no value changed, otherwise
    /// the pairs are re-encoded.
    pub fn rewrite_query<'a>(&self, raw: &'a str) -> Cow<'a, str> {
        let mut changed = false;
        let pairs: Vec<(String, String)> = form_urlencoded::parse(raw.as_bytes())
            .map(|(k, v)| {
                let rewritten = match self.substitute_str(&v) {
                    Cow::Owned(s) => {
                        changed = true;
                        s
                    }
                    Cow::Borrowed(_) => v.into_owned(),
                };
                (k.into_owned(), rewritten)
            })
            .collect();

        if !changed {
            return Cow::Borrowed(raw);
        }
        Cow::Owned(
            form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs)
                .finish(),
        )
    }
}
