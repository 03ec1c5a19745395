// ABOUTME: Fills inline credential fields in JSON bodies for backends that expect the key in the payload
// ABOUTME: Active only when the resolved base URL matches a configured special base URL on a path boundary
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 dravr.ai

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::secrets::SecretStore;
use crate::substitution::ENV_PREFIX;

/// Base-URL entry name paired with the key entry injected into bodies sent there
const SPECIAL_PAIRS: &[(&str, &str)] = &[
    ("TEXT_TO_IMAGE_API_BASE_URL", "TEXT_TO_IMAGE_ACCESS_KEY"),
    ("VOICE_UNDERSTANDING_API_BASE_URL", "VOICE_UNDERSTANDING_API_KEY"),
    ("BING_SUBSCRIPTION_ENDPOINT", "BING_SUBSCRIPTION_KEY"),
];

/// Lower-cased substrings marking a field as a credential slot
const CREDENTIAL_MARKERS: &[&str] = &[
    "api_key",
    "apikey",
    "access_key",
    "accesskey",
    "key",
    "token",
    "authorization",
    "text_to_image_access_key",
    "voice_understanding_api_key",
    "bing_subscription_key",
];

/// Backend-specific body credential injector
#[derive(Debug, Clone)]
pub struct KeyInjector {
    store: Arc<SecretStore>,
}

impl KeyInjector {
    /// Create an injector reading from `store`
    pub const fn new(store: Arc<SecretStore>) -> Self {
        Self { store }
    }

    /// Key to inject for `base_url`, if it is a special backend
    pub fn special_key_for(&self, base_url: &str) -> Option<&str> {
        SPECIAL_PAIRS.iter().find_map(|(url_name, key_name)| {
            let special = self.store.get(url_name).filter(|u| !u.is_empty())?;
            if !matches_on_boundary(base_url, special) {
                return None;
            }
            let key = self.store.get(key_name)?;
            debug!(base = url_name, key = key_name, "Special backend matched for body injection");
            Some(key)
        })
    }

    /// Fill placeholder credential fields in `body`, returning whether anything changed
    pub fn inject(&self, base_url: &str, body: &mut Value) -> bool {
        self.special_key_for(base_url)
            .is_some_and(|key| fill_credentials(body, key))
    }
}

/// `base_url` starts with `special` and continues with `/` or nothing
fn matches_on_boundary(base_url: &str, special: &str) -> bool {
    base_url
        .strip_prefix(special)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn is_credential_field(name: &str) -> bool {
    let lower = name.to_lowercase();
    CREDENTIAL_MARKERS.iter().any(|m| lower.contains(m))
}

/// Empty, an `env:` reference, or anything still carrying a `$`
fn is_placeholder(value: &str) -> bool {
    value.is_empty() || value.starts_with(ENV_PREFIX) || value.contains('$')
}

fn fill_credentials(value: &mut Value, key: &str) -> bool {
    match value {
        Value::Object(map) => map.iter_mut().fold(false, |changed, (name, field)| {
            if is_credential_field(name) {
                if let Value::String(current) = field {
                    if is_placeholder(current) {
                        debug!(field = %name, "Injected backend key into body");
                        key.clone_into(current);
                        return true;
                    }
                }
            }
            fill_credentials(field, key) | changed
        }),
        Value::Array(items) => items
            .iter_mut()
            .fold(false, |changed, item| fill_credentials(item, key) | changed),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::secrets::SIGNING_SECRET_KEY;

    fn injector() -> KeyInjector {
        let store = SecretStore::from_pairs([
            (SIGNING_SECRET_KEY, "secret"),
            ("TEXT_TO_IMAGE_API_BASE_URL", "https://api.example.com/v2"),
            ("TEXT_TO_IMAGE_ACCESS_KEY", "img-key"),
            ("BING_SUBSCRIPTION_ENDPOINT", "https://bing.example.com"),
        ])
        .expect("store");
        KeyInjector::new(Arc::new(store))
    }

    #[test]
    fn prefix_must_end_on_path_boundary() {
        let injector = injector();
        assert_eq!(injector.special_key_for("https://api.example.com/v2"), Some("img-key"));
        assert_eq!(
            injector.special_key_for("https://api.example.com/v2/generate"),
            Some("img-key")
        );
        assert_eq!(injector.special_key_for("https://api.example.com/v2extra"), None);
    }

    #[test]
    fn special_without_key_entry_is_ignored() {
        assert_eq!(injector().special_key_for("https://bing.example.com/search"), None);
    }

    #[test]
    fn placeholders_are_filled_recursively() {
        let mut body = json!({
            "access_key": "",
            "prompt": "a cat",
            "auth": {"apiKey": "${TEXT_TO_IMAGE_ACCESS_KEY}", "Token": "env:SOMETHING"},
            "items": [{"api_key": "$KEY"}],
        });
        assert!(injector().inject("https://api.example.com/v2", &mut body));
        assert_eq!(
            body,
            json!({
                "access_key": "img-key",
                "prompt": "a cat",
                "auth": {"apiKey": "img-key", "Token": "img-key"},
                "items": [{"api_key": "img-key"}],
            })
        );
    }

    #[test]
    fn concrete_credentials_are_preserved() {
        let mut body = json!({"api_key": "caller-supplied", "count": 2});
        assert!(!injector().inject("https://api.example.com/v2", &mut body));
        assert_eq!(body["api_key"], "caller-supplied");
    }

    #[test]
    fn non_special_target_is_untouched() {
        let mut body = json!({"api_key": ""});
        assert!(!injector().inject("https://api.openai.com/v1", &mut body));
        assert_eq!(body["api_key"], "");
    }
}
