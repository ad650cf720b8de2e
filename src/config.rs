//! 配置模块：从环境变量或 YAML 文件读取各厂商凭据。
//!
//! Provider configuration.
//!
//! The registry consumes a [`Settings`] value: an ordered list of
//! [`ProviderEntry`] groups, one per provider. Entries can come from the
//! process environment ([`Settings::from_env`]) or from a YAML document
//! ([`Settings::from_yaml_str`] / [`Settings::from_file`]).
//!
//! ```yaml
//! providers:
//!   - id: falai
//!     api_key_env: FAL_KEY
//!   - id: minimax
//!     api_key: mm-secret
//!     params:
//!       group_id: "1234"
//!     poll_interval_secs: 10
//! ```
//!
//! An entry with an incomplete credential set is kept as-is; the registry
//! decides to skip it. Nothing here fails because a credential is missing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::types::ProviderId;
use crate::{Error, ErrorContext, Result};

/// Names the env var that points at a YAML settings file.
pub const CONFIG_PATH_ENV: &str = "MEDIA_DISPATCH_CONFIG";

/// Credential group for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub id: ProviderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Read the key from this env var instead of storing it in the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Overrides the vendor's public endpoint (proxies, test servers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Secondary identifiers such as `group_id` or `image_endpoint`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub params: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_max_attempts: Option<u32>,
}

impl ProviderEntry {
    pub fn new(id: ProviderId) -> Self {
        Self {
            id,
            api_key: None,
            api_key_env: None,
            base_url: None,
            params: HashMap::new(),
            poll_interval_secs: None,
            poll_max_attempts: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_poll(mut self, interval_secs: u64, max_attempts: u32) -> Self {
        self.poll_interval_secs = Some(interval_secs);
        self.poll_max_attempts = Some(max_attempts);
        self
    }

    /// Non-blank API key, if any.
    pub fn api_key(&self) -> Option<&str> {
        non_blank(self.api_key.as_deref())
    }

    /// Non-blank named parameter, if any.
    pub fn param(&self, name: &str) -> Option<&str> {
        non_blank(self.params.get(name).map(String::as_str))
    }

    /// Names of credentials this entry still lacks for its provider.
    ///
    /// Unknown provider ids only need an API key.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.api_key().is_none() {
            missing.push("api_key");
        }
        if let Some(spec) = credential_spec(&self.id) {
            for (param, _) in spec.required {
                if self.param(*param).is_none() {
                    missing.push(*param);
                }
            }
        }
        missing
    }

    fn resolve_key_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if self.api_key().is_none() {
            if let Some(var) = self.api_key_env.as_deref() {
                self.api_key = lookup(var);
            }
        }
    }
}

/// Ordered provider configuration; order is registry insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
}

struct CredentialSpec {
    id: &'static str,
    /// Env vars tried in order for the API key.
    key_vars: &'static [&'static str],
    /// `(param, env var)` pairs that must be present.
    required: &'static [(&'static str, &'static str)],
    /// `(param, env var)` pairs read when present.
    optional: &'static [(&'static str, &'static str)],
}

static CREDENTIALS: [CredentialSpec; 7] = [
    CredentialSpec {
        id: "google",
        key_vars: &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
        required: &[],
        optional: &[],
    },
    CredentialSpec {
        id: "falai",
        key_vars: &["FAL_KEY", "FAL_API_KEY"],
        required: &[],
        optional: &[],
    },
    CredentialSpec {
        id: "replicate",
        key_vars: &["REPLICATE_API_TOKEN"],
        required: &[],
        optional: &[],
    },
    CredentialSpec {
        id: "minimax",
        key_vars: &["MINIMAX_API_KEY"],
        required: &[("group_id", "MINIMAX_GROUP_ID")],
        optional: &[],
    },
    CredentialSpec {
        id: "openrouter",
        key_vars: &["OPENROUTER_API_KEY"],
        required: &[],
        optional: &[("site_url", "OPENROUTER_SITE_URL")],
    },
    CredentialSpec {
        id: "runpod",
        key_vars: &["RUNPOD_API_KEY"],
        required: &[("image_endpoint", "RUNPOD_IMAGE_ENDPOINT")],
        optional: &[("video_endpoint", "RUNPOD_VIDEO_ENDPOINT")],
    },
    CredentialSpec {
        id: "devstral",
        key_vars: &["DEVSTRAL_API_KEY", "OPENROUTER_API_KEY"],
        required: &[],
        optional: &[("model", "DEVSTRAL_MODEL")],
    },
];

fn credential_spec(id: &ProviderId) -> Option<&'static CredentialSpec> {
    CREDENTIALS.iter().find(|s| s.id == id.as_str())
}

fn non_blank(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

impl Settings {
    /// Reads the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds settings from an arbitrary variable source, in the fixed
    /// provider order. Only providers whose full credential set is present
    /// get an entry.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut providers = Vec::new();

        for spec in CREDENTIALS.iter() {
            let Some(key) = spec.key_vars.iter().find_map(|v| get(*v)) else {
                tracing::info!(provider = spec.id, "provider skipped: no API key in environment");
                continue;
            };
            let mut entry = ProviderEntry::new(ProviderId::new(spec.id)).with_api_key(key);

            let mut complete = true;
            for (param, var) in spec.required {
                match get(*var) {
                    Some(v) => {
                        entry.params.insert((*param).to_string(), v);
                    }
                    None => {
                        tracing::info!(
                            provider = spec.id,
                            missing = *var,
                            "provider skipped: incomplete credentials"
                        );
                        complete = false;
                    }
                }
            }
            if !complete {
                continue;
            }
            for (param, var) in spec.optional {
                if let Some(v) = get(*var) {
                    entry.params.insert((*param).to_string(), v);
                }
            }
            providers.push(entry);
        }

        Settings { providers }
    }

    /// Parses YAML, resolving any `api_key_env` against the process environment.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Self::from_yaml_str_with(yaml, |name| std::env::var(name).ok())
    }

    pub fn from_yaml_str_with(yaml: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings: Settings = serde_yaml::from_str(yaml).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid settings document: {}", e),
                ErrorContext::new().with_source("config_loader"),
            )
        })?;
        for entry in &mut settings.providers {
            entry.resolve_key_env(&lookup);
        }
        Ok(settings)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read settings file: {}", e),
                ErrorContext::new()
                    .with_field_path(path.display().to_string())
                    .with_source("config_loader"),
            )
        })?;
        Self::from_yaml_str(&text)
    }

    /// File named by `MEDIA_DISPATCH_CONFIG` if set, otherwise the environment.
    pub fn load() -> Result<Self> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => {
                tracing::info!(path = %path, "loading provider settings from file");
                Self::from_file(path.trim())
            }
            _ => Ok(Self::from_env()),
        }
    }

    pub fn with_provider(mut self, entry: ProviderEntry) -> Self {
        self.providers.push(entry);
        self
    }
}
