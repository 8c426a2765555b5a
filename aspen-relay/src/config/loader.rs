// Copyright 2026 The Aspen Project
// SPDX-License-Identifier: Apache-2.0

use sha2::{Digest, Sha256};

use super::error::ConfigError;
use super::interpolation::resolve_variables;
use super::raw;
use super::source::{ConfigSource, StringSource};
use super::types::*;

/// Load and validate a relay config from the given source.
///
/// Steps:
/// 1. Read raw YAML from the source
/// 2. Hash it (logged at startup so deployments can be told apart)
/// 3. Parse into raw deserialization types
/// 4. Check the contract version
/// 5. Resolve `${VAR}` references in URLs
/// 6. Validate and fill defaults into the typed `Config`
pub fn load_config(source: &dyn ConfigSource) -> Result<Config, ConfigError> {
    let raw_yaml = source.load()?;
    let config_hash = compute_hash(&raw_yaml);

    let raw: raw::RawConfig = serde_yaml::from_str(&raw_yaml)?;

    if raw.relay != "v1" {
        return Err(ConfigError::Validation(format!(
            "unsupported relay config version \"{}\", expected \"v1\"",
            raw.relay
        )));
    }

    let upstream = build_upstream_config(raw.upstream)?;
    let server = build_server_config(raw.server)?;
    let client = build_client_config(raw.client, &server)?;

    Ok(Config {
        version: raw.relay,
        upstream,
        server,
        client,
        environment: raw.environment.unwrap_or_default(),
        config_hash,
        source: source.describe(),
    })
}

impl Config {
    /// Minimal config pointing at `url`, for running without a config file.
    pub fn for_upstream(url: &str) -> Result<Config, ConfigError> {
        // A JSON string literal is also a valid YAML scalar.
        let quoted = serde_json::to_string(url)
            .map_err(|e| ConfigError::Validation(format!("upstream.url: {e}")))?;
        let source = StringSource {
            content: format!("relay: v1\nupstream:\n  url: {quoted}\n"),
        };
        let mut config = load_config(&source)?;
        config.source = "--upstream".to_string();
        Ok(config)
    }
}

pub fn compute_hash(raw_yaml: &str) -> String {
    let digest = Sha256::digest(raw_yaml.as_bytes());
    format!("sha256:{digest:x}")
}

fn build_upstream_config(
    raw: Option<raw::RawUpstreamConfig>,
) -> Result<UpstreamConfig, ConfigError> {
    let raw = raw.ok_or_else(|| {
        ConfigError::Validation("missing required section \"upstream\"".to_string())
    })?;
    let url = raw.url.ok_or_else(|| {
        ConfigError::Validation("missing required field \"upstream.url\"".to_string())
    })?;
    let url = resolve_variables(&url)?;
    validate_http_url("upstream.url", &url)?;
    validate_timeout("upstream.timeout_ms", raw.timeout_ms)?;

    Ok(UpstreamConfig {
        url,
        timeout_ms: raw.timeout_ms,
    })
}

fn build_server_config(raw: Option<raw::RawServerConfig>) -> Result<ServerConfig, ConfigError> {
    let defaults = ServerConfig::default();
    let Some(raw) = raw else {
        return Ok(defaults);
    };

    let port = raw.port.unwrap_or(defaults.port);
    if port == 0 {
        return Err(ConfigError::Validation(
            "server.port must be non-zero".to_string(),
        ));
    }

    let route = raw.route.unwrap_or(defaults.route);
    if !route.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "server.route \"{route}\" must start with '/'"
        )));
    }

    let max_request_bytes = raw.max_request_bytes.unwrap_or(defaults.max_request_bytes);
    if max_request_bytes == 0 {
        return Err(ConfigError::Validation(
            "server.max_request_bytes must be non-zero".to_string(),
        ));
    }

    Ok(ServerConfig {
        port,
        route,
        max_request_bytes,
    })
}

fn build_client_config(
    raw: Option<raw::RawClientConfig>,
    server: &ServerConfig,
) -> Result<ClientConfig, ConfigError> {
    let (url, timeout_ms) = match raw {
        Some(r) => (r.url, r.timeout_ms),
        None => (None, None),
    };
    let url = match url {
        Some(u) => resolve_variables(&u)?,
        None => server.local_url(),
    };
    validate_http_url("client.url", &url)?;
    validate_timeout("client.timeout_ms", timeout_ms)?;

    Ok(ClientConfig { url, timeout_ms })
}

fn validate_http_url(field: &str, url: &str) -> Result<(), ConfigError> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"));
    match rest {
        Some(host) if !host.is_empty() && !host.starts_with('/') => Ok(()),
        _ => Err(ConfigError::Validation(format!(
            "{field} \"{url}\" must be an http:// or https:// URL with a host"
        ))),
    }
}

fn validate_timeout(field: &str, timeout_ms: Option<u64>) -> Result<(), ConfigError> {
    if timeout_ms == Some(0) {
        return Err(ConfigError::Validation(format!(
            "{field} must be non-zero when set"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
