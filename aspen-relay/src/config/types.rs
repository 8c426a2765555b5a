// Copyright 2026 The Aspen Project
// SPDX-License-Identifier: Apache-2.0

/// Port the relay listens on when neither the config nor the CLI says otherwise.
pub const DEFAULT_PORT: u16 = 3000;

/// Route the relay serves when the config does not name one.
pub const DEFAULT_ROUTE: &str = "/api/agent_chat";

/// Upper bound on an inbound request body (10 MiB).
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 10 * 1024 * 1024;

/// Parsed and validated relay config.
#[derive(Debug, Clone)]
pub struct Config {
    /// Contract version. Always "v1".
    pub version: String,
    pub upstream: UpstreamConfig,
    pub server: ServerConfig,
    pub client: ClientConfig,
    /// Environment label (e.g. "dev", "staging").
    pub environment: String,
    /// SHA256 of the raw YAML: "sha256:{hex}".
    pub config_hash: String,
    /// Where the YAML came from, as reported by its `ConfigSource`.
    pub source: String,
}

/// The agent backend the relay forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    pub url: String,
    /// Deadline for one whole upstream exchange, streaming included.
    pub timeout_ms: Option<u64>,
}

/// The relay's own HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub route: String,
    pub max_request_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            route: DEFAULT_ROUTE.to_string(),
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

impl ServerConfig {
    /// URL a local client uses to reach this relay.
    pub fn local_url(&self) -> String {
        format!("http://127.0.0.1:{}{}", self.port, self.route)
    }
}

/// Settings for the `chat` client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub url: String,
    pub timeout_ms: Option<u64>,
}
