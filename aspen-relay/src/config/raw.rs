// Copyright 2026 The Aspen Project
// SPDX-License-Identifier: Apache-2.0

// Raw YAML shapes. Everything optional except the contract version; the
// loader fills defaults and validates before building the public types.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RawConfig {
    pub relay: String,
    pub upstream: Option<RawUpstreamConfig>,
    pub server: Option<RawServerConfig>,
    pub client: Option<RawClientConfig>,
    pub environment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawUpstreamConfig {
    pub url: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct RawServerConfig {
    pub port: Option<u16>,
    pub route: Option<String>,
    pub max_request_bytes: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct RawClientConfig {
    pub url: Option<String>,
    pub timeout_ms: Option<u64>,
}
