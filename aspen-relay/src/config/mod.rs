// Copyright 2026 The Aspen Project
// SPDX-License-Identifier: Apache-2.0

// Config loader and validator
//
// Loads aspen.yaml, validates structure, resolves variable interpolation,
// fills defaults and computes a deterministic config hash.

mod error;
mod interpolation;
mod loader;
mod raw;
mod source;
mod types;

pub use error::ConfigError;
pub use interpolation::resolve_variables;
pub use loader::{compute_hash, load_config};
pub use source::{ConfigSource, FileSource, StringSource};
pub use types::{
    ClientConfig, Config, ServerConfig, UpstreamConfig, DEFAULT_MAX_REQUEST_BYTES, DEFAULT_PORT,
    DEFAULT_ROUTE,
};
