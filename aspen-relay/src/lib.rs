// Copyright 2026 The Aspen Project
// SPDX-License-Identifier: Apache-2.0

pub mod accumulator;
pub mod client;
pub mod config;
pub mod decode;
pub mod proxy;
pub mod relay;
pub mod turn;
pub mod upstream;
