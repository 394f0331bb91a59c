// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Datadog Build Logs
//!
//! Ships the console log of a CI build to the Datadog logs intake, tagged with
//! metadata about the build.
//!
//! ## Architecture
//!
//! ```text
//!   Build ──fetch_log──> LogsWriter ──lines + BuildData──> LogTransport
//!                           │   ^
//!                error sink │   │ BuildData (resolved once)
//!                           v   │
//!                        stderr MetadataProvider
//! ```
//!
//! - [`writer`]: the delivery pipeline and its broken-state latch
//! - [`build`]: builds whose log can be read, and their console listener
//! - [`metadata`]: build metadata and how it is resolved
//! - [`host`]: discovery of the CI server URL
//! - [`transport`]: delivery to the Datadog logs intake over HTTP
//! - [`config`]: `DD_*` environment configuration

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod build;
pub mod config;
pub mod constants;
pub mod encoding;
pub mod error;
pub mod host;
pub mod http;
pub mod logger;
pub mod metadata;
pub mod transport;
pub mod writer;
