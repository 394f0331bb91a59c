// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors raised while resolving the metadata of a build.
///
/// Either variant is fatal to [`crate::writer::LogsWriter::new`].
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("Failed to read build metadata: {0}")]
    Io(#[from] std::io::Error),

    #[error("Interrupted while resolving build metadata")]
    Interrupted,
}

/// Errors raised while loading the shipper configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
