// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Datadog logs intake limits and payload constants.

/// Maximum uncompressed size of one POST to the logs intake.
///
/// Larger payloads are rejected with a 413.
pub(crate) const MAX_CONTENT_SIZE_BYTES: usize = 5 * 1_024 * 1_024;

/// Size above which the intake truncates a single entry.
pub(crate) const MAX_LOG_SIZE_BYTES: usize = 1_024 * 1_024;

/// Maximum number of entries in one payload.
pub(crate) const MAX_BATCH_ENTRIES_SIZE: usize = 1000;

/// `ddsource` reported for every entry.
pub(crate) const LOG_SOURCE: &str = "jenkins";

/// Intake path appended to the configured logs URL.
pub(crate) const LOGS_INTAKE_PATH: &str = "/api/v2/logs";

/// Prefix of the first line written when the build log cannot be read.
pub const SERIALIZE_ERROR_MESSAGE: &str = "Unable to serialize log data.";
