// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of one build's console log to a [`LogTransport`].
//!
//! A [`LogsWriter`] is created once per build. Reading the build log can fail
//! halfway through a build; when it does, the writer ships an explanation of
//! the failure in place of the log and then stops delivering for good.
//!
//! # Broken state
//!
//! The writer is broken when any of these holds:
//! - the build is absent
//! - the build metadata is absent
//! - an error was latched by [`LogsWriter::log_error_message`]
//!
//! The latch only ever goes from `false` to `true`. A broken writer turns
//! every delivery call into a no-op.
//!
//! # Concurrency
//!
//! Calls are expected to come from the single task driving the build. The
//! latch is atomic, but a `write` racing a `write_build_log` may still observe
//! the writer as viable right before it breaks.

use crate::build::{Build, TaskListener};
use crate::constants::SERIALIZE_ERROR_MESSAGE;
use crate::encoding::Encoding;
use crate::error::MetadataError;
use crate::host::HostLocator;
use crate::metadata::{BuildData, MetadataProvider};
use crate::transport::LogTransport;
use std::error::Error;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error};

/// Byte sink receiving diagnostics, usually the process standard error.
pub type ErrorSink = Box<dyn Write + Send>;

/// Collaborators of a [`LogsWriter`].
pub struct LogsWriterConfig {
    /// Build whose log gets shipped, absent builds never ship anything
    pub build: Option<Arc<dyn Build>>,
    /// Diagnostic sink, standard error when `None`
    pub error_sink: Option<ErrorSink>,
    pub listener: Arc<dyn TaskListener>,
    pub encoding: Encoding,
    pub metadata_provider: Arc<dyn MetadataProvider>,
    pub host_locator: Arc<dyn HostLocator>,
    pub transport: Arc<dyn LogTransport>,
}

/// Origin of the lines handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogPayload {
    /// Lines read from the build log
    Fetched(Vec<String>),
    /// Explanation of why the build log could not be read
    Diagnostic(Vec<String>),
}

impl LogPayload {
    #[must_use]
    pub fn lines(&self) -> &[String] {
        match self {
            LogPayload::Fetched(lines) | LogPayload::Diagnostic(lines) => lines,
        }
    }

    #[must_use]
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, LogPayload::Diagnostic(_))
    }
}

/// Ships the console log of a single build.
pub struct LogsWriter {
    error_sink: Mutex<ErrorSink>,
    build: Option<Arc<dyn Build>>,
    build_data: Option<BuildData>,
    host_url: String,
    broken: AtomicBool,
    encoding: Encoding,
    transport: Arc<dyn LogTransport>,
}

impl LogsWriter {
    /// Creates a writer, resolving the build metadata right away.
    ///
    /// Fails when the metadata provider fails or is interrupted. An absent
    /// build is not an error: the writer is created broken.
    pub async fn new(config: LogsWriterConfig) -> Result<Self, MetadataError> {
        let host_url = config.host_locator.root_url();
        let build_data = match &config.build {
            Some(build) => {
                let mut data = config
                    .metadata_provider
                    .resolve(build.as_ref(), config.listener.as_ref())
                    .await?;
                if data.ci_url.is_none() && !host_url.is_empty() {
                    data.ci_url = Some(host_url.clone());
                }
                Some(data)
            }
            None => None,
        };

        Ok(LogsWriter {
            error_sink: Mutex::new(
                config
                    .error_sink
                    .unwrap_or_else(|| Box::new(io::stderr())),
            ),
            build: config.build,
            build_data,
            host_url,
            broken: AtomicBool::new(false),
            encoding: config.encoding,
            transport: config.transport,
        })
    }

    /// Encoding used for bytes written to the error sink.
    #[must_use]
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Root URL of the CI server, empty when unknown.
    #[must_use]
    pub fn host_url(&self) -> &str {
        &self.host_url
    }

    #[must_use]
    pub fn build_data(&self) -> Option<&BuildData> {
        self.build_data.as_ref()
    }

    /// True if errors occurred during initialization or delivery.
    #[must_use]
    pub fn is_connection_broken(&self) -> bool {
        self.broken.load(Ordering::SeqCst) || self.build.is_none() || self.build_data.is_none()
    }

    /// Ships `lines` as a single batch.
    ///
    /// Does nothing when the writer is broken or every line is empty.
    pub async fn write(&self, lines: &[String]) {
        if self.is_connection_broken() {
            return;
        }
        self.deliver(lines).await;
    }

    /// Ships one line, ignoring empty lines.
    pub async fn write_line(&self, line: &str) {
        self.write(&[line.to_string()]).await;
    }

    /// Ships the last `max_lines` lines of the build log, all of them when
    /// `max_lines` is negative.
    ///
    /// If the log cannot be read, the failure is written to the error sink,
    /// the writer breaks, and the failure message is shipped instead of the
    /// log. Nothing is shipped by later calls.
    pub async fn write_build_log(&self, max_lines: i64) {
        if self.is_connection_broken() {
            return;
        }
        let Some(build) = &self.build else {
            return;
        };

        let payload = match build.fetch_log(line_limit(max_lines)).await {
            Ok(lines) => LogPayload::Fetched(lines),
            Err(e) => {
                let msg = format!("{SERIALIZE_ERROR_MESSAGE}\n{}", error_trace(&e));
                self.log_error_message(&msg);
                LogPayload::Diagnostic(msg.split('\n').map(str::to_string).collect())
            }
        };

        debug!(
            "Delivering {} {} lines",
            payload.lines().len(),
            if payload.is_diagnostic() { "diagnostic" } else { "build log" }
        );
        // The latch may be set by now, the diagnostic still goes out once
        self.deliver(payload.lines()).await;
    }

    /// Writes `msg` to the error sink and breaks the writer.
    ///
    /// The writer is broken before anything is written, and stays broken even
    /// if the sink fails. Sink failures are only reported through `tracing`.
    pub fn log_error_message(&self, msg: &str) {
        self.broken.store(true, Ordering::SeqCst);

        let bytes = self.encoding.encode(msg);
        let mut sink = self
            .error_sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = sink.write_all(&bytes).and_then(|()| sink.flush()) {
            error!("Failed to write to the error stream: {e}");
        }
    }

    async fn deliver(&self, lines: &[String]) {
        let Some(build_data) = &self.build_data else {
            return;
        };
        if lines.iter().all(String::is_empty) {
            return;
        }
        self.transport.deliver(lines, build_data).await;
    }
}

fn line_limit(max_lines: i64) -> usize {
    if max_lines < 0 {
        usize::MAX
    } else {
        usize::try_from(max_lines).unwrap_or(usize::MAX)
    }
}

/// Renders an error followed by its chain of causes, one per line.
fn error_trace(err: &io::Error) -> String {
    let mut trace = format!("{}: {err}", err.kind());
    let mut source = err.source();
    while let Some(cause) = source {
        trace.push_str(&format!("\nCaused by: {cause}"));
        source = cause.source();
    }
    trace
}
