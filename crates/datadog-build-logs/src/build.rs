// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Execution units whose console output gets shipped.

use crate::error::MetadataError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

/// Output sink of the build, used by collaborators to report progress to the
/// build console.
pub trait TaskListener: Send + Sync {
    fn log(&self, message: &str);
}

/// Listener that forwards console messages to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl TaskListener for TracingListener {
    fn log(&self, message: &str) {
        info!("{message}");
    }
}

/// A running or completed build.
#[async_trait]
pub trait Build: Send + Sync {
    /// Returns up to the last `max_lines` lines of console output, oldest first.
    async fn fetch_log(&self, max_lines: usize) -> io::Result<Vec<String>>;

    /// Returns the environment variables the build ran with.
    async fn environment(
        &self,
        listener: &dyn TaskListener,
    ) -> Result<HashMap<String, String>, MetadataError>;
}

/// Build whose console log is a file on disk.
#[derive(Debug, Clone)]
pub struct FileBuild {
    path: PathBuf,
    env: HashMap<String, String>,
}

impl FileBuild {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, env: HashMap<String, String>) -> Self {
        FileBuild {
            path: path.into(),
            env,
        }
    }

    /// Captures the current process environment as the build environment.
    #[must_use]
    pub fn from_process_env(path: impl Into<PathBuf>) -> Self {
        Self::new(path, std::env::vars().collect())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Build for FileBuild {
    async fn fetch_log(&self, max_lines: usize) -> io::Result<Vec<String>> {
        let raw = tokio::fs::read(&self.path).await?;
        let text = String::from_utf8_lossy(&raw);
        let lines: Vec<&str> = text.lines().collect();
        let skip = lines.len().saturating_sub(max_lines);
        Ok(lines[skip..].iter().map(|line| (*line).to_string()).collect())
    }

    async fn environment(
        &self,
        _listener: &dyn TaskListener,
    ) -> Result<HashMap<String, String>, MetadataError> {
        Ok(self.env.clone())
    }
}
