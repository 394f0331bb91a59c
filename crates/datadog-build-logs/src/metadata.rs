// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Build metadata attached to every shipped log line.
//!
//! The metadata is captured once, when the [`crate::writer::LogsWriter`] is
//! created, and never refreshed afterwards.

use crate::build::{Build, TaskListener};
use crate::error::MetadataError;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

const UNKNOWN_JOB: &str = "unknown";

/// Immutable snapshot of a build's context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildData {
    pub job_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    /// Sent as the entry's top-level `hostname`
    #[serde(skip)]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Root URL of the CI server, filled in by the writer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ci_url: Option<String>,
    #[serde(skip)]
    pub service: Option<String>,
    #[serde(skip)]
    pub tags: HashMap<String, String>,
}

impl BuildData {
    /// Service name for the intake, falling back to the job name
    #[must_use]
    pub fn service(&self) -> &str {
        self.service.as_deref().unwrap_or(&self.job_name)
    }

    /// Get tags as a sorted vector of "key:value" strings
    ///
    /// Build attributes come first as `job`, `node` and `branch` unless the
    /// extra tags already define them.
    #[must_use]
    pub fn get_tags_vec(&self) -> Vec<String> {
        let mut tags: BTreeMap<&str, &str> = BTreeMap::new();
        tags.insert("job", &self.job_name);
        if let Some(node) = &self.node_name {
            tags.insert("node", node);
        }
        if let Some(branch) = &self.branch {
            tags.insert("branch", branch);
        }
        for (key, value) in &self.tags {
            tags.insert(key, value);
        }
        tags.into_iter()
            .map(|(k, v)| if v.is_empty() { k.to_string() } else { format!("{k}:{v}") })
            .collect()
    }

    /// Get tags as a comma-separated string
    #[must_use]
    pub fn get_tags_string(&self) -> String {
        self.get_tags_vec().join(",")
    }
}

/// Resolves the [`BuildData`] of a build.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn resolve(
        &self,
        build: &dyn Build,
        listener: &dyn TaskListener,
    ) -> Result<BuildData, MetadataError>;
}

/// Reads build metadata from the environment variables the CI server exports.
#[derive(Debug, Clone, Default)]
pub struct EnvMetadataProvider {
    service: Option<String>,
    hostname: Option<String>,
    tags: HashMap<String, String>,
}

impl EnvMetadataProvider {
    #[must_use]
    pub fn new(
        service: Option<String>,
        hostname: Option<String>,
        tags: HashMap<String, String>,
    ) -> Self {
        EnvMetadataProvider {
            service,
            hostname,
            tags,
        }
    }
}

#[async_trait]
impl MetadataProvider for EnvMetadataProvider {
    async fn resolve(
        &self,
        build: &dyn Build,
        listener: &dyn TaskListener,
    ) -> Result<BuildData, MetadataError> {
        let env = build.environment(listener).await?;
        let var = |key: &str| env.get(key).filter(|val| !val.is_empty()).cloned();

        let job_name = var("JOB_NAME").unwrap_or_else(|| {
            listener.log("JOB_NAME is not set, reporting the build as 'unknown'");
            UNKNOWN_JOB.to_string()
        });

        Ok(BuildData {
            job_name,
            build_number: var("BUILD_NUMBER"),
            build_id: var("BUILD_ID"),
            build_url: var("BUILD_URL"),
            node_name: var("NODE_NAME"),
            hostname: self.hostname.clone().or_else(|| var("HOSTNAME")),
            workspace: var("WORKSPACE"),
            branch: var("GIT_BRANCH").or_else(|| var("BRANCH_NAME")),
            git_url: var("GIT_URL"),
            git_commit: var("GIT_COMMIT"),
            user_id: var("BUILD_USER_ID"),
            ci_url: None,
            service: self.service.clone(),
            tags: self.tags.clone(),
        })
    }
}
