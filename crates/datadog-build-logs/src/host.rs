// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Discovery of the CI server's public root URL.

use std::env;

/// Resolves the root URL of the CI server hosting the build.
///
/// Returns an empty string when the URL is unknown.
pub trait HostLocator: Send + Sync {
    fn root_url(&self) -> String;
}

/// Host locator returning a fixed URL.
#[derive(Debug, Clone, Default)]
pub struct StaticHostLocator(Option<String>);

impl StaticHostLocator {
    #[must_use]
    pub fn new(url: Option<String>) -> Self {
        StaticHostLocator(url)
    }
}

impl HostLocator for StaticHostLocator {
    fn root_url(&self) -> String {
        self.0.clone().unwrap_or_default()
    }
}

/// Host locator reading `JENKINS_URL` from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvHostLocator;

impl HostLocator for EnvHostLocator {
    fn root_url(&self) -> String {
        env::var("JENKINS_URL").unwrap_or_default()
    }
}
