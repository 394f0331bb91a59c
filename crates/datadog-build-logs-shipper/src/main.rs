// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, process::ExitCode, sync::Arc};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use datadog_build_logs::{
    build::{FileBuild, TracingListener},
    config::Config,
    encoding::Encoding,
    host::EnvHostLocator,
    logger::Formatter,
    metadata::EnvMetadataProvider,
    transport::HttpTransport,
    writer::{LogsWriter, LogsWriterConfig},
};

#[tokio::main]
pub async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("DD_BUILD_LOGS | ERROR | {e}");
            return ExitCode::FAILURE;
        }
    };

    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", config.log_level);
    let filter = match EnvFilter::try_new(env_filter) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("DD_BUILD_LOGS | ERROR | could not parse log level in configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_ansi(false)
        .event_format(Formatter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("DD_BUILD_LOGS | ERROR | setting default subscriber failed: {e}");
        return ExitCode::FAILURE;
    }

    debug!("Logging subsystem enabled");

    let Some(log_path) = env::args().nth(1) else {
        error!("Usage: datadog-build-logs-shipper <build-log-file>");
        return ExitCode::FAILURE;
    };

    let encoding = env::var("DD_BUILD_LOGS_ENCODING")
        .ok()
        .and_then(|label| Encoding::for_label(&label))
        .unwrap_or_default();

    let writer = LogsWriter::new(LogsWriterConfig {
        build: Some(Arc::new(FileBuild::from_process_env(&log_path))),
        error_sink: None,
        listener: Arc::new(TracingListener),
        encoding,
        metadata_provider: Arc::new(EnvMetadataProvider::new(
            config.service.clone(),
            config.hostname.clone(),
            config.tags.clone(),
        )),
        host_locator: Arc::new(EnvHostLocator),
        transport: Arc::new(HttpTransport::new(&config)),
    })
    .await;

    let writer = match writer {
        Ok(writer) => writer,
        Err(e) => {
            error!("Unable to read build metadata: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(path = %log_path, max_lines = config.max_lines, "Shipping build log");
    writer.write_build_log(config.max_lines).await;

    if writer.is_connection_broken() {
        info!("Build log could not be read, shipped the failure instead");
    }
    ExitCode::SUCCESS
}
