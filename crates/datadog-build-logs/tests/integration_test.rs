// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use datadog_build_logs::{
    build::{FileBuild, TracingListener},
    config::Config,
    encoding::Encoding,
    host::StaticHostLocator,
    metadata::EnvMetadataProvider,
    transport::HttpTransport,
    writer::{LogsWriter, LogsWriterConfig},
};
use mockito::{Matcher, Server};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .expect("lock poisoned")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

async fn writer(log_path: &Path, intake_url: String, sink: SharedSink) -> LogsWriter {
    let config = Config {
        api_key: Some("mock-api-key".to_string()),
        logs_dd_url: Some(intake_url),
        use_compression: false,
        ..Config::default()
    };
    let env = HashMap::from([
        ("JOB_NAME".to_string(), "api/main".to_string()),
        ("BUILD_NUMBER".to_string(), "42".to_string()),
        ("NODE_NAME".to_string(), "agent-1".to_string()),
    ]);

    LogsWriter::new(LogsWriterConfig {
        build: Some(Arc::new(FileBuild::new(log_path, env))),
        error_sink: Some(Box::new(sink)),
        listener: Arc::new(TracingListener),
        encoding: Encoding::Utf8,
        metadata_provider: Arc::new(EnvMetadataProvider::default()),
        host_locator: Arc::new(StaticHostLocator::new(Some(
            "https://ci.example.com/".to_string(),
        ))),
        transport: Arc::new(HttpTransport::new(&config)),
    })
    .await
    .expect("failed to create writer")
}

#[tokio::test]
async fn ships_build_log_tail_to_intake() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/v2/logs")
        .match_header("DD-API-KEY", "mock-api-key")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#""message":"step 1 ok""#.to_string()),
            Matcher::Regex(r#""message":"step 2 ok""#.to_string()),
            Matcher::Regex(r#""ddtags":"job:api/main,node:agent-1""#.to_string()),
            Matcher::Regex(r#""build_number":"42""#.to_string()),
            Matcher::Regex(r#""ci_url":"https://ci.example.com/""#.to_string()),
        ]))
        .with_status(202)
        .expect(1)
        .create_async()
        .await;

    let mut log = NamedTempFile::new().expect("failed to create log file");
    writeln!(log, "build started\nstep 1 ok\nstep 2 ok").expect("failed to write log");

    let sink = SharedSink::default();
    let writer = writer(log.path(), server.url(), sink.clone()).await;
    writer.write_build_log(2).await;

    mock.assert_async().await;
    assert!(!writer.is_connection_broken());
    assert!(sink.0.lock().expect("lock poisoned").is_empty());
}

#[tokio::test]
async fn unreadable_build_log_ships_diagnostic_once() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/v2/logs")
        .match_body(Matcher::Regex(
            r#""message":"Unable to serialize log data.""#.to_string(),
        ))
        .with_status(202)
        .expect(1)
        .create_async()
        .await;

    let sink = SharedSink::default();
    let writer = writer(
        Path::new("/nonexistent/builds/42/log"),
        server.url(),
        sink.clone(),
    )
    .await;

    writer.write_build_log(-1).await;
    writer.write_build_log(-1).await;

    mock.assert_async().await;
    assert!(writer.is_connection_broken());
    let written = String::from_utf8(sink.0.lock().expect("lock poisoned").clone())
        .expect("sink should hold UTF-8");
    assert!(written.starts_with("Unable to serialize log data.\n"));
}
