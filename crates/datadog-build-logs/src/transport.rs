// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of build log lines to the Datadog logs intake.
//!
//! ```text
//!   lines + BuildData
//!          │
//!          v
//!   ┌─────────────┐
//!   │   Entries   │ (one JSON object per non-empty line)
//!   └──────┬──────┘
//!          │
//!          v
//!   ┌─────────────┐
//!   │   Batches   │ (JSON arrays, count and size limited)
//!   └──────┬──────┘
//!          │
//!          v
//!   ┌─────────────┐
//!   │  Compress   │ (zstd, optional)
//!   └──────┬──────┘
//!          │
//!          v
//!   ┌─────────────┐
//!   │  HTTP POST  │ (single attempt, failures are logged)
//!   └─────────────┘
//! ```

use crate::config::Config;
use crate::constants::{
    LOGS_INTAKE_PATH, LOG_SOURCE, MAX_BATCH_ENTRIES_SIZE, MAX_CONTENT_SIZE_BYTES,
    MAX_LOG_SIZE_BYTES,
};
use crate::http::get_client;
use crate::metadata::BuildData;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, warn};

/// Ships an ordered sequence of log lines together with build metadata.
///
/// Failures are the transport's own business and are never reported back.
#[async_trait]
pub trait LogTransport: Send + Sync {
    async fn deliver(&self, lines: &[String], metadata: &BuildData);
}

/// One entry of the intake's JSON array.
#[derive(Debug, Serialize)]
struct IntakeEntry<'a> {
    message: &'a str,
    ddsource: &'static str,
    service: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    hostname: Option<&'a str>,
    ddtags: &'a str,
    timestamp: u64,
    #[serde(flatten)]
    build: &'a BuildData,
}

/// Transport posting to `{logs_dd_url}/api/v2/logs`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    headers: Option<HeaderMap>,
    compression_level: Option<i32>,
}

impl HttpTransport {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let headers = match &config.api_key {
            Some(api_key) => build_headers(api_key),
            None => {
                error!("No API key configured, build logs will not be shipped");
                None
            }
        };

        HttpTransport {
            client: get_client(config),
            url: format!("{}{LOGS_INTAKE_PATH}", config.logs_intake_url()),
            headers,
            compression_level: config.use_compression.then_some(config.compression_level),
        }
    }

    async fn send(&self, headers: &HeaderMap, payload: Vec<u8>) {
        let mut request = self.client.post(&self.url).headers(headers.clone());
        let body = match self.compression_level {
            Some(level) => match zstd::stream::encode_all(payload.as_slice(), level) {
                Ok(compressed) => {
                    request = request.header("Content-Encoding", "zstd");
                    compressed
                }
                Err(e) => {
                    warn!("Failed to compress payload, sending it uncompressed: {e}");
                    payload
                }
            },
            None => payload,
        };

        match request.body(body).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status == StatusCode::FORBIDDEN {
                    error!(
                        "Request was denied by Datadog: Access denied. Please verify that your API key is valid."
                    );
                } else if status.is_success() {
                    debug!("Payload accepted with status {status}");
                } else {
                    error!(
                        "{status}: Failed to push logs: {:?}",
                        resp.text().await.unwrap_or_default()
                    );
                }
            }
            Err(e) => {
                error!("Failed to send logs: {e}");
            }
        }
    }
}

#[async_trait]
impl LogTransport for HttpTransport {
    async fn deliver(&self, lines: &[String], metadata: &BuildData) {
        let Some(headers) = &self.headers else {
            error!("Skipping delivery: no valid API key");
            return;
        };

        let entries = serialize_entries(lines, metadata, now_millis());
        if entries.is_empty() {
            return;
        }

        let payloads = batch_entries(entries, MAX_BATCH_ENTRIES_SIZE, MAX_CONTENT_SIZE_BYTES);
        debug!(
            "Shipping {} lines in {} payloads",
            lines.len(),
            payloads.len()
        );
        for payload in payloads {
            self.send(headers, payload).await;
        }
    }
}

fn build_headers(api_key: &str) -> Option<HeaderMap> {
    let api_key = match HeaderValue::from_str(api_key) {
        Ok(value) => value,
        Err(e) => {
            error!("API key is not a valid header value: {e}");
            return None;
        }
    };

    let mut headers = HeaderMap::new();
    headers.insert("DD-API-KEY", api_key);
    headers.insert("DD-PROTOCOL", HeaderValue::from_static("agent-json"));
    headers.insert("Content-Type", HeaderValue::from_static("application/json"));
    Some(headers)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

/// Serializes every non-empty line as an intake entry, in order.
fn serialize_entries(lines: &[String], metadata: &BuildData, timestamp: u64) -> Vec<String> {
    let ddtags = metadata.get_tags_string();
    lines
        .iter()
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let entry = IntakeEntry {
                message: line,
                ddsource: LOG_SOURCE,
                service: metadata.service(),
                hostname: metadata.hostname.as_deref(),
                ddtags: &ddtags,
                timestamp,
                build: metadata,
            };
            match serde_json::to_string(&entry) {
                Ok(json) => Some(json),
                Err(e) => {
                    error!("Failed to serialize log line, dropping it: {e}");
                    None
                }
            }
        })
        .collect()
}

/// Packs JSON entries into JSON arrays of at most `max_entries` entries and
/// `max_bytes` bytes, preserving order.
///
/// An entry that cannot fit in an empty payload is dropped.
fn batch_entries(entries: Vec<String>, max_entries: usize, max_bytes: usize) -> Vec<Vec<u8>> {
    let mut payloads = Vec::new();
    let mut buffer: Vec<u8> = Vec::new();
    let mut count = 0;

    for entry in entries {
        if entry.len() > MAX_LOG_SIZE_BYTES {
            warn!(
                "Log size exceeds the 1MB limit: {}, will be truncated by the backend.",
                entry.len()
            );
        }
        // "[" + entry + "]"
        if entry.len() + 2 > max_bytes {
            warn!(
                "Dropping log entry of {} bytes, larger than a whole payload",
                entry.len()
            );
            continue;
        }

        // Appending costs a separator and the entry, closing costs the bracket
        if count > 0 && (count == max_entries || buffer.len() + entry.len() + 2 > max_bytes) {
            payloads.push(close_batch(&mut buffer));
            count = 0;
        }

        buffer.push(if count == 0 { b'[' } else { b',' });
        buffer.extend(entry.as_bytes());
        count += 1;
    }

    if count > 0 {
        payloads.push(close_batch(&mut buffer));
    }
    payloads
}

fn close_batch(buffer: &mut Vec<u8>) -> Vec<u8> {
    buffer.push(b']');
    std::mem::take(buffer)
}
