//! Usage telemetry
//!
//! Trace delivery is fire-and-forget: events are posted from a spawned task
//! and every failure is swallowed at debug level. Telemetry must never affect
//! the outcome of the workflow that emits it.

use std::env;

use serde::Serialize;

const TRACES_API_BASE_URL: &str = "https://api.bigdata.com/v1/events";
const TRACES_BASE_URL_ENV: &str = "BIGDATA_TRACES_URL";

const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, Clone, Copy)]
pub enum TraceEventName {
    ServiceStart,
    ReportGenerated,
}

impl TraceEventName {
    pub fn as_str(self) -> &'static str {
        match self {
            TraceEventName::ServiceStart => "onPremRiskAnalyzerThematicScreenerServiceStart",
            TraceEventName::ReportGenerated => "onPremRiskAnalyzerReportGenerated",
        }
    }
}

#[derive(Serialize)]
struct TraceEvent {
    event_name: &'static str,
    properties: serde_json::Value,
}

/// Client for the usage-event endpoint
///
/// A client without an API key is disabled: `send` becomes a no-op. Used in
/// tests and when telemetry is not configured.
#[derive(Clone)]
pub struct TraceClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl TraceClient {
    pub fn new(api_key: String) -> Self {
        let base_url = env::var(TRACES_BASE_URL_ENV)
            .ok()
            .unwrap_or_else(|| TRACES_API_BASE_URL.to_string());

        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key: Some(api_key),
        }
    }

    pub fn disabled() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: TRACES_API_BASE_URL.to_string(),
            api_key: None,
        }
    }

    /// Emit a usage event without waiting for delivery
    pub fn send(&self, event_name: TraceEventName, properties: serde_json::Value) {
        let Some(api_key) = self.api_key.clone() else {
            return;
        };

        let client = self.client.clone();
        let url = self.base_url.clone();
        tokio::spawn(async move {
            let event = TraceEvent {
                event_name: event_name.as_str(),
                properties,
            };
            let result = client
                .post(&url)
                .header(API_KEY_HEADER, &api_key)
                .json(&event)
                .send()
                .await
                .and_then(|response| response.error_for_status());

            if let Err(e) = result {
                tracing::debug!(
                    event = event_name.as_str(),
                    error = %e,
                    "Trace delivery failed"
                );
            }
        });
    }
}
