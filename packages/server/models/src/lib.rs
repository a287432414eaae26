#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API response types for the forestcast server.
//!
//! The result tables themselves are served as the pipeline records from
//! `forestcast_models`; only the server's own envelopes live here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}

/// Whether the pipeline result is available yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResultState {
    /// The pipeline is still running (or the exports are still loading).
    Pending,
    /// The result is loaded and every endpoint serves it.
    Ready,
    /// The run aborted; collection endpoints stay empty.
    Failed,
}

/// Response of `GET /api/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStatus {
    /// Current state.
    pub state: ResultState,
    /// When the pipeline run finished, once ready.
    pub completed_at: Option<DateTime<Utc>>,
    /// Number of per-region failures in the result.
    pub failure_count: usize,
    /// Why the run aborted, when `state` is `failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiStatus {
    /// Status before any result is available.
    #[must_use]
    pub const fn pending() -> Self {
        Self {
            state: ResultState::Pending,
            completed_at: None,
            failure_count: 0,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_in_camel_case() {
        let json = serde_json::to_value(ApiStatus::pending()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "state": "pending",
                "completedAt": null,
                "failureCount": 0,
            })
        );
    }

    #[test]
    fn failed_status_carries_error() {
        let status = ApiStatus {
            state: ResultState::Failed,
            error: Some("missing file".to_string()),
            ..ApiStatus::pending()
        };
        let json = serde_json::to_value(status).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["error"], "missing file");
    }
}
