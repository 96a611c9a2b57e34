// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Firmware image retrieval.
//!
//! The install-firmware operation carries a download URL; the image is
//! fetched over HTTP with basic auth derived from the current device
//! credentials (`tenant/username` as the user). Failures map onto the
//! [`FirmwareError`] categories that end up in the FAILED reason reported
//! back to the platform.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use nimbus_core::error::{FirmwareError, FirmwareResult};
use nimbus_core::types::LinkCredentials;

// ===========================================================================
// Source Trait
// ===========================================================================

/// Retrieves firmware images by URL.
#[async_trait]
pub trait FirmwareSource: Send + Sync {
    /// Downloads the image at `url`, authenticating as the device.
    async fn fetch(&self, url: &str, credentials: &LinkCredentials) -> FirmwareResult<Vec<u8>>;

    /// Source name for logs.
    fn name(&self) -> &str;
}

// ===========================================================================
// HTTP Source
// ===========================================================================

/// HTTP firmware source with basic auth and a request timeout.
#[derive(Debug, Clone)]
pub struct HttpFirmwareSource {
    client: reqwest::Client,
}

impl HttpFirmwareSource {
    /// Creates a source with the given request timeout.
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    /// Creates with the default 5 minute timeout.
    ///
    /// Firmware images are large; the timeout covers the whole transfer.
    pub fn with_default_timeout() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

impl Default for HttpFirmwareSource {
    fn default() -> Self {
        Self::with_default_timeout()
    }
}

#[async_trait]
impl FirmwareSource for HttpFirmwareSource {
    async fn fetch(&self, url: &str, credentials: &LinkCredentials) -> FirmwareResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .basic_auth(credentials.login(), Some(&credentials.password))
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status().as_u16();
        if let Some(error) = classify_status(status) {
            return Err(error);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FirmwareError::connection(format!("transfer broke: {e}")))?;

        debug!(url = %url, size = bytes.len(), "Firmware image downloaded");
        Ok(bytes.to_vec())
    }

    fn name(&self) -> &str {
        "http"
    }
}

fn classify_transport(error: reqwest::Error) -> FirmwareError {
    if error.is_timeout() || error.is_connect() {
        FirmwareError::connection(error.to_string())
    } else {
        FirmwareError::unknown(error.to_string())
    }
}

/// Maps a response status to a firmware error, `None` for success.
fn classify_status(status: u16) -> Option<FirmwareError> {
    match status {
        200..=299 => None,
        401 | 403 => Some(FirmwareError::Auth { status }),
        other => Some(FirmwareError::unknown(format!("HTTP status {other}"))),
    }
}

// ===========================================================================
// Tests
// ===========================================================================
