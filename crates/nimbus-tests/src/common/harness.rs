// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Gateway Rig
//!
//! High-level wiring for integration tests that span multiple components.
//!
//! ## Design Principles
//!
//! - One rig per test, with its own state directory
//! - Mocks shared across every component built from the same rig
//! - Dispatchers can be rebuilt against the surviving state directory to
//!   simulate a process restart

use std::future::Future;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use nimbus_core::types::LinkCredentials;
use nimbus_link::{shared_credentials, InboundEnvelope, SharedCredentials, Topics};
use nimbus_relay::{CommandDispatcher, DataRelay, MarkerStore, RelayConfig};

use super::fixtures::GatewayFixtures;
use super::mocks::{
    MockCloudLink, MockDeviceControl, MockFirmwareSource, MockMemoryProbe, MockSampleSource,
    MockSettingsStore, MockTagStore,
};

// =============================================================================
// Gateway Rig
// =============================================================================

/// A full set of mocks plus the durable state shared between them.
///
/// Every component built from the same rig sees the same link, device
/// facade, and state directory, so a test can drive the dispatcher and the
/// relay together and assert on the combined traffic.
pub struct GatewayRig {
    /// Gateway identity inbound operations are matched against.
    pub device_id: String,

    /// Shared platform link.
    pub link: Arc<MockCloudLink>,

    /// Shared tag facade.
    pub tags: Arc<MockTagStore>,

    /// Shared device controller.
    pub control: Arc<MockDeviceControl>,

    /// Shared settings store.
    pub settings: Arc<MockSettingsStore>,

    /// Shared firmware source.
    pub firmware: Arc<MockFirmwareSource>,

    /// Shared memory probe.
    pub probe: Arc<MockMemoryProbe>,

    /// Shared measurement-relaying flag.
    pub measurements: Arc<AtomicBool>,

    /// Shared credential slot.
    pub credentials: SharedCredentials,

    state_dir: TempDir,
}

impl Default for GatewayRig {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayRig {
    /// Create a rig with a connected link and permissive mocks.
    pub fn new() -> Self {
        Self {
            device_id: GatewayFixtures::gateway_id().to_string(),
            link: Arc::new(MockCloudLink::connected()),
            tags: Arc::new(MockTagStore::default()),
            control: Arc::new(MockDeviceControl::new()),
            settings: Arc::new(MockSettingsStore::new()),
            firmware: Arc::new(MockFirmwareSource::default()),
            probe: Arc::new(MockMemoryProbe::unbounded()),
            measurements: Arc::new(AtomicBool::new(true)),
            credentials: shared_credentials(GatewayFixtures::credentials()),
            state_dir: TempDir::new().expect("Failed to create rig state directory"),
        }
    }

    /// Replace the tag facade before building components.
    pub fn with_tags(mut self, tags: MockTagStore) -> Self {
        self.tags = Arc::new(tags);
        self
    }

    /// Replace the settings store before building components.
    pub fn with_settings(mut self, settings: MockSettingsStore) -> Self {
        self.settings = Arc::new(settings);
        self
    }

    /// Replace the firmware source before building components.
    pub fn with_firmware(mut self, firmware: MockFirmwareSource) -> Self {
        self.firmware = Arc::new(firmware);
        self
    }

    /// Replace the shared credentials before building components.
    pub fn with_credentials(self, credentials: LinkCredentials) -> Self {
        *self.credentials.write() = credentials;
        self
    }

    /// A marker store over this rig's state directory.
    ///
    /// Markers persist in the rig's directory, so a store obtained here sees
    /// what any dispatcher built from the same rig wrote.
    pub fn markers(&self) -> MarkerStore {
        MarkerStore::new(self.state_dir.path().join("operations"))
    }

    /// Build a dispatcher over the rig's mocks and state directory.
    ///
    /// Calling this twice simulates a process restart: the second dispatcher
    /// starts fresh but reads the markers the first one persisted.
    pub fn dispatcher(&self) -> CommandDispatcher<MockCloudLink> {
        CommandDispatcher::new(
            self.link.clone(),
            self.tags.clone(),
            self.control.clone(),
            self.settings.clone(),
            self.firmware.clone(),
            self.markers(),
            self.credentials.clone(),
            self.device_id.clone(),
            self.measurements.clone(),
        )
    }

    /// Build a relay pulling from `source` with the given configuration.
    pub fn relay(
        &self,
        source: Arc<MockSampleSource>,
        config: RelayConfig,
    ) -> DataRelay<MockSampleSource, MockCloudLink> {
        DataRelay::new(
            source,
            self.link.clone(),
            self.probe.clone(),
            Topics::default(),
            self.measurements.clone(),
            self.device_id.clone(),
            config,
        )
        .expect("Failed to build relay from rig")
    }

    /// An inbound envelope on the default operation topic.
    pub fn envelope(&self, payload: &str) -> InboundEnvelope {
        InboundEnvelope::new("tpl/ds", payload)
    }
}

// =============================================================================
// Timeout Helper
// =============================================================================

/// Runs a future under a hard deadline, panicking when it elapses.
///
/// Keeps a wedged loop from hanging the whole suite.
pub async fn with_timeout<F, T>(limit: Duration, future: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, future)
        .await
        .expect("Test timed out")
}
