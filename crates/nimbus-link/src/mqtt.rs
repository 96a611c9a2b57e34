// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! MQTT implementation of [`CloudLink`].
//!
//! Wraps `rumqttc`. `connect` drives the event loop inline until the broker
//! acknowledges the session, then hands the loop to a background read task
//! that forwards every publish to the inbound channel. The adapter never
//! reconnects on its own; the connection supervisor owns that policy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use nimbus_core::error::{LinkError, LinkResult};

use crate::link::{CloudLink, InboundEnvelope, SharedCredentials};

// ===========================================================================
// Options
// ===========================================================================

/// Connection options for the MQTT link.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MqttLinkOptions {
    /// Broker hostname.
    #[serde(default = "default_host")]
    pub host: String,

    /// Broker port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Stable client identifier. The provisioning channel appends `-boot`.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Keep-alive interval.
    #[serde(default = "default_keep_alive")]
    #[serde(with = "duration_secs")]
    pub keep_alive: Duration,

    /// How long to wait for the broker to accept a session.
    #[serde(default = "default_connect_timeout")]
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Request channel capacity handed to `rumqttc`.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "nimbus-gateway".to_string()
}

fn default_keep_alive() -> Duration {
    Duration::from_secs(30)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_channel_capacity() -> usize {
    64
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl Default for MqttLinkOptions {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            client_id: default_client_id(),
            keep_alive: default_keep_alive(),
            connect_timeout: default_connect_timeout(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl MqttLinkOptions {
    /// Options for testing against a local broker.
    pub fn for_testing() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            client_id: "nimbus-test".to_string(),
            keep_alive: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            channel_capacity: 8,
        }
    }

    /// Derives the options used by the provisioning channel.
    pub fn for_provisioning(&self) -> Self {
        let mut options = self.clone();
        options.client_id = format!("{}-boot", self.client_id);
        options
    }
}

// ===========================================================================
// MqttLink
// ===========================================================================

/// MQTT transport to the platform.
pub struct MqttLink {
    options: MqttLinkOptions,
    credentials: SharedCredentials,
    inbound: mpsc::Sender<InboundEnvelope>,
    client: RwLock<Option<AsyncClient>>,
    connected: Arc<AtomicBool>,
    closing: Arc<AtomicBool>,
    read_task: Mutex<Option<JoinHandle<()>>>,
}

impl MqttLink {
    /// Creates a disconnected link.
    ///
    /// Credentials are read at connect time, so a link built before
    /// provisioning picks up the exchanged credentials on its first
    /// `connect`.
    pub fn new(
        options: MqttLinkOptions,
        credentials: SharedCredentials,
        inbound: mpsc::Sender<InboundEnvelope>,
    ) -> Self {
        Self {
            options,
            credentials,
            inbound,
            client: RwLock::new(None),
            connected: Arc::new(AtomicBool::new(false)),
            closing: Arc::new(AtomicBool::new(false)),
            read_task: Mutex::new(None),
        }
    }

    fn current_client(&self) -> LinkResult<AsyncClient> {
        if !self.is_connected() {
            return Err(LinkError::NotConnected);
        }
        self.client.read().clone().ok_or(LinkError::NotConnected)
    }

    /// Drives the event loop until the broker accepts the session.
    async fn await_session(&self, eventloop: &mut EventLoop) -> LinkResult<()> {
        let deadline = tokio::time::Instant::now() + self.options.connect_timeout;

        loop {
            let event = tokio::time::timeout_at(deadline, eventloop.poll())
                .await
                .map_err(|_| LinkError::timeout(self.options.connect_timeout))?
                .map_err(|e| LinkError::connection_failed(e.to_string()))?;

            match event {
                Event::Incoming(Packet::ConnAck(ack)) => {
                    if ack.code == ConnectReturnCode::Success {
                        return Ok(());
                    }
                    return Err(LinkError::protocol(format!(
                        "broker rejected session: {:?}",
                        ack.code
                    )));
                }
                _ => continue,
            }
        }
    }

    /// Forwards inbound publishes until the connection drops.
    async fn run_read_loop(
        mut eventloop: EventLoop,
        inbound: mpsc::Sender<InboundEnvelope>,
        connected: Arc<AtomicBool>,
        closing: Arc<AtomicBool>,
    ) {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let payload = String::from_utf8_lossy(&publish.payload).to_string();
                    let envelope = InboundEnvelope::new(publish.topic.clone(), payload);
                    if inbound.send(envelope).await.is_err() {
                        debug!("Inbound channel closed, stopping read task");
                        break;
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    info!("Broker closed the session");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    if !closing.load(Ordering::SeqCst) {
                        warn!(error = %e, "MQTT event loop error");
                    }
                    break;
                }
            }
        }

        connected.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl CloudLink for MqttLink {
    async fn connect(&self) -> LinkResult<()> {
        if self.is_connected() {
            return Ok(());
        }
        self.closing.store(false, Ordering::SeqCst);

        let mut options = MqttOptions::new(
            self.options.client_id.clone(),
            self.options.host.clone(),
            self.options.port,
        );
        options.set_keep_alive(self.options.keep_alive);

        {
            let credentials = self.credentials.read();
            if !credentials.is_placeholder() {
                options.set_credentials(credentials.login(), credentials.password.clone());
            }
        }

        let (client, mut eventloop) = AsyncClient::new(options, self.options.channel_capacity);
        self.await_session(&mut eventloop).await?;

        *self.client.write() = Some(client);
        self.connected.store(true, Ordering::SeqCst);

        let task = tokio::spawn(Self::run_read_loop(
            eventloop,
            self.inbound.clone(),
            self.connected.clone(),
            self.closing.clone(),
        ));
        if let Some(previous) = self.read_task.lock().replace(task) {
            previous.abort();
        }

        info!(
            host = %self.options.host,
            port = self.options.port,
            client_id = %self.options.client_id,
            "MQTT session established"
        );
        Ok(())
    }

    async fn disconnect(&self) -> LinkResult<()> {
        self.closing.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);

        let client = self.client.write().take();
        if let Some(client) = client {
            if let Err(e) = client.disconnect().await {
                debug!(error = %e, "MQTT disconnect request failed");
            }
        }
        if let Some(task) = self.read_task.lock().take() {
            task.abort();
        }

        info!("MQTT session closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn publish(&self, topic: &str, payload: &str) -> LinkResult<()> {
        let client = self.current_client()?;
        client
            .publish(topic, QoS::AtLeastOnce, false, payload.as_bytes().to_vec())
            .await
            .map_err(|e| LinkError::publish_failed(topic, e.to_string()))
    }

    async fn subscribe(&self, topic: &str) -> LinkResult<()> {
        let client = self.current_client()?;
        client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| LinkError::subscribe_failed(topic, e.to_string()))
    }

    fn name(&self) -> &str {
        "mqtt"
    }
}

impl std::fmt::Debug for MqttLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttLink")
            .field("host", &self.options.host)
            .field("port", &self.options.port)
            .field("client_id", &self.options.client_id)
            .field("connected", &self.is_connected())
            .finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::shared_credentials;
    use nimbus_core::types::LinkCredentials;

    #[test]
    fn test_options_defaults() {
        let options = MqttLinkOptions::default();
        assert_eq!(options.port, 1883);
        assert_eq!(options.keep_alive, Duration::from_secs(30));
        assert_eq!(options.channel_capacity, 64);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: MqttLinkOptions =
            serde_json::from_str(r#"{"host": "cloud.example.com", "port": 8883}"#).unwrap();
        assert_eq!(options.host, "cloud.example.com");
        assert_eq!(options.port, 8883);
        assert_eq!(options.connect_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_provisioning_options_use_distinct_client_id() {
        let options = MqttLinkOptions::for_testing();
        let boot = options.for_provisioning();
        assert_eq!(boot.client_id, "nimbus-test-boot");
        assert_eq!(boot.host, options.host);
    }

    #[tokio::test]
    async fn test_publish_before_connect_is_rejected() {
        let (tx, _rx) = mpsc::channel(4);
        let link = MqttLink::new(
            MqttLinkOptions::for_testing(),
            shared_credentials(LinkCredentials::placeholder()),
            tx,
        );

        assert!(!link.is_connected());
        let err = link.publish("tpl/us", "200,\"temperature\",value,1").await;
        assert!(matches!(err, Err(LinkError::NotConnected)));
    }
}
