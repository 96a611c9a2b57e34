// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Graceful shutdown coordination.
//!
//! This module provides utilities for coordinating graceful shutdown across
//! the gateway's tasks. It handles OS signals (SIGTERM, SIGINT, SIGQUIT on
//! Unix, Ctrl+C elsewhere) and lets components subscribe to shutdown
//! notifications. The restart operation reuses the same path: accepting a
//! platform restart initiates shutdown and the service manager brings the
//! process back up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

// =============================================================================
// ShutdownCoordinator
// =============================================================================

/// Coordinates graceful shutdown across multiple components.
///
/// The coordinator provides a broadcast channel for notifying all components
/// of shutdown, signal handling, and a sticky initiated flag so late
/// subscribers never miss the event.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    sender: broadcast::Sender<()>,
    shutdown_initiated: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    /// Creates a new shutdown coordinator.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            sender,
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribes to shutdown notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Initiates shutdown, notifying all subscribers. Idempotent.
    pub fn initiate_shutdown(&self) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("Shutdown initiated");
            let _ = self.sender.send(());
        }
    }

    /// Returns true if shutdown has been initiated.
    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Waits for a shutdown signal (OS signal or manual initiation).
    pub async fn wait_for_shutdown(&self) {
        if self.shutdown_initiated.load(Ordering::SeqCst) {
            return;
        }

        let mut rx = self.subscribe();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm =
                signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");
            let mut sigint =
                signal(SignalKind::interrupt()).expect("Failed to register SIGINT handler");
            let mut sigquit =
                signal(SignalKind::quit()).expect("Failed to register SIGQUIT handler");

            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM"),
                _ = sigint.recv() => info!("Received SIGINT"),
                _ = sigquit.recv() => info!("Received SIGQUIT"),
                _ = rx.recv() => {}
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result.expect("Failed to register Ctrl+C handler");
                    info!("Received Ctrl+C");
                }
                _ = rx.recv() => {}
            }
        }

        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let _ = self.sender.send(());
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ShutdownToken
// =============================================================================

/// A lightweight handle for tasks that only need to check whether shutdown
/// has been requested.
#[derive(Clone)]
pub struct ShutdownToken {
    shutdown_initiated: Arc<AtomicBool>,
}

impl ShutdownToken {
    /// Creates a new shutdown token from a coordinator.
    pub fn from_coordinator(coordinator: &ShutdownCoordinator) -> Self {
        Self {
            shutdown_initiated: coordinator.shutdown_initiated.clone(),
        }
    }

    /// Returns true if shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_coordinator() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx = coordinator.subscribe();

        assert!(!coordinator.is_shutdown_initiated());

        coordinator.initiate_shutdown();

        assert!(coordinator.is_shutdown_initiated());
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_manual_initiation_releases_waiter() {
        let coordinator = ShutdownCoordinator::new();

        let waiter = coordinator.clone();
        let handle = tokio::spawn(async move {
            waiter.wait_for_shutdown().await;
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        coordinator.initiate_shutdown();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter should resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_token() {
        let coordinator = ShutdownCoordinator::new();
        let token = ShutdownToken::from_coordinator(&coordinator);

        assert!(!token.is_shutdown_requested());

        coordinator.initiate_shutdown();

        assert!(token.is_shutdown_requested());
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx1 = coordinator.subscribe();
        let mut rx2 = coordinator.subscribe();

        coordinator.initiate_shutdown();

        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_double_shutdown_is_idempotent() {
        let coordinator = ShutdownCoordinator::new();

        coordinator.initiate_shutdown();
        coordinator.initiate_shutdown();

        assert!(coordinator.is_shutdown_initiated());
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_after_shutdown() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.initiate_shutdown();

        tokio::time::timeout(Duration::from_millis(100), coordinator.wait_for_shutdown())
            .await
            .expect("already-initiated shutdown should not block");
    }
}
