// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Retry strategy abstraction for cloud link operations.
//!
//! This module provides the retry policies used when (re)establishing the
//! platform connection and by anything else that wants delay-between-attempts
//! semantics against the link.
//!
//! # Design Principles
//!
//! - **Composable**: Strategies can be selected per call site
//! - **Extensible**: Custom strategies can implement the `RetryStrategy` trait
//! - **Unbounded where required**: The connect sequence never gives up; it
//!   only caps its delay
//!
//! # Built-in Strategies
//!
//! - [`FixedDelay`]: Fixed delay between retries
//! - [`ExponentialBackoff`]: Exponentially increasing delays
//!
//! # Example
//!
//! ```rust,ignore
//! use nimbus_core::backoff::{ExponentialBackoff, RetryConfig, RetryStrategy};
//!
//! let strategy = ExponentialBackoff::new(RetryConfig::connect());
//!
//! let result = strategy.execute(|| async {
//!     link.connect().await
//! }).await;
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LinkError;

// =============================================================================
// Retry Configuration
// =============================================================================

/// Maximum-attempt value treated as "retry forever".
pub const UNLIMITED_ATTEMPTS: u32 = u32::MAX;

/// Configuration for retry strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts (`UNLIMITED_ATTEMPTS` = never give up).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before the first retry.
    #[serde(default = "default_initial_delay")]
    #[serde(with = "duration_millis")]
    pub initial_delay: Duration,

    /// Maximum delay between retries.
    #[serde(default = "default_max_delay")]
    #[serde(with = "duration_millis")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0) to randomize delays.
    #[serde(default)]
    pub jitter: f64,

    /// Whether to retry on timeout errors.
    #[serde(default = "default_true")]
    pub retry_on_timeout: bool,

    /// Whether to retry on connection errors.
    #[serde(default = "default_true")]
    pub retry_on_connection: bool,

    /// Whether to retry on protocol errors (broker rejections).
    #[serde(default)]
    pub retry_on_protocol: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            multiplier: default_multiplier(),
            jitter: 0.0,
            retry_on_timeout: true,
            retry_on_connection: true,
            retry_on_protocol: false,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for the main-channel connect sequence.
    ///
    /// Never gives up; the delay doubles per failure and is capped. A small
    /// jitter keeps a fleet of gateways from reconnecting in lockstep.
    pub fn connect() -> Self {
        Self {
            max_attempts: UNLIMITED_ATTEMPTS,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(120),
            multiplier: 2.0,
            jitter: 0.1,
            retry_on_timeout: true,
            retry_on_connection: true,
            retry_on_protocol: true,
        }
    }

    /// Sets the maximum number of attempts.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the jitter factor.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }
}

// Duration serialization helper
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// =============================================================================
// Retry Decision
// =============================================================================

/// Decision on whether to retry an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry(Duration),
    /// Do not retry, return the error.
    DoNotRetry,
}

// =============================================================================
// Retry Strategy Trait
// =============================================================================

/// A strategy for determining when and how to retry failed link operations.
///
/// Implementations should be `Send + Sync` to allow usage across threads.
#[async_trait]
pub trait RetryStrategy: Send + Sync {
    /// Returns the name of this strategy for logging/metrics.
    fn name(&self) -> &str;

    /// Determines whether to retry after a failure.
    ///
    /// `attempt` is 1-based: the first failed attempt asks with `attempt == 1`.
    fn should_retry(&self, error: &LinkError, attempt: u32) -> RetryDecision;

    /// Executes an async operation with retry logic.
    ///
    /// Returns the result of the operation, or the last error once the
    /// strategy declines to retry.
    async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, LinkError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, LinkError>> + Send,
        T: Send,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => match self.should_retry(&error, attempt) {
                    RetryDecision::Retry(delay) => {
                        tracing::warn!(
                            strategy = %self.name(),
                            attempt = attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "Retrying operation"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::DoNotRetry => {
                        return Err(error);
                    }
                },
            }
        }
    }

    /// Checks if the error type should be retried based on configuration.
    fn is_retryable_error(&self, error: &LinkError, config: &RetryConfig) -> bool {
        match error {
            LinkError::Timeout { .. } => config.retry_on_timeout,
            LinkError::ConnectionFailed { .. }
            | LinkError::NotConnected
            | LinkError::PublishFailed { .. }
            | LinkError::SubscribeFailed { .. } => config.retry_on_connection,
            LinkError::Protocol { .. } => config.retry_on_protocol,
            // Cancelled means shutdown: never retried.
            _ => false,
        }
    }
}

// =============================================================================
// Fixed Delay Strategy
// =============================================================================

/// A strategy that waits a fixed duration between retries.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    config: RetryConfig,
}

impl FixedDelay {
    /// Creates a new fixed delay strategy.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Creates a simple fixed delay strategy.
    pub fn simple(max_attempts: u32, delay: Duration) -> Self {
        Self {
            config: RetryConfig {
                max_attempts,
                initial_delay: delay,
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl RetryStrategy for FixedDelay {
    fn name(&self) -> &str {
        "fixed_delay"
    }

    fn should_retry(&self, error: &LinkError, attempt: u32) -> RetryDecision {
        if attempt >= self.config.max_attempts {
            return RetryDecision::DoNotRetry;
        }

        if !self.is_retryable_error(error, &self.config) {
            return RetryDecision::DoNotRetry;
        }

        let delay = apply_jitter(self.config.initial_delay, self.config.jitter);
        RetryDecision::Retry(delay)
    }
}

// =============================================================================
// Exponential Backoff Strategy
// =============================================================================

/// A strategy with exponentially increasing delays.
///
/// Delay formula: `min(initial_delay * multiplier^(attempt-1), max_delay)`
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    config: RetryConfig,
}

impl ExponentialBackoff {
    /// Creates a new exponential backoff strategy.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Creates the unbounded connect strategy.
    pub fn connect_strategy() -> Self {
        Self {
            config: RetryConfig::connect(),
        }
    }

    /// Calculates the delay for a given attempt.
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self.config.initial_delay.as_millis() as f64;
        let multiplied = base_delay * self.config.multiplier.powi(attempt.saturating_sub(1) as i32);
        let capped = multiplied.min(self.config.max_delay.as_millis() as f64);

        Duration::from_millis(capped as u64)
    }
}

#[async_trait]
impl RetryStrategy for ExponentialBackoff {
    fn name(&self) -> &str {
        "exponential_backoff"
    }

    fn should_retry(&self, error: &LinkError, attempt: u32) -> RetryDecision {
        if attempt >= self.config.max_attempts {
            return RetryDecision::DoNotRetry;
        }

        if !self.is_retryable_error(error, &self.config) {
            return RetryDecision::DoNotRetry;
        }

        let base_delay = self.calculate_delay(attempt);
        let delay = apply_jitter(base_delay, self.config.jitter);
        RetryDecision::Retry(delay)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Applies jitter to a duration.
fn apply_jitter(duration: Duration, jitter_factor: f64) -> Duration {
    if jitter_factor <= 0.0 {
        return duration;
    }

    let millis = duration.as_millis() as f64;
    let jitter_range = millis * jitter_factor;
    let random = (simple_random() as f64 / u32::MAX as f64) * 2.0 - 1.0; // -1.0 to 1.0
    let jittered = millis + (random * jitter_range);

    Duration::from_millis(jittered.max(0.0) as u64)
}

/// Simple pseudo-random number generator (not cryptographically secure).
/// Uses a basic xorshift algorithm for lightweight randomness.
fn simple_random() -> u32 {
    use std::time::SystemTime;

    static SEED: AtomicU32 = AtomicU32::new(0);

    let mut x = SEED.load(Ordering::Relaxed);
    if x == 0 {
        // Initialize seed from system time
        x = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u32)
            .unwrap_or(12345);
    }

    // Xorshift32
    x ^= x << 13;
    x ^= x >> 17;
    x ^= x << 5;

    SEED.store(x, Ordering::Relaxed);
    x
}

// =============================================================================
// Tests
// =============================================================================
